//! Run-time settings for a backend session.
//!
//! Extensions register their variables when they load. Each variable
//! records who may change it and where its current value came from, so a
//! `RESET` can return to the configured value rather than the built-in one.

use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Who may change a setting at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GucContext {
    /// Superusers only
    Suset,
    /// Any session user
    Userset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GucSource {
    Default,
    ConfigFile,
    Session,
}

#[derive(Debug, Clone)]
pub struct BoolVariable {
    pub name: String,
    pub short_desc: String,
    pub context: GucContext,
    pub boot_value: bool,
    pub reset_value: bool,
    pub value: bool,
    pub source: GucSource,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    variables: BTreeMap<String, BoolVariable>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a boolean variable. Defining a name twice keeps the first
    /// definition, matching a library that is loaded more than once.
    pub fn define_bool(
        &mut self,
        name: &str,
        short_desc: &str,
        boot_value: bool,
        context: GucContext,
    ) {
        if self.variables.contains_key(name) {
            debug!(name, "setting already defined");
            return;
        }
        self.variables.insert(
            name.to_string(),
            BoolVariable {
                name: name.to_string(),
                short_desc: short_desc.to_string(),
                context,
                boot_value,
                reset_value: boot_value,
                value: boot_value,
                source: GucSource::Default,
            },
        );
    }

    pub fn variable(&self, name: &str) -> Option<&BoolVariable> {
        self.variables.get(name)
    }

    pub fn bool_value(&self, name: &str) -> Option<bool> {
        self.variables.get(name).map(|v| v.value)
    }

    /// `SHOW name`
    pub fn show(&self, name: &str) -> Result<&'static str> {
        let variable = self.lookup(name)?;
        Ok(if variable.value { "on" } else { "off" })
    }

    /// Applies a value from the configuration file. It becomes the value
    /// `RESET` returns to, and no privilege check applies.
    pub fn set_from_config(&mut self, name: &str, value: &str) -> Result<()> {
        let parsed = parse_bool(value).ok_or_else(|| Error::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        let variable = self.lookup_mut(name)?;
        variable.reset_value = parsed;
        if variable.source <= GucSource::ConfigFile {
            variable.value = parsed;
            variable.source = GucSource::ConfigFile;
        }
        Ok(())
    }

    /// `SET name = value` from a session.
    pub fn set(&mut self, name: &str, value: &str, superuser: bool) -> Result<()> {
        let variable = self.lookup_mut(name)?;
        check_privilege(variable, superuser)?;
        let parsed = parse_bool(value).ok_or_else(|| Error::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        variable.value = parsed;
        variable.source = GucSource::Session;
        debug!(name, value = parsed, "setting changed");
        Ok(())
    }

    /// `RESET name`
    pub fn reset(&mut self, name: &str, superuser: bool) -> Result<()> {
        let variable = self.lookup_mut(name)?;
        check_privilege(variable, superuser)?;
        variable.value = variable.reset_value;
        variable.source = if variable.reset_value == variable.boot_value {
            GucSource::Default
        } else {
            GucSource::ConfigFile
        };
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&BoolVariable> {
        self.variables.get(name).ok_or_else(|| Error::UnknownSetting {
            name: name.to_string(),
        })
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut BoolVariable> {
        self.variables
            .get_mut(name)
            .ok_or_else(|| Error::UnknownSetting {
                name: name.to_string(),
            })
    }
}

fn check_privilege(variable: &BoolVariable, superuser: bool) -> Result<()> {
    if variable.context == GucContext::Suset && !superuser {
        return Err(Error::PermissionDenied {
            name: variable.name.clone(),
        });
    }
    Ok(())
}

/// Accepts the spellings PostgreSQL accepts for booleans: `true`, `false`,
/// `yes`, `no` and their unique prefixes, `on`, `off`, `1`, `0`.
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }

    let is_prefix_of = |word: &str| word.starts_with(value.as_str());
    match value.as_str() {
        "1" => Some(true),
        "0" => Some(false),
        "on" => Some(true),
        // "o" alone is ambiguous between on and off
        "of" | "off" => Some(false),
        _ if is_prefix_of("true") => Some(true),
        _ if is_prefix_of("false") => Some(false),
        _ if is_prefix_of("yes") => Some(true),
        _ if is_prefix_of("no") => Some(false),
        _ => None,
    }
}
