//! Server log records and the sinks that receive them.

use crate::HostError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Log,
    Info,
    Notice,
    Warning,
    Error,
}

/// One entry in the server log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub sqlstate: Option<String>,
    /// Text of the statement being executed, echoed alongside the message.
    pub statement: Option<String>,
    /// Suppresses the statement echo, for records that already carry it.
    pub hide_statement: bool,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            sqlstate: None,
            statement: None,
            hide_statement: false,
        }
    }

    pub fn error(err: &HostError) -> Self {
        Self {
            sqlstate: Some(err.sqlstate.clone()),
            ..Self::new(LogLevel::Error, err.message.clone())
        }
    }

    pub fn hide_statement(mut self, hide: bool) -> Self {
        self.hide_statement = hide;
        self
    }
}

pub trait LogSink {
    fn emit(&self, record: &LogRecord);
}

/// Writes records through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        // Absent values leave the field out of the event.
        let statement = record.statement.as_deref();
        let sqlstate = record.sqlstate.as_deref();
        match record.level {
            LogLevel::Debug => {
                tracing::debug!(target: "pg_audit_trail", statement, "{}", record.message)
            }
            LogLevel::Log | LogLevel::Info | LogLevel::Notice => {
                tracing::info!(target: "pg_audit_trail", statement, "{}", record.message)
            }
            LogLevel::Warning => {
                tracing::warn!(target: "pg_audit_trail", statement, sqlstate, "{}", record.message)
            }
            LogLevel::Error => {
                tracing::error!(target: "pg_audit_trail", statement, sqlstate, "{}", record.message)
            }
        }
    }
}

/// Keeps every record in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }

    pub fn to_json_lines(&self) -> crate::Result<String> {
        let mut out = String::new();
        for record in self.records.borrow().iter() {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}
