//! Scripted client sessions.
//!
//! A session script is a JSON array of [`Statement`]s. Replaying it sends
//! each statement to a backend as if a client had submitted it, continuing
//! past failures the way `psql` does without `ON_ERROR_STOP`.
//!
//! # Example
//!
//! ```rust
//! use pg_audit_trail::host::Backend;
//! use pg_audit_trail::session::SessionScript;
//!
//! let script = SessionScript::from_json(r#"[
//!     {"source_text": "SELECT 1", "kind": {"query": {"operation": "select", "rows": 1}}}
//! ]"#).unwrap();
//!
//! let summary = script.replay(&Backend::simulated());
//! assert_eq!(summary.succeeded, 1);
//! ```

use crate::host::{Backend, Statement};
use crate::{HostError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionScript {
    pub statements: Vec<Statement>,
}

/// Outcome of one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<HostError>,
}

impl SessionScript {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading session script from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn replay(&self, backend: &Backend) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        for statement in &self.statements {
            match backend.exec_simple_query(statement) {
                Ok(tag) => {
                    debug!(tag = %tag, "statement complete");
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!(sqlstate = %e.sqlstate, "statement failed: {}", e);
                    summary.failed += 1;
                    summary.errors.push(e);
                }
            }
        }
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "session replay finished"
        );
        summary
    }
}
