use crate::HostError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmdType {
    Select,
    Insert,
    Update,
    Delete,
    Utility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    Backward,
    NoMovement,
    Forward,
}

/// Executor flags passed to `ExecutorStart`. Hooks forward them untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecFlags(pub u32);

impl ExecFlags {
    pub const NONE: ExecFlags = ExecFlags(0);
    pub const EXPLAIN_ONLY: ExecFlags = ExecFlags(0x0001);
    pub const SKIP_TRIGGERS: ExecFlags = ExecFlags(0x0010);
    pub const WITH_NO_DATA: ExecFlags = ExecFlags(0x0020);

    pub fn contains(self, other: ExecFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: ExecFlags) -> ExecFlags {
        ExecFlags(self.0 | other.0)
    }
}

/// Where a utility statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessUtilityContext {
    /// Sent directly by the client
    TopLevel,
    /// Part of a larger query, e.g. inside a function or DO block
    Query,
    /// Generated internally as part of another utility command
    Subcommand,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamList(pub Vec<Option<String>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestKind {
    #[default]
    None,
    Remote,
    Tuplestore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestReceiver {
    pub kind: DestKind,
    pub received: u64,
}

impl DestReceiver {
    pub fn new(kind: DestKind) -> Self {
        Self { kind, received: 0 }
    }

    pub fn receive(&mut self, rows: u64) {
        if self.kind != DestKind::None {
            self.received = self.received.saturating_add(rows);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorPhase {
    Created,
    Started,
    Finished,
    Ended,
}

/// An optimisable statement after planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedQuery {
    pub operation: CmdType,
    #[serde(default)]
    pub rows: u64,
    /// Raised when the plan runs, e.g. a division by zero in a target list.
    #[serde(default)]
    pub error: Option<HostError>,
}

impl PlannedQuery {
    pub fn new(operation: CmdType, rows: u64) -> Self {
        Self {
            operation,
            rows,
            error: None,
        }
    }

    pub fn failing(operation: CmdType, error: HostError) -> Self {
        Self {
            operation,
            rows: 0,
            error: Some(error),
        }
    }
}

/// Everything the executor needs for one statement.
///
/// Created by the caller of `ExecutorStart` and only lent to hooks for the
/// duration of each call.
#[derive(Debug, Clone)]
pub struct QueryDesc {
    pub operation: CmdType,
    pub source_text: String,
    pub plan: PlannedQuery,
    pub params: Option<ParamList>,
    pub dest: DestReceiver,
    pub phase: ExecutorPhase,
    pub processed: u64,
}

impl QueryDesc {
    pub fn new(
        plan: PlannedQuery,
        source_text: impl Into<String>,
        params: Option<ParamList>,
        dest: DestReceiver,
    ) -> Self {
        Self {
            operation: plan.operation,
            source_text: source_text.into(),
            plan,
            params,
            dest,
            phase: ExecutorPhase::Created,
            processed: 0,
        }
    }

    /// Completion tag as reported to the client.
    pub fn completion_tag(&self) -> String {
        match self.operation {
            CmdType::Select => format!("SELECT {}", self.processed),
            CmdType::Insert => format!("INSERT 0 {}", self.processed),
            CmdType::Update => format!("UPDATE {}", self.processed),
            CmdType::Delete => format!("DELETE {}", self.processed),
            CmdType::Utility => "???".to_string(),
        }
    }
}

/// Parse tree of a utility (non-optimisable) statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityStmt {
    /// Any command without side effects on execution, reported with `tag`.
    Command { tag: String },
    /// Anonymous code block executing its body as nested statements.
    Do { body: Vec<Statement> },
    /// `CREATE TABLE ... AS`, running `query` under the outer source text.
    CreateTableAs { relation: String, query: PlannedQuery },
    /// `SET name = value`, or `RESET name` when `value` is absent.
    VariableSet { name: String, value: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Query(PlannedQuery),
    Utility(UtilityStmt),
}

/// One statement as submitted, with its literal source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub source_text: String,
    pub kind: StatementKind,
}

impl Statement {
    pub fn query(source_text: impl Into<String>, plan: PlannedQuery) -> Self {
        Self {
            source_text: source_text.into(),
            kind: StatementKind::Query(plan),
        }
    }

    pub fn utility(source_text: impl Into<String>, stmt: UtilityStmt) -> Self {
        Self {
            source_text: source_text.into(),
            kind: StatementKind::Utility(stmt),
        }
    }

    pub fn select(source_text: impl Into<String>, rows: u64) -> Self {
        Self::query(source_text, PlannedQuery::new(CmdType::Select, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dest_receiver_saturates() {
        let mut dest = DestReceiver::new(DestKind::Remote);
        dest.receive(u64::MAX);
        dest.receive(1);
        assert_eq!(dest.received, u64::MAX);

        let mut discard = DestReceiver::new(DestKind::None);
        discard.receive(5);
        assert_eq!(discard.received, 0);
    }
}
