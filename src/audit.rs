//! Statement audit hooks.
//!
//! Loading [`AuditTrail`] puts five interceptors into the backend's hook
//! table. The start and utility interceptors write the statement text to the
//! server log before the statement executes; the run, finish and utility
//! interceptors track how deeply statements are nested so that statements
//! run on behalf of another statement can be left out of the log.
//!
//! # Example
//!
//! ```rust
//! use pg_audit_trail::audit::AuditTrail;
//! use pg_audit_trail::config::AuditConfig;
//! use pg_audit_trail::host::{Backend, MemorySink, Statement};
//! use std::rc::Rc;
//!
//! let sink = MemorySink::new();
//! let backend = Backend::simulated().with_sink(Rc::new(sink.clone()));
//! let audit = AuditTrail::load(&backend, &AuditConfig::default()).unwrap();
//!
//! backend.exec_simple_query(&Statement::select("SELECT 1", 1)).unwrap();
//! assert_eq!(sink.messages(), vec!["SELECT 1".to_string()]);
//!
//! audit.unload(&backend);
//! ```

use crate::config::AuditConfig;
use crate::guc::GucContext;
use crate::host::{
    Backend, DestReceiver, ExecFlags, ExecutorEndHook, ExecutorFinishHook, ExecutorRunHook,
    ExecutorStartHook, LogLevel, LogRecord, ParamList, ProcessUtilityContext, ProcessUtilityHook,
    QueryDesc, ScanDirection, UtilityStmt,
};
use crate::{HostResult, Result};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

pub const AUDIT_NESTED_SETTING: &str = "pg_audit_trail.log_nested_statements";

const AUDIT_NESTED_DESCRIPTION: &str = "Audit statements executed inside other statements.";

/// Handlers that were installed before ours, in the order they were found.
#[derive(Default)]
struct SavedHooks {
    executor_start: Option<ExecutorStartHook>,
    executor_run: Option<ExecutorRunHook>,
    executor_finish: Option<ExecutorFinishHook>,
    executor_end: Option<ExecutorEndHook>,
    process_utility: Option<ProcessUtilityHook>,
}

/// Per-backend state shared by the installed interceptors.
struct AuditState {
    prev: SavedHooks,
    nested_level: Cell<u32>,
    audited: Cell<u64>,
}

/// Holds the nesting level up for as long as it lives.
struct NestingGuard<'a> {
    level: &'a Cell<u32>,
}

impl<'a> NestingGuard<'a> {
    fn enter(level: &'a Cell<u32>) -> Self {
        level.set(level.get() + 1);
        Self { level }
    }
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.level.set(self.level.get() - 1);
    }
}

impl AuditState {
    fn should_log(&self, backend: &Backend) -> bool {
        self.nested_level.get() == 0
            || backend
                .settings()
                .bool_value(AUDIT_NESTED_SETTING)
                .unwrap_or(false)
    }

    fn log_statement(&self, backend: &Backend, text: &str) {
        // The record carries the statement itself, so the echo is redundant.
        backend.ereport(LogRecord::new(LogLevel::Log, text).hide_statement(true));
        self.audited.set(self.audited.get() + 1);
    }

    fn executor_start(
        &self,
        backend: &Backend,
        query_desc: &mut QueryDesc,
        eflags: ExecFlags,
    ) -> HostResult<()> {
        if self.should_log(backend) {
            self.log_statement(backend, &query_desc.source_text);
        }

        match &self.prev.executor_start {
            Some(prev) => prev(backend, query_desc, eflags),
            None => backend.standard_executor_start(query_desc, eflags),
        }
    }

    fn executor_run(
        &self,
        backend: &Backend,
        query_desc: &mut QueryDesc,
        direction: ScanDirection,
        count: u64,
    ) -> HostResult<()> {
        let _nesting = NestingGuard::enter(&self.nested_level);
        match &self.prev.executor_run {
            Some(prev) => prev(backend, query_desc, direction, count),
            None => backend.standard_executor_run(query_desc, direction, count),
        }
    }

    fn executor_finish(&self, backend: &Backend, query_desc: &mut QueryDesc) -> HostResult<()> {
        let _nesting = NestingGuard::enter(&self.nested_level);
        match &self.prev.executor_finish {
            Some(prev) => prev(backend, query_desc),
            None => backend.standard_executor_finish(query_desc),
        }
    }

    fn executor_end(&self, backend: &Backend, query_desc: &mut QueryDesc) -> HostResult<()> {
        match &self.prev.executor_end {
            Some(prev) => prev(backend, query_desc),
            None => backend.standard_executor_end(query_desc),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_utility(
        &self,
        backend: &Backend,
        stmt: &UtilityStmt,
        query_string: &str,
        context: ProcessUtilityContext,
        params: Option<&ParamList>,
        dest: &mut DestReceiver,
        completion_tag: &mut String,
    ) -> HostResult<()> {
        if self.should_log(backend) {
            self.log_statement(backend, query_string);
        }

        let _nesting = NestingGuard::enter(&self.nested_level);
        match &self.prev.process_utility {
            Some(prev) => prev(backend, stmt, query_string, context, params, dest, completion_tag),
            None => backend.standard_process_utility(
                stmt,
                query_string,
                context,
                params,
                dest,
                completion_tag,
            ),
        }
    }
}

/// The loaded extension.
///
/// Dropping it without calling [`AuditTrail::unload`] leaves the
/// interceptors installed, as a library that is never unloaded would.
pub struct AuditTrail {
    state: Rc<AuditState>,
}

impl AuditTrail {
    /// Defines the extension's setting and installs the interceptors,
    /// remembering whatever each slot held before.
    pub fn load(backend: &Backend, config: &AuditConfig) -> Result<Self> {
        {
            let mut settings = backend.settings_mut();
            settings.define_bool(
                AUDIT_NESTED_SETTING,
                AUDIT_NESTED_DESCRIPTION,
                false,
                GucContext::Suset,
            );
            if config.log_nested_statements {
                settings.set_from_config(AUDIT_NESTED_SETTING, "on")?;
            }
        }

        let hooks = backend.hooks();
        let state = Rc::new(AuditState {
            prev: SavedHooks {
                executor_start: hooks.executor_start.get(),
                executor_run: hooks.executor_run.get(),
                executor_finish: hooks.executor_finish.get(),
                executor_end: hooks.executor_end.get(),
                process_utility: hooks.process_utility.get(),
            },
            nested_level: Cell::new(0),
            audited: Cell::new(0),
        });

        let s = state.clone();
        hooks.executor_start.replace(Some(Rc::new(
            move |backend: &Backend, qd: &mut QueryDesc, eflags: ExecFlags| -> HostResult<()> {
                s.executor_start(backend, qd, eflags)
            },
        )));

        let s = state.clone();
        hooks.executor_run.replace(Some(Rc::new(
            move |backend: &Backend,
                  qd: &mut QueryDesc,
                  direction: ScanDirection,
                  count: u64|
                  -> HostResult<()> { s.executor_run(backend, qd, direction, count) },
        )));

        let s = state.clone();
        hooks.executor_finish.replace(Some(Rc::new(
            move |backend: &Backend, qd: &mut QueryDesc| -> HostResult<()> {
                s.executor_finish(backend, qd)
            },
        )));

        let s = state.clone();
        hooks.executor_end.replace(Some(Rc::new(
            move |backend: &Backend, qd: &mut QueryDesc| -> HostResult<()> {
                s.executor_end(backend, qd)
            },
        )));

        let s = state.clone();
        hooks.process_utility.replace(Some(Rc::new(
            move |backend: &Backend,
                  stmt: &UtilityStmt,
                  query_string: &str,
                  context: ProcessUtilityContext,
                  params: Option<&ParamList>,
                  dest: &mut DestReceiver,
                  completion_tag: &mut String|
                  -> HostResult<()> {
                s.process_utility(
                    backend,
                    stmt,
                    query_string,
                    context,
                    params,
                    dest,
                    completion_tag,
                )
            },
        )));

        debug!(
            chained_start = state.prev.executor_start.is_some(),
            chained_utility = state.prev.process_utility.is_some(),
            "audit hooks installed"
        );
        Ok(Self { state })
    }

    /// Puts back the handlers that were installed when this was loaded.
    pub fn unload(self, backend: &Backend) {
        let hooks = backend.hooks();
        let prev = &self.state.prev;
        hooks.executor_start.replace(prev.executor_start.clone());
        hooks.executor_run.replace(prev.executor_run.clone());
        hooks.executor_finish.replace(prev.executor_finish.clone());
        hooks.executor_end.replace(prev.executor_end.clone());
        hooks.process_utility.replace(prev.process_utility.clone());
        debug!(audited = self.state.audited.get(), "audit hooks removed");
    }

    /// Number of executor or utility contexts currently open.
    pub fn nesting_level(&self) -> u32 {
        self.state.nested_level.get()
    }

    /// Audit records written since load.
    pub fn statements_audited(&self) -> u64 {
        self.state.audited.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CmdType, MemorySink, PlannedQuery, Statement};
    use crate::HostError;

    fn setup() -> (Backend, MemorySink, AuditTrail) {
        let sink = MemorySink::new();
        let backend = Backend::simulated()
            .with_sink(Rc::new(sink.clone()))
            .with_superuser(true);
        let audit = AuditTrail::load(&backend, &AuditConfig::default()).unwrap();
        (backend, sink, audit)
    }

    fn do_block(body: Vec<Statement>) -> Statement {
        Statement::utility("DO $$ BEGIN PERFORM 1; END $$", UtilityStmt::Do { body })
    }

    #[test]
    fn test_setting_defined_as_superuser_only() {
        let (backend, _sink, _audit) = setup();
        let settings = backend.settings();
        let variable = settings.variable(AUDIT_NESTED_SETTING).unwrap();

        assert_eq!(variable.context, GucContext::Suset);
        assert!(!variable.value);
    }

    #[test]
    fn test_config_enables_nested_logging() {
        let backend = Backend::simulated();
        let config = AuditConfig {
            log_nested_statements: true,
        };
        let _audit = AuditTrail::load(&backend, &config).unwrap();

        assert_eq!(backend.settings().bool_value(AUDIT_NESTED_SETTING), Some(true));
    }

    #[test]
    fn test_top_level_select_logged_once_without_echo() {
        let (backend, sink, audit) = setup();
        backend.exec_simple_query(&Statement::select("SELECT 1", 1)).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "SELECT 1");
        assert_eq!(records[0].level, LogLevel::Log);
        assert!(records[0].hide_statement);
        assert_eq!(records[0].statement, None);
        assert_eq!(audit.statements_audited(), 1);
        assert_eq!(audit.nesting_level(), 0);
    }

    #[test]
    fn test_utility_with_nested_query_logs_outer_only() {
        let (backend, sink, audit) = setup();
        backend
            .exec_simple_query(&do_block(vec![Statement::select("SELECT 1", 1)]))
            .unwrap();

        assert_eq!(sink.messages(), vec!["DO $$ BEGIN PERFORM 1; END $$".to_string()]);
        assert_eq!(audit.nesting_level(), 0);
    }

    #[test]
    fn test_nested_switch_logs_every_statement() {
        let (backend, sink, _audit) = setup();
        backend
            .set_config(AUDIT_NESTED_SETTING, Some("on"))
            .unwrap();
        backend
            .exec_simple_query(&do_block(vec![Statement::select("SELECT 1", 1)]))
            .unwrap();

        assert_eq!(
            sink.messages(),
            vec!["DO $$ BEGIN PERFORM 1; END $$".to_string(), "SELECT 1".to_string()]
        );
    }

    #[test]
    fn test_failure_restores_level_and_propagates() {
        let (backend, _sink, audit) = setup();
        let raised = HostError::new("22012", "division by zero");
        let statement = do_block(vec![Statement::query(
            "SELECT 1/0",
            PlannedQuery::failing(CmdType::Select, raised.clone()),
        )]);

        let err = backend.exec_simple_query(&statement).unwrap_err();
        assert_eq!(err, raised);
        assert_eq!(audit.nesting_level(), 0);
    }

    #[test]
    fn test_executor_end_is_passthrough() {
        let (backend, sink, audit) = setup();
        let mut qd = QueryDesc::new(
            PlannedQuery::new(CmdType::Select, 1),
            "SELECT 1",
            None,
            DestReceiver::default(),
        );
        backend.executor_start(&mut qd, ExecFlags::NONE).unwrap();
        sink.clear();

        backend.executor_end(&mut qd).unwrap();
        assert!(sink.is_empty());
        assert_eq!(audit.nesting_level(), 0);
    }

    #[test]
    fn test_level_held_during_run_only() {
        let (backend, _sink, audit) = setup();
        let mut qd = QueryDesc::new(
            PlannedQuery::new(CmdType::Select, 1),
            "SELECT 1",
            None,
            DestReceiver::default(),
        );
        backend.executor_start(&mut qd, ExecFlags::NONE).unwrap();
        assert_eq!(audit.nesting_level(), 0);
        backend.executor_run(&mut qd, ScanDirection::Forward, 0).unwrap();
        assert_eq!(audit.nesting_level(), 0);
    }

    #[test]
    fn test_unload_restores_standard_routines() {
        let (backend, sink, audit) = setup();
        assert!(backend.hooks().executor_start.is_set());

        audit.unload(&backend);
        let hooks = backend.hooks();
        assert!(!hooks.executor_start.is_set());
        assert!(!hooks.executor_run.is_set());
        assert!(!hooks.executor_finish.is_set());
        assert!(!hooks.executor_end.is_set());
        assert!(!hooks.process_utility.is_set());

        backend.exec_simple_query(&Statement::select("SELECT 1", 1)).unwrap();
        assert!(sink.is_empty());
    }
}
