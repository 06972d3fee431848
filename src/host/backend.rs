use super::elog::{LogRecord, LogSink, TracingSink};
use super::hooks::HookTable;
use super::standard::SimulatedExecutor;
use super::types::{
    DestKind, DestReceiver, ExecFlags, ParamList, ProcessUtilityContext, QueryDesc,
    ScanDirection, Statement, StatementKind, UtilityStmt,
};
use crate::guc::Settings;
use crate::{HostResult, Result};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// The backend's built-in implementation of each hookable entry point.
///
/// Every routine gets the backend so utility processing can run nested
/// statements back through the hook table.
pub trait StandardRoutines {
    fn executor_start(
        &self,
        backend: &Backend,
        query_desc: &mut QueryDesc,
        eflags: ExecFlags,
    ) -> HostResult<()>;

    fn executor_run(
        &self,
        backend: &Backend,
        query_desc: &mut QueryDesc,
        direction: ScanDirection,
        count: u64,
    ) -> HostResult<()>;

    fn executor_finish(&self, backend: &Backend, query_desc: &mut QueryDesc) -> HostResult<()>;

    fn executor_end(&self, backend: &Backend, query_desc: &mut QueryDesc) -> HostResult<()>;

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
    ) -> HostResult<()>;
}

/// One client session's backend process.
///
/// All state here is private to the session; nothing is shared with other
/// backends, so interior mutability is single-threaded.
pub struct Backend {
    hooks: HookTable,
    standard: Box<dyn StandardRoutines>,
    settings: RefCell<Settings>,
    sink: Rc<dyn LogSink>,
    superuser: Cell<bool>,
    debug_query_string: RefCell<Option<String>>,
}

impl Backend {
    pub fn new(standard: impl StandardRoutines + 'static) -> Self {
        Self {
            hooks: HookTable::new(),
            standard: Box::new(standard),
            settings: RefCell::new(Settings::new()),
            sink: Rc::new(TracingSink),
            superuser: Cell::new(false),
            debug_query_string: RefCell::new(None),
        }
    }

    /// A backend running [`SimulatedExecutor`].
    pub fn simulated() -> Self {
        Self::new(SimulatedExecutor)
    }

    pub fn with_sink(mut self, sink: Rc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_superuser(self, superuser: bool) -> Self {
        self.superuser.set(superuser);
        self
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    pub fn is_superuser(&self) -> bool {
        self.superuser.get()
    }

    pub fn set_superuser(&self, superuser: bool) {
        self.superuser.set(superuser);
    }

    pub fn settings(&self) -> Ref<'_, Settings> {
        self.settings.borrow()
    }

    pub fn settings_mut(&self) -> RefMut<'_, Settings> {
        self.settings.borrow_mut()
    }

    /// `SET name = value` on behalf of the session user; `None` resets.
    pub fn set_config(&self, name: &str, value: Option<&str>) -> Result<()> {
        let superuser = self.is_superuser();
        let mut settings = self.settings.borrow_mut();
        match value {
            Some(value) => settings.set(name, value, superuser),
            None => settings.reset(name, superuser),
        }
    }

    pub fn debug_query_string(&self) -> Option<String> {
        self.debug_query_string.borrow().clone()
    }

    /// Sends a record to the server log, echoing the current statement
    /// unless the record hides it.
    pub fn ereport(&self, mut record: LogRecord) {
        if !record.hide_statement && record.statement.is_none() {
            record.statement = self.debug_query_string();
        }
        self.sink.emit(&record);
    }

    pub fn executor_start(&self, query_desc: &mut QueryDesc, eflags: ExecFlags) -> HostResult<()> {
        match self.hooks.executor_start.get() {
            Some(hook) => hook(self, query_desc, eflags),
            None => self.standard_executor_start(query_desc, eflags),
        }
    }

    pub fn executor_run(
        &self,
        query_desc: &mut QueryDesc,
        direction: ScanDirection,
        count: u64,
    ) -> HostResult<()> {
        match self.hooks.executor_run.get() {
            Some(hook) => hook(self, query_desc, direction, count),
            None => self.standard_executor_run(query_desc, direction, count),
        }
    }

    pub fn executor_finish(&self, query_desc: &mut QueryDesc) -> HostResult<()> {
        match self.hooks.executor_finish.get() {
            Some(hook) => hook(self, query_desc),
            None => self.standard_executor_finish(query_desc),
        }
    }

    pub fn executor_end(&self, query_desc: &mut QueryDesc) -> HostResult<()> {
        match self.hooks.executor_end.get() {
            Some(hook) => hook(self, query_desc),
            None => self.standard_executor_end(query_desc),
        }
    }

    pub fn process_utility(
        &self,
        stmt: &UtilityStmt,
        query_string: &str,
        context: ProcessUtilityContext,
        params: Option<&ParamList>,
        dest: &mut DestReceiver,
        completion_tag: &mut String,
    ) -> HostResult<()> {
        match self.hooks.process_utility.get() {
            Some(hook) => hook(self, stmt, query_string, context, params, dest, completion_tag),
            None => self.standard_process_utility(
                stmt,
                query_string,
                context,
                params,
                dest,
                completion_tag,
            ),
        }
    }

    pub fn standard_executor_start(
        &self,
        query_desc: &mut QueryDesc,
        eflags: ExecFlags,
    ) -> HostResult<()> {
        self.standard.executor_start(self, query_desc, eflags)
    }

    pub fn standard_executor_run(
        &self,
        query_desc: &mut QueryDesc,
        direction: ScanDirection,
        count: u64,
    ) -> HostResult<()> {
        self.standard.executor_run(self, query_desc, direction, count)
    }

    pub fn standard_executor_finish(&self, query_desc: &mut QueryDesc) -> HostResult<()> {
        self.standard.executor_finish(self, query_desc)
    }

    pub fn standard_executor_end(&self, query_desc: &mut QueryDesc) -> HostResult<()> {
        self.standard.executor_end(self, query_desc)
    }

    pub fn standard_process_utility(
        &self,
        stmt: &UtilityStmt,
        query_string: &str,
        context: ProcessUtilityContext,
        params: Option<&ParamList>,
        dest: &mut DestReceiver,
        completion_tag: &mut String,
    ) -> HostResult<()> {
        self.standard
            .process_utility(self, stmt, query_string, context, params, dest, completion_tag)
    }

    /// Runs a statement sent by the client and returns its completion tag.
    ///
    /// A failure is written to the log at ERROR level, with the statement
    /// echoed, and then returned to the caller as is.
    pub fn exec_simple_query(&self, statement: &Statement) -> HostResult<String> {
        let previous = self
            .debug_query_string
            .replace(Some(statement.source_text.clone()));

        let result = self.run_statement(statement, ProcessUtilityContext::TopLevel);
        if let Err(err) = &result {
            self.ereport(LogRecord::error(err));
        }

        *self.debug_query_string.borrow_mut() = previous;
        result
    }

    /// Runs a statement through the full executor or utility path.
    ///
    /// `context` is only meaningful for utility statements; nested callers
    /// pass [`ProcessUtilityContext::Query`].
    pub fn run_statement(
        &self,
        statement: &Statement,
        context: ProcessUtilityContext,
    ) -> HostResult<String> {
        match &statement.kind {
            StatementKind::Query(plan) => {
                let mut query_desc = QueryDesc::new(
                    plan.clone(),
                    statement.source_text.clone(),
                    None,
                    DestReceiver::new(DestKind::Remote),
                );
                self.execute(&mut query_desc, ExecFlags::NONE)?;
                Ok(query_desc.completion_tag())
            }
            StatementKind::Utility(stmt) => {
                let mut dest = DestReceiver::new(DestKind::Remote);
                let mut completion_tag = String::new();
                self.process_utility(
                    stmt,
                    &statement.source_text,
                    context,
                    None,
                    &mut dest,
                    &mut completion_tag,
                )?;
                Ok(completion_tag)
            }
        }
    }

    /// Start, run to completion, finish, end.
    pub fn execute(&self, query_desc: &mut QueryDesc, eflags: ExecFlags) -> HostResult<()> {
        debug!(operation = ?query_desc.operation, "executing query");
        self.executor_start(query_desc, eflags)?;
        if !eflags.contains(ExecFlags::EXPLAIN_ONLY) {
            self.executor_run(query_desc, ScanDirection::Forward, 0)?;
            self.executor_finish(query_desc)?;
        }
        self.executor_end(query_desc)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("hooks", &self.hooks)
            .field("superuser", &self.superuser.get())
            .field("debug_query_string", &self.debug_query_string.borrow())
            .finish()
    }
}
