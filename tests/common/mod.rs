#![allow(dead_code)]

use pg_audit_trail::host::{
    Backend, DestReceiver, ExecFlags, MemorySink, ParamList, ProcessUtilityContext, QueryDesc,
    ScanDirection, SimulatedExecutor, StandardRoutines, Statement, UtilityStmt,
};
use pg_audit_trail::{AuditTrail, HostError, HostResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Backend logging into memory, running as a superuser.
pub fn backend_with_sink() -> (Backend, MemorySink) {
    let sink = MemorySink::new();
    let backend = Backend::simulated()
        .with_sink(Rc::new(sink.clone()))
        .with_superuser(true);
    (backend, sink)
}

pub fn do_block(source_text: &str, body: Vec<Statement>) -> Statement {
    Statement::utility(source_text, UtilityStmt::Do { body })
}

/// Where the audit handle is parked so standard routines can look at it.
pub type AuditProbe = Rc<RefCell<Option<AuditTrail>>>;

/// Which standard routine should raise instead of running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Run,
    Finish,
    Utility,
}

/// Standard routines that record the nesting level they observe and can be
/// told to fail.
pub struct ProbingExecutor {
    pub probe: AuditProbe,
    pub observed: Rc<RefCell<Vec<(&'static str, u32)>>>,
    pub fail: Option<(FailAt, HostError)>,
}

impl ProbingExecutor {
    pub fn new(probe: AuditProbe) -> Self {
        Self {
            probe,
            observed: Rc::new(RefCell::new(Vec::new())),
            fail: None,
        }
    }

    pub fn failing(mut self, at: FailAt, err: HostError) -> Self {
        self.fail = Some((at, err));
        self
    }

    fn record(&self, routine: &'static str) {
        let level = self
            .probe
            .borrow()
            .as_ref()
            .map(|audit| audit.nesting_level())
            .unwrap_or(0);
        self.observed.borrow_mut().push((routine, level));
    }

    fn check(&self, at: FailAt) -> HostResult<()> {
        match &self.fail {
            Some((fail_at, err)) if *fail_at == at => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

impl StandardRoutines for ProbingExecutor {
    fn executor_start(
        &self,
        backend: &Backend,
        qd: &mut QueryDesc,
        eflags: ExecFlags,
    ) -> HostResult<()> {
        self.record("start");
        SimulatedExecutor.executor_start(backend, qd, eflags)
    }

    fn executor_run(
        &self,
        backend: &Backend,
        qd: &mut QueryDesc,
        direction: ScanDirection,
        count: u64,
    ) -> HostResult<()> {
        self.record("run");
        self.check(FailAt::Run)?;
        SimulatedExecutor.executor_run(backend, qd, direction, count)
    }

    fn executor_finish(&self, backend: &Backend, qd: &mut QueryDesc) -> HostResult<()> {
        self.record("finish");
        self.check(FailAt::Finish)?;
        SimulatedExecutor.executor_finish(backend, qd)
    }

    fn executor_end(&self, backend: &Backend, qd: &mut QueryDesc) -> HostResult<()> {
        self.record("end");
        SimulatedExecutor.executor_end(backend, qd)
    }

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
        self.record("utility");
        self.check(FailAt::Utility)?;
        SimulatedExecutor.process_utility(
            backend,
            stmt,
            query_string,
            context,
            params,
            dest,
            completion_tag,
        )
    }
}
