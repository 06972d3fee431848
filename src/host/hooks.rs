//! The backend's table of replaceable entry points.
//!
//! Each slot is either empty, meaning the backend runs its standard routine,
//! or holds the handler most recently installed by an extension. Installing
//! a handler returns the one it displaced so the installer can chain to it
//! and later put it back.

use super::backend::Backend;
use super::types::{
    DestReceiver, ExecFlags, ParamList, ProcessUtilityContext, QueryDesc, ScanDirection,
    UtilityStmt,
};
use crate::HostResult;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ExecutorStartHook = Rc<dyn Fn(&Backend, &mut QueryDesc, ExecFlags) -> HostResult<()>>;

pub type ExecutorRunHook =
    Rc<dyn Fn(&Backend, &mut QueryDesc, ScanDirection, u64) -> HostResult<()>>;

pub type ExecutorFinishHook = Rc<dyn Fn(&Backend, &mut QueryDesc) -> HostResult<()>>;

pub type ExecutorEndHook = Rc<dyn Fn(&Backend, &mut QueryDesc) -> HostResult<()>>;

/// Arguments: parse tree, source text, context, parameters, destination,
/// completion tag.
pub type ProcessUtilityHook = Rc<
    dyn Fn(
        &Backend,
        &UtilityStmt,
        &str,
        ProcessUtilityContext,
        Option<&ParamList>,
        &mut DestReceiver,
        &mut String,
    ) -> HostResult<()>,
>;

pub struct HookSlot<H> {
    current: RefCell<Option<H>>,
}

impl<H: Clone> HookSlot<H> {
    pub fn new() -> Self {
        Self {
            current: RefCell::new(None),
        }
    }

    /// Clones the installed handler out of the slot, so a handler may
    /// re-enter the backend while it runs.
    pub fn get(&self) -> Option<H> {
        self.current.borrow().clone()
    }

    pub fn replace(&self, hook: Option<H>) -> Option<H> {
        self.current.replace(hook)
    }

    pub fn is_set(&self) -> bool {
        self.current.borrow().is_some()
    }
}

impl<H: Clone> Default for HookSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for HookSlot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.current.borrow().is_some() {
            "installed"
        } else {
            "standard"
        };
        f.write_str(state)
    }
}

#[derive(Debug, Default)]
pub struct HookTable {
    pub executor_start: HookSlot<ExecutorStartHook>,
    pub executor_run: HookSlot<ExecutorRunHook>,
    pub executor_finish: HookSlot<ExecutorFinishHook>,
    pub executor_end: HookSlot<ExecutorEndHook>,
    pub process_utility: HookSlot<ProcessUtilityHook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }
}
