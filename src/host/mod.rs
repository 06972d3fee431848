//! Model of the backend process the audit hooks are loaded into.

pub mod backend;
pub mod elog;
pub mod hooks;
pub mod standard;
pub mod types;

pub use backend::{Backend, StandardRoutines};
pub use elog::{LogLevel, LogRecord, LogSink, MemorySink, TracingSink};
pub use hooks::{
    ExecutorEndHook, ExecutorFinishHook, ExecutorRunHook, ExecutorStartHook, HookSlot, HookTable,
    ProcessUtilityHook,
};
pub use standard::SimulatedExecutor;
pub use types::*;
