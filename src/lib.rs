pub mod audit;
pub mod config;
pub mod error;
pub mod guc;
pub mod host;
pub mod logging;
pub mod session;

pub use self::audit::AuditTrail;
pub use self::config::Config;
pub use self::error::{Error, HostError, HostResult, Result};
