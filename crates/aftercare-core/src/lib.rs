pub mod config;
pub mod error;
pub mod log;
pub mod types;

pub use config::AftercareConfig;
pub use error::{AftercareError, Result};
pub use log::{EventKind, InteractionLog, LogEntry};
pub use types::*;
