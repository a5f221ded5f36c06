pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use commands::ControlCommand;
pub use config::DaemonConfig;
pub use self::core::{RoundSummary, RunState, RunStateController, Scheduler, SyncEngine};
pub use error::{BackupError, Result};
