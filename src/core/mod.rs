pub mod comparator;
pub mod engine;
pub mod scheduler;
pub mod state;
pub mod transfer;

pub use comparator::{FileComparator, Freshness};
pub use engine::{RoundSummary, SyncEngine};
pub use scheduler::{LoopReport, Scheduler};
pub use state::{RunState, RunStateController, StatusReport};
pub use transfer::{CopyOutcome, FileCopier};
