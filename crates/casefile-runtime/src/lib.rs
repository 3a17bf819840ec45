//! Casefile Runtime — tier selection, job priorities, and the scheduler
//! that drives the analysis queue under the monthly budget.
//!
//! One sequential worker: jobs are processed one at a time, chunks within
//! a document one at a time, with the request pacer spacing provider calls.

pub mod priority;
pub mod scheduler;
pub mod selector;
pub mod types;

pub use priority::PriorityTable;
pub use scheduler::{PipelineStore, RunContext, Scheduler};
pub use selector::{TierSelector, MIN_USABLE_TEXT_CHARS};
pub use types::*;
