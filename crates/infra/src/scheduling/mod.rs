//! Scheduling of synchronization passes
//!
//! The scheduler follows explicit lifecycle rules:
//! - start/stop with a tracked join handle
//! - a cancellation token that also cancels the in-flight pass
//! - a bounded wait when stopping

pub mod daily_scheduler;
pub mod error;

pub use daily_scheduler::{
    tick_decision, DailyScheduler, DailySchedulerConfig, ScheduledJob, TickDecision,
};
pub use error::{SchedulerError, SchedulerResult};
