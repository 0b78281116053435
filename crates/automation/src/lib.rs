//! Automation runtime: trigger matching, the sharded execution queue, the
//! action executor, and the delay scheduler that resumes deferred runs.

pub mod delay;
pub mod executor;
pub mod matcher;
pub mod queue;

#[cfg(test)]
mod testing;

pub use delay::DelayScheduler;
pub use executor::{AutomationExecutor, ExecutionReport};
pub use matcher::{trigger_for, TriggerMatcher};
pub use queue::{execution_channels, ExecutionQueue, ExecutionReceivers, ExecutionSenders};
