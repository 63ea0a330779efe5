use serde::{Deserialize, Serialize};

pub mod config;
pub mod cron_schedule;
pub mod database;
pub mod error;
pub mod heartbeat;
pub mod job;
pub mod launcher;
pub mod manager;
pub mod process_log;
pub mod queue;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod supervisor;
pub mod trigger;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};

/// Operator commands understood by a running scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    SchedulerResume,
    SchedulerPause,
    /// Switches exclusive mode: only triggers whitelisting this machine are taken.
    SetExclusive(bool),
    /// Kills the supervised job with this id.
    KillJob(String),
    SchedulerGracefulShutdown,
    SchedulerForceShutdown,
}
