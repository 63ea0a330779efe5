//! Shared storage of triggers, jobs, queue elements, logs and scheduler heartbeats.
//!
//! Several scheduler instances may run against the same store. The only
//! coordination between them is the conditional status transition behind
//! [`TriggerStore::begin`]: an implementation must perform the status check and
//! the write as one atomic step, never as a read followed by a write.

mod memory;
mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use crate::cron_schedule::CronSchedule;
use crate::error::Result;
use crate::heartbeat::SchedulerHeartbeat;
use crate::job::{Job, JobStatus};
use crate::process_log::{LogEntry, LogLevel};
use crate::queue::{QueueElement, QueueElementStatus};
use crate::trigger::{Trigger, TriggerKind, TriggerStatus, TriggerType};

#[async_trait]
pub trait TriggerStore: Send + Sync {

    /// Idle triggers of `kind` that are due right now, highest priority first
    /// and earliest due time first among equal priorities.
    async fn get_pending(&self, kind: TriggerType) -> Result<Vec<Trigger>>;

    async fn begin_single_trigger(&self, id: &str) -> Result<bool>;

    /// Claims a scheduled trigger and moves its `next_run` to `next_run`.
    async fn begin_scheduled_trigger(&self, id: &str, next_run: DateTime<Utc>) -> Result<bool>;

    async fn begin_queue_trigger(&self, id: &str) -> Result<bool>;

    async fn get_trigger(&self, id: &str) -> Result<Trigger>;

    async fn set_trigger_status(&self, id: &str, status: TriggerStatus) -> Result<()>;

    /// Sets `to` only if the trigger currently has status `from`.
    async fn transition_trigger_status(&self, id: &str, from: TriggerStatus, to: TriggerStatus) -> Result<bool>;

    async fn create_trigger(&self, trigger: Trigger) -> Result<Trigger>;

    async fn start_job(&self, process_name: &str, scheduler_name: &str) -> Result<Job>;

    /// Any status other than `Running` stamps `end_time`. Jobs that already
    /// ended are left untouched.
    async fn set_job_status(&self, id: &str, status: JobStatus) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Job>;

    async fn create_log(&self, process_name: &str, level: LogLevel, message: &str) -> Result<()>;

    async fn get_logs(&self, process_name: &str) -> Result<Vec<LogEntry>>;

    async fn send_ping_from_scheduler(&self, machine_name: &str) -> Result<()>;

    async fn start_trigger_from_machine(&self, machine_name: &str, trigger_name: &str) -> Result<()>;

    async fn get_scheduler(&self, machine_name: &str) -> Result<Option<SchedulerHeartbeat>>;

    async fn create_queue_element(&self, queue_name: &str, reference: Option<String>, data: Option<Value>) -> Result<QueueElement>;

    async fn set_queue_element_status(&self, id: &str, status: QueueElementStatus) -> Result<()>;

    async fn get_pending_single_triggers(&self) -> Result<Vec<Trigger>> {
        self.get_pending(TriggerType::Single).await
    }

    async fn get_pending_scheduled_triggers(&self) -> Result<Vec<Trigger>> {
        self.get_pending(TriggerType::Scheduled).await
    }

    async fn get_pending_queue_triggers(&self) -> Result<Vec<Trigger>> {
        self.get_pending(TriggerType::Queue).await
    }

    /// Atomically claims `trigger` (Idle -> Running). Returns `false` when
    /// another scheduler got there first or the trigger is no longer Idle.
    async fn begin(&self, trigger: &Trigger) -> Result<bool> {
        match &trigger.kind {
            TriggerKind::Single { .. } => self.begin_single_trigger(&trigger.id).await,
            TriggerKind::Scheduled { cron_expr, .. } => {
                let next_run: DateTime<Utc> = CronSchedule::parse(cron_expr)?.get_upcoming(Utc::now())?;
                self.begin_scheduled_trigger(&trigger.id, next_run).await
            }
            TriggerKind::Queue { .. } => self.begin_queue_trigger(&trigger.id).await,
        }
    }

    /// Requests a pause. A running trigger is only marked `Pausing` so its
    /// process keeps going; an idle one is paused at once. Returns the
    /// resulting status.
    async fn pause_trigger(&self, id: &str) -> Result<TriggerStatus> {
        if self.transition_trigger_status(id, TriggerStatus::Running, TriggerStatus::Pausing).await? {
            return Ok(TriggerStatus::Pausing);
        }
        if self.transition_trigger_status(id, TriggerStatus::Idle, TriggerStatus::Paused).await? {
            return Ok(TriggerStatus::Paused);
        }
        Ok(self.get_trigger(id).await?.status)
    }

    /// Re-enables a paused or failed trigger.
    async fn resume_trigger(&self, id: &str) -> Result<bool> {
        if self.transition_trigger_status(id, TriggerStatus::Paused, TriggerStatus::Idle).await? {
            return Ok(true);
        }
        self.transition_trigger_status(id, TriggerStatus::Failed, TriggerStatus::Idle).await
    }
}

/// Orders candidates of one kind: priority descending, then due time ascending.
pub(crate) fn sort_pending(triggers: &mut [Trigger]) {
    triggers.sort_by(|a, b| {
        b.priority.cmp(&a.priority).then_with(|| a.due_time().cmp(&b.due_time()))
    });
}
