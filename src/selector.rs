use std::sync::Arc;
use tracing::{debug, error, info};
use crate::error::Error;
use crate::process_log::LogLevel;
use crate::store::TriggerStore;
use crate::trigger::{Trigger, TriggerStatus, TriggerType};

/// Picks and claims the next trigger this machine should run.
pub struct TriggerSelector {
    store: Arc<dyn TriggerStore>,
}

impl TriggerSelector {

    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        Self { store }
    }

    /// Returns the claimed trigger, already Running, or `None` when nothing
    /// eligible could be claimed.
    ///
    /// `running` are the triggers of the jobs this instance currently supervises.
    /// Priority is compared across all kinds; equal priorities fall back to the
    /// kind precedence Single, Scheduled, Queue and then to the earliest due time.
    pub async fn select_next(&self, running: &[&Trigger], machine_name: &str, exclusive_mode: bool) -> Option<Trigger> {
        let other_blocking_active: bool = running.iter().any(|trigger| trigger.is_blocking);
        let candidates: Vec<Trigger> = self.candidates(machine_name, exclusive_mode, other_blocking_active).await;

        for mut candidate in candidates {
            match self.store.begin(&candidate).await {
                Ok(true) => {
                    info!("claimed trigger {} (priority {})",candidate.name,candidate.priority);
                    candidate.status = TriggerStatus::Running;
                    return Some(candidate);
                }
                Ok(false) => debug!("trigger {} was claimed elsewhere",candidate.name),
                Err(error @ Error::Cron { .. }) => self.reject(&candidate, error).await,
                Err(error) => error!("unable to claim trigger {}: {}",candidate.name,error),
            }
        }
        None
    }

    /// Marks a trigger that can never be claimed as Failed and records why.
    /// Only the instance that moves it out of Idle writes the log entry.
    async fn reject(&self, trigger: &Trigger, error: Error) {
        error!("trigger {} cannot be scheduled: {}",trigger.name,error);
        match self.store.transition_trigger_status(&trigger.id, TriggerStatus::Idle, TriggerStatus::Failed).await {
            Ok(true) => {
                let message: String = format!("Unable to schedule trigger {}: {}",trigger.name,error);
                if let Err(error) = self.store.create_log(&trigger.process_name, LogLevel::Error, &message).await {
                    error!("unable to write log for {}: {}",trigger.name,error);
                }
            }
            Ok(false) => debug!("trigger {} already left Idle",trigger.name),
            Err(error) => error!("unable to mark {} as failed: {}",trigger.name,error),
        }
    }

    async fn candidates(&self, machine_name: &str, exclusive_mode: bool, other_blocking_active: bool) -> Vec<Trigger> {
        let mut candidates: Vec<Trigger> = Vec::new();
        for kind in TriggerType::PRECEDENCE {
            match self.store.get_pending(kind).await {
                Ok(pending) => {
                    candidates.extend(pending.into_iter().filter(|trigger| {
                        trigger.allows_machine(machine_name, exclusive_mode)
                            && !(trigger.is_blocking && other_blocking_active)
                    }));
                }
                Err(error) => error!("unable to list pending {} triggers: {}",kind,error),
            }
        }
        candidates.sort_by(|a, b| {
            b.priority.cmp(&a.priority)
                .then_with(|| a.trigger_type().cmp(&b.trigger_type()))
                .then_with(|| a.due_time().cmp(&b.due_time()))
        });
        candidates
    }
}
