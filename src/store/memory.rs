use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use crate::error::{Error, Result};
use crate::heartbeat::SchedulerHeartbeat;
use crate::job::{Job, JobStatus};
use crate::process_log::{LogEntry, LogLevel};
use crate::queue::{QueueElement, QueueElementStatus};
use crate::trigger::{Trigger, TriggerKind, TriggerStatus, TriggerType};
use super::{sort_pending, TriggerStore};

#[derive(Debug, Default)]
struct State {
    triggers: HashMap<String, Trigger>,
    jobs: HashMap<String, Job>,
    logs: Vec<LogEntry>,
    queue: HashMap<String, QueueElement>,
    schedulers: HashMap<String, SchedulerHeartbeat>,
}

impl State {
    fn new_elements(&self, queue_name: &str) -> usize {
        self.queue.values()
            .filter(|item| item.queue_name == queue_name && item.status == QueueElementStatus::New)
            .count()
    }

    fn trigger_mut(&mut self, id: &str) -> Result<&mut Trigger> {
        self.triggers.get_mut(id).ok_or_else(|| Error::TriggerNotFound { id: id.to_string() })
    }

    /// Claims `id` if it is Idle. Check and write happen under the same lock.
    fn claim(&mut self, id: &str, next_run: Option<DateTime<Utc>>) -> Result<bool> {
        let trigger: &mut Trigger = self.trigger_mut(id)?;
        if trigger.status != TriggerStatus::Idle {
            return Ok(false);
        }
        trigger.status = TriggerStatus::Running;
        trigger.last_run = Some(Utc::now());
        if let (Some(value), TriggerKind::Scheduled { next_run, .. }) = (next_run, &mut trigger.kind) {
            *next_run = value;
        }
        Ok(true)
    }
}

/// Store kept in process memory.
///
/// Every operation runs under one mutex, so conditional transitions are
/// atomic with respect to all schedulers sharing the same instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TriggerStore for MemoryStore {

    async fn get_pending(&self, kind: TriggerType) -> Result<Vec<Trigger>> {
        let state = self.state.lock().await;
        let now: DateTime<Utc> = Utc::now();
        let mut pending: Vec<Trigger> = state.triggers.values()
            .filter(|trigger| trigger.status == TriggerStatus::Idle && trigger.trigger_type() == kind)
            .filter(|trigger| match &trigger.kind {
                TriggerKind::Single { next_run } => *next_run <= now,
                TriggerKind::Scheduled { next_run, .. } => *next_run <= now,
                TriggerKind::Queue { queue_name, min_batch_size } => {
                    state.new_elements(queue_name) >= *min_batch_size as usize
                }
            })
            .cloned()
            .collect();
        sort_pending(&mut pending);
        Ok(pending)
    }

    async fn begin_single_trigger(&self, id: &str) -> Result<bool> {
        self.state.lock().await.claim(id, None)
    }

    async fn begin_scheduled_trigger(&self, id: &str, next_run: DateTime<Utc>) -> Result<bool> {
        self.state.lock().await.claim(id, Some(next_run))
    }

    async fn begin_queue_trigger(&self, id: &str) -> Result<bool> {
        self.state.lock().await.claim(id, None)
    }

    async fn get_trigger(&self, id: &str) -> Result<Trigger> {
        let state = self.state.lock().await;
        state.triggers.get(id).cloned().ok_or_else(|| Error::TriggerNotFound { id: id.to_string() })
    }

    async fn set_trigger_status(&self, id: &str, status: TriggerStatus) -> Result<()> {
        self.state.lock().await.trigger_mut(id)?.status = status;
        Ok(())
    }

    async fn transition_trigger_status(&self, id: &str, from: TriggerStatus, to: TriggerStatus) -> Result<bool> {
        let mut state = self.state.lock().await;
        let trigger: &mut Trigger = state.trigger_mut(id)?;
        if trigger.status != from {
            return Ok(false);
        }
        trigger.status = to;
        Ok(true)
    }

    async fn create_trigger(&self, trigger: Trigger) -> Result<Trigger> {
        self.state.lock().await.triggers.insert(trigger.id.clone(), trigger.clone());
        Ok(trigger)
    }

    async fn start_job(&self, process_name: &str, scheduler_name: &str) -> Result<Job> {
        let job: Job = Job::new(process_name, scheduler_name);
        self.state.lock().await.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn set_job_status(&self, id: &str, status: JobStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        let job: &mut Job = state.jobs.get_mut(id).ok_or_else(|| Error::JobNotFound { id: id.to_string() })?;
        if job.end_time.is_some() {
            return Ok(());
        }
        job.status = status;
        if status != JobStatus::Running {
            job.end_time = Some(Utc::now());
        }
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        let state = self.state.lock().await;
        state.jobs.get(id).cloned().ok_or_else(|| Error::JobNotFound { id: id.to_string() })
    }

    async fn create_log(&self, process_name: &str, level: LogLevel, message: &str) -> Result<()> {
        self.state.lock().await.logs.push(LogEntry::new(process_name, level, message));
        Ok(())
    }

    async fn get_logs(&self, process_name: &str) -> Result<Vec<LogEntry>> {
        let state = self.state.lock().await;
        Ok(state.logs.iter().filter(|entry| entry.process_name == process_name).cloned().collect())
    }

    async fn send_ping_from_scheduler(&self, machine_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.schedulers.entry(machine_name.to_string())
            .or_insert_with(|| SchedulerHeartbeat::new(machine_name))
            .last_update = Utc::now();
        Ok(())
    }

    async fn start_trigger_from_machine(&self, machine_name: &str, trigger_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let now: DateTime<Utc> = Utc::now();
        let heartbeat: &mut SchedulerHeartbeat = state.schedulers.entry(machine_name.to_string())
            .or_insert_with(|| SchedulerHeartbeat::new(machine_name));
        heartbeat.last_update = now;
        heartbeat.latest_trigger = Some(trigger_name.to_string());
        heartbeat.latest_trigger_time = Some(now);
        Ok(())
    }

    async fn get_scheduler(&self, machine_name: &str) -> Result<Option<SchedulerHeartbeat>> {
        Ok(self.state.lock().await.schedulers.get(machine_name).cloned())
    }

    async fn create_queue_element(&self, queue_name: &str, reference: Option<String>, data: Option<Value>) -> Result<QueueElement> {
        let element: QueueElement = QueueElement::new(queue_name, reference, data);
        self.state.lock().await.queue.insert(element.id.clone(), element.clone());
        Ok(element)
    }

    async fn set_queue_element_status(&self, id: &str, status: QueueElementStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.queue.get_mut(id) {
            Some(element) => {
                element.status = status;
                Ok(())
            }
            None => Err(Error::InvalidRecord {
                id: id.to_string(),
                message: "queue element not found".to_string()
            })
        }
    }
}
