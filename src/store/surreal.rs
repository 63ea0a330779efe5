use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use crate::database::Db;
use crate::error::{Error, Result};
use crate::heartbeat::SchedulerHeartbeat;
use crate::job::{Job, JobStatus};
use crate::process_log::{LogEntry, LogLevel};
use crate::queue::{QueueElement, QueueElementStatus};
use crate::trigger::{Trigger, TriggerKind, TriggerRecord, TriggerStatus, TriggerType};
use super::{sort_pending, TriggerStore};

const TRIGGER_TABLE: &str = "triggerd_triggers";
const JOB_TABLE: &str = "triggerd_jobs";
const LOG_TABLE: &str = "triggerd_logs";
const QUEUE_TABLE: &str = "triggerd_queues";
const SCHEDULER_TABLE: &str = "triggerd_schedulers";

#[derive(Debug, Deserialize)]
struct Total {
    total: u64
}

#[derive(Debug, Serialize)]
struct TriggerStartPatch {
    machine_name: String,
    last_update: DateTime<Utc>,
    #[serde(skip_serializing_if="Option::is_none")]
    latest_trigger: Option<String>,
    #[serde(skip_serializing_if="Option::is_none")]
    latest_trigger_time: Option<DateTime<Utc>>,
}

/// [`TriggerStore`] backed by SurrealDB.
///
/// Records carry their key in a `uid` field. Timestamps are stored as RFC 3339
/// strings, so due times are compared after loading rather than in queries.
#[derive(Debug, Clone)]
pub struct SurrealStore {
    db: Db,
}

impl SurrealStore {

    pub async fn new(db: Db) -> Result<Self> {
        let store: Self = Self { db };
        store.define_tables().await?;
        Ok(store)
    }

    #[instrument(skip_all)]
    async fn define_tables(&self) -> Result<()> {
        for table in [TRIGGER_TABLE, JOB_TABLE, LOG_TABLE, QUEUE_TABLE, SCHEDULER_TABLE] {
            let stmt: String = format!("DEFINE TABLE IF NOT EXISTS {};",table);
            self.db.client.query(stmt).await?.check()?;
            debug!("table {} is ready",table);
        }
        info!("triggerd tables are defined");
        Ok(())
    }

    async fn list_triggers(&self, stmt: &str, kind: TriggerType) -> Result<Vec<Trigger>> {
        let mut response = self.db.client.query(stmt.to_string())
            .bind(("table", TRIGGER_TABLE))
            .bind(("kind", kind))
            .bind(("status", TriggerStatus::Idle))
            .await?;
        let records: Vec<TriggerRecord> = response.take(0)?;
        let mut triggers: Vec<Trigger> = Vec::with_capacity(records.len());
        for record in records {
            let uid: String = record.uid.clone();
            match Trigger::try_from(record) {
                Ok(trigger) => triggers.push(trigger),
                Err(error) => error!("skipping trigger {}: {}",uid,error)
            }
        }
        Ok(triggers)
    }

    async fn count_new_elements(&self, queue_name: &str) -> Result<u64> {
        let mut response = self.db.client.query(
            "SELECT count() AS total FROM type::table($table) WHERE queue_name = $queue_name AND status = $status GROUP ALL"
        )
            .bind(("table", QUEUE_TABLE))
            .bind(("queue_name", queue_name.to_string()))
            .bind(("status", QueueElementStatus::New))
            .await?;
        let total: Option<Total> = response.take(0)?;
        Ok(total.map(|item| item.total).unwrap_or(0))
    }

    /// The single conditional statement every claim goes through.
    async fn claim(&self, id: &str, next_run: Option<DateTime<Utc>>) -> Result<bool> {
        let stmt: &str = if next_run.is_some() {
            "UPDATE type::table($table) SET status = $running, last_run = $now, next_run = $next_run WHERE uid = $uid AND status = $idle RETURN AFTER"
        } else {
            "UPDATE type::table($table) SET status = $running, last_run = $now WHERE uid = $uid AND status = $idle RETURN AFTER"
        };
        let mut query = self.db.client.query(stmt)
            .bind(("table", TRIGGER_TABLE))
            .bind(("uid", id.to_string()))
            .bind(("running", TriggerStatus::Running))
            .bind(("idle", TriggerStatus::Idle))
            .bind(("now", Utc::now()));
        if let Some(value) = next_run {
            query = query.bind(("next_run", value));
        }
        let mut response = query.await?;
        let updated: Vec<TriggerRecord> = response.take(0)?;
        Ok(!updated.is_empty())
    }
}

#[async_trait]
impl TriggerStore for SurrealStore {

    async fn get_pending(&self, kind: TriggerType) -> Result<Vec<Trigger>> {
        let now: DateTime<Utc> = Utc::now();
        let candidates: Vec<Trigger> = self.list_triggers(
            "SELECT * FROM type::table($table) WHERE kind = $kind AND status = $status",
            kind
        ).await?;
        let mut pending: Vec<Trigger> = Vec::with_capacity(candidates.len());
        for trigger in candidates {
            let due: bool = match &trigger.kind {
                TriggerKind::Single { next_run } => *next_run <= now,
                TriggerKind::Scheduled { next_run, .. } => *next_run <= now,
                TriggerKind::Queue { queue_name, min_batch_size } => {
                    self.count_new_elements(queue_name).await? >= u64::from(*min_batch_size)
                }
            };
            if due {
                pending.push(trigger);
            }
        }
        sort_pending(&mut pending);
        Ok(pending)
    }

    async fn begin_single_trigger(&self, id: &str) -> Result<bool> {
        self.claim(id, None).await
    }

    async fn begin_scheduled_trigger(&self, id: &str, next_run: DateTime<Utc>) -> Result<bool> {
        self.claim(id, Some(next_run)).await
    }

    async fn begin_queue_trigger(&self, id: &str) -> Result<bool> {
        self.claim(id, None).await
    }

    async fn get_trigger(&self, id: &str) -> Result<Trigger> {
        let record: Option<TriggerRecord> = self.db.client.select((TRIGGER_TABLE, id.to_string())).await?;
        match record {
            Some(record) => Trigger::try_from(record),
            None => Err(Error::TriggerNotFound { id: id.to_string() })
        }
    }

    async fn set_trigger_status(&self, id: &str, status: TriggerStatus) -> Result<()> {
        let mut response = self.db.client.query("UPDATE type::table($table) SET status = $status WHERE uid = $uid RETURN AFTER")
            .bind(("table", TRIGGER_TABLE))
            .bind(("uid", id.to_string()))
            .bind(("status", status))
            .await?;
        let updated: Vec<TriggerRecord> = response.take(0)?;
        if updated.is_empty() {
            return Err(Error::TriggerNotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn transition_trigger_status(&self, id: &str, from: TriggerStatus, to: TriggerStatus) -> Result<bool> {
        let mut response = self.db.client.query("UPDATE type::table($table) SET status = $to WHERE uid = $uid AND status = $from RETURN AFTER")
            .bind(("table", TRIGGER_TABLE))
            .bind(("uid", id.to_string()))
            .bind(("from", from))
            .bind(("to", to))
            .await?;
        let updated: Vec<TriggerRecord> = response.take(0)?;
        Ok(!updated.is_empty())
    }

    async fn create_trigger(&self, trigger: Trigger) -> Result<Trigger> {
        let record: TriggerRecord = TriggerRecord::from(&trigger);
        let created: Option<TriggerRecord> = self.db.client.create((TRIGGER_TABLE, trigger.id.clone())).content(record).await?;
        match created {
            Some(record) => Trigger::try_from(record),
            None => Err(Error::InvalidRecord {
                id: trigger.id,
                message: "unable to create trigger".to_string()
            })
        }
    }

    async fn start_job(&self, process_name: &str, scheduler_name: &str) -> Result<Job> {
        let job: Job = Job::new(process_name, scheduler_name);
        let created: Option<Job> = self.db.client.create((JOB_TABLE, job.id.clone())).content(job.clone()).await?;
        created.ok_or(Error::InvalidRecord {
            id: job.id,
            message: "unable to create job".to_string()
        })
    }

    async fn set_job_status(&self, id: &str, status: JobStatus) -> Result<()> {
        let stmt: &str = if status == JobStatus::Running {
            "UPDATE type::table($table) SET status = $status WHERE uid = $uid AND end_time = NONE RETURN AFTER"
        } else {
            "UPDATE type::table($table) SET status = $status, end_time = $now WHERE uid = $uid AND end_time = NONE RETURN AFTER"
        };
        let mut response = self.db.client.query(stmt)
            .bind(("table", JOB_TABLE))
            .bind(("uid", id.to_string()))
            .bind(("status", status))
            .bind(("now", Utc::now()))
            .await?;
        let updated: Vec<Job> = response.take(0)?;
        if updated.is_empty() {
            // Either unknown or already ended; only the former is an error.
            self.get_job(id).await?;
            debug!("job {} already ended, status {} ignored",id,status);
        }
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        let job: Option<Job> = self.db.client.select((JOB_TABLE, id.to_string())).await?;
        job.ok_or_else(|| Error::JobNotFound { id: id.to_string() })
    }

    async fn create_log(&self, process_name: &str, level: LogLevel, message: &str) -> Result<()> {
        let entry: LogEntry = LogEntry::new(process_name, level, message);
        let _: Option<LogEntry> = self.db.client.create((LOG_TABLE, entry.id.clone())).content(entry).await?;
        Ok(())
    }

    async fn get_logs(&self, process_name: &str) -> Result<Vec<LogEntry>> {
        let mut response = self.db.client.query("SELECT * FROM type::table($table) WHERE process_name = $process_name")
            .bind(("table", LOG_TABLE))
            .bind(("process_name", process_name.to_string()))
            .await?;
        let mut entries: Vec<LogEntry> = response.take(0)?;
        entries.sort_by(|a, b| a.log_time.cmp(&b.log_time));
        Ok(entries)
    }

    async fn send_ping_from_scheduler(&self, machine_name: &str) -> Result<()> {
        let patch: TriggerStartPatch = TriggerStartPatch {
            machine_name: machine_name.to_string(),
            last_update: Utc::now(),
            latest_trigger: None,
            latest_trigger_time: None,
        };
        let _: Option<SchedulerHeartbeat> = self.db.client.upsert((SCHEDULER_TABLE, machine_name.to_string())).merge(patch).await?;
        Ok(())
    }

    async fn start_trigger_from_machine(&self, machine_name: &str, trigger_name: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let patch: TriggerStartPatch = TriggerStartPatch {
            machine_name: machine_name.to_string(),
            last_update: now,
            latest_trigger: Some(trigger_name.to_string()),
            latest_trigger_time: Some(now),
        };
        let _: Option<SchedulerHeartbeat> = self.db.client.upsert((SCHEDULER_TABLE, machine_name.to_string())).merge(patch).await?;
        Ok(())
    }

    async fn get_scheduler(&self, machine_name: &str) -> Result<Option<SchedulerHeartbeat>> {
        Ok(self.db.client.select((SCHEDULER_TABLE, machine_name.to_string())).await?)
    }

    async fn create_queue_element(&self, queue_name: &str, reference: Option<String>, data: Option<Value>) -> Result<QueueElement> {
        let element: QueueElement = QueueElement::new(queue_name, reference, data);
        let created: Option<QueueElement> = self.db.client.create((QUEUE_TABLE, element.id.clone())).content(element.clone()).await?;
        created.ok_or(Error::InvalidRecord {
            id: element.id,
            message: "unable to create queue element".to_string()
        })
    }

    async fn set_queue_element_status(&self, id: &str, status: QueueElementStatus) -> Result<()> {
        let mut response = self.db.client.query("UPDATE type::table($table) SET status = $status WHERE uid = $uid RETURN AFTER")
            .bind(("table", QUEUE_TABLE))
            .bind(("uid", id.to_string()))
            .bind(("status", status))
            .await?;
        let updated: Vec<QueueElement> = response.take(0)?;
        if updated.is_empty() {
            return Err(Error::InvalidRecord {
                id: id.to_string(),
                message: "queue element not found".to_string()
            });
        }
        Ok(())
    }
}
