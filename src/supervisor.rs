use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use crate::job::{JobStatus, SchedulerJob};
use crate::launcher::remove_checkout;
use crate::process_log::LogLevel;
use crate::store::TriggerStore;
use crate::trigger::{Trigger, TriggerKind, TriggerStatus};

const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// How a tracked child ended, as observed by one poll.
enum Outcome {
    Succeeded,
    Failed(String),
}

/// Owns the jobs launched by this scheduler instance and reconciles their
/// end state into the store.
pub struct JobSupervisor {
    store: Arc<dyn TriggerStore>,
    checkout_root: PathBuf,
    jobs: Vec<SchedulerJob>,
    checkouts_wiped: bool,
}

impl JobSupervisor {

    pub fn new(store: Arc<dyn TriggerStore>, checkout_root: PathBuf) -> Self {
        Self {
            store,
            checkout_root,
            jobs: Vec::new(),
            checkouts_wiped: false,
        }
    }

    pub fn track(&mut self, job: SchedulerJob) {
        self.checkouts_wiped = false;
        self.jobs.push(job);
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn running_triggers(&self) -> Vec<&Trigger> {
        self.jobs.iter().map(|item| &item.trigger).collect()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|item| item.job.id.clone()).collect()
    }

    /// Polls every tracked child without waiting and finalizes those that exited.
    pub async fn reconcile(&mut self) {
        let mut running: Vec<SchedulerJob> = Vec::with_capacity(self.jobs.len());
        let mut finished: Vec<(SchedulerJob, Outcome)> = Vec::new();
        for mut item in self.jobs.drain(..) {
            match item.child.try_wait() {
                Ok(None) => running.push(item),
                Ok(Some(status)) if status.success() => finished.push((item, Outcome::Succeeded)),
                Ok(Some(status)) => finished.push((item, Outcome::Failed(describe_exit(status)))),
                Err(error) => finished.push((item, Outcome::Failed(format!("unable to poll process: {}",error)))),
            }
        }
        self.jobs = running;

        for (item, outcome) in finished {
            match outcome {
                Outcome::Succeeded => self.end_job(item).await,
                Outcome::Failed(reason) => self.fail_job(item, reason).await,
            }
        }

        if self.jobs.is_empty() && !self.checkouts_wiped {
            self.wipe_checkouts().await;
        }
    }

    /// Finalizes a job whose process exited successfully.
    async fn end_job(&self, item: SchedulerJob) {
        info!("job {} of {} is done",item.job.id,item.trigger.name);
        if let Err(error) = self.store.set_job_status(&item.job.id, JobStatus::Done).await {
            error!("unable to close job {}: {}",item.job.id,error);
        }
        let trigger: &Trigger = &item.trigger;
        let result = match trigger.kind {
            TriggerKind::Single { .. } => self.store.set_trigger_status(&trigger.id, TriggerStatus::Done).await,
            TriggerKind::Scheduled { .. } | TriggerKind::Queue { .. } => self.rearm(trigger).await,
        };
        if let Err(error) = result {
            error!("unable to update trigger {}: {}",trigger.name,error);
        }
        if let Some(folder) = &item.checkout {
            remove_checkout(folder).await;
        }
    }

    /// Running goes back to Idle, a pause requested during the run becomes Paused.
    /// Any other status was set by an operator meanwhile and is kept.
    async fn rearm(&self, trigger: &Trigger) -> crate::error::Result<()> {
        if self.store.transition_trigger_status(&trigger.id, TriggerStatus::Running, TriggerStatus::Idle).await? {
            return Ok(());
        }
        if self.store.transition_trigger_status(&trigger.id, TriggerStatus::Pausing, TriggerStatus::Paused).await? {
            info!("trigger {} is paused",trigger.name);
            return Ok(());
        }
        debug!("trigger {} left unchanged after its run",trigger.name);
        Ok(())
    }

    /// Finalizes a job whose process exited with an error and surfaces its stderr.
    async fn fail_job(&self, mut item: SchedulerJob, reason: String) {
        warn!("job {} of {} failed: {}",item.job.id,item.trigger.name,reason);
        if let Err(error) = self.store.set_job_status(&item.job.id, JobStatus::Failed).await {
            error!("unable to close job {}: {}",item.job.id,error);
        }
        if let Err(error) = self.store.set_trigger_status(&item.trigger.id, TriggerStatus::Failed).await {
            error!("unable to mark {} as failed: {}",item.trigger.name,error);
        }
        let stderr: String = item.take_stderr().await;
        let message: String = if stderr.is_empty() {
            format!("Process {} {}",item.trigger.process_name,reason)
        } else {
            stderr
        };
        if let Err(error) = self.store.create_log(&item.trigger.process_name, LogLevel::Error, &message).await {
            error!("unable to write log for {}: {}",item.trigger.name,error);
        }
        if let Some(folder) = &item.checkout {
            remove_checkout(folder).await;
        }
    }

    /// Forcibly terminates a tracked job. Returns `false` if this instance
    /// does not track a job with that id.
    pub async fn kill_job(&mut self, job_id: &str) -> bool {
        let Some(index) = self.jobs.iter().position(|item| item.job.id == job_id) else {
            return false;
        };
        let mut item: SchedulerJob = self.jobs.swap_remove(index);
        if let Err(error) = item.child.start_kill() {
            warn!("unable to kill job {}: {}",job_id,error);
        }
        match tokio::time::timeout(KILL_TIMEOUT, item.child.wait()).await {
            Ok(Ok(status)) => debug!("job {} ended with {}",job_id,status),
            Ok(Err(error)) => warn!("unable to wait for job {}: {}",job_id,error),
            Err(_) => warn!("job {} did not exit within {:?}",job_id,KILL_TIMEOUT),
        }
        info!("job {} of {} killed",job_id,item.trigger.name);
        if let Err(error) = self.store.set_job_status(job_id, JobStatus::Killed).await {
            error!("unable to close job {}: {}",job_id,error);
        }
        if let Err(error) = self.store.set_trigger_status(&item.trigger.id, TriggerStatus::Failed).await {
            error!("unable to mark {} as failed: {}",item.trigger.name,error);
        }
        let message: String = format!("Process {} was killed by an operator",item.trigger.process_name);
        if let Err(error) = self.store.create_log(&item.trigger.process_name, LogLevel::Error, &message).await {
            error!("unable to write log for {}: {}",item.trigger.name,error);
        }
        if let Some(folder) = &item.checkout {
            remove_checkout(folder).await;
        }
        true
    }

    /// Best-effort removal of the whole checkout root, catching checkouts whose
    /// own cleanup was missed. The folder may be absent or in use.
    async fn wipe_checkouts(&mut self) {
        match tokio::fs::remove_dir_all(&self.checkout_root).await {
            Ok(()) => debug!("removed checkout root {:?}",self.checkout_root),
            Err(error) => debug!("checkout root {:?} not removed: {}",self.checkout_root,error),
        }
        self.checkouts_wiped = true;
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {}",code),
        None => format!("terminated by {}",status),
    }
}
