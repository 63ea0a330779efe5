use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;
use crate::trigger::Trigger;

/// Upper bound for the captured stderr of a single child process.
const MAX_STDERR_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Done,
    Failed,
    Killed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f,"Running"),
            Self::Done => write!(f,"Done"),
            Self::Failed => write!(f,"Failed"),
            Self::Killed => write!(f,"Killed"),
        }
    }
}

/// One execution record of a trigger, bound to one OS process.
///
/// `end_time` is set exactly when `status` leaves `Running` and the record is
/// not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "uid")]
    pub id: String,
    pub process_name: String,
    pub scheduler_name: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(process_name: &str, scheduler_name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            process_name: process_name.to_string(),
            scheduler_name: scheduler_name.to_string(),
            status: JobStatus::Running,
            start_time: Utc::now(),
            end_time: None,
        }
    }
}

/// A launched child process bound to its trigger and job record.
///
/// Lives only while the supervisor tracks it.
#[derive(Debug)]
pub struct SchedulerJob {
    pub trigger: Trigger,
    pub job: Job,
    pub checkout: Option<PathBuf>,
    pub(crate) child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl SchedulerJob {

    pub(crate) fn new(trigger: Trigger, job: Job, checkout: Option<PathBuf>, mut child: Child) -> Self {
        // Drained concurrently so a chatty child never blocks on a full pipe.
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_stderr(pipe)));
        Self {
            trigger,
            job,
            checkout,
            child,
            stderr,
        }
    }

    /// Collects everything the child wrote to stderr. Only meaningful once the
    /// process has exited.
    pub(crate) async fn take_stderr(&mut self) -> String {
        match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        }
    }
}

async fn read_stderr(pipe: ChildStderr) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let _ = pipe.take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).trim_end().to_string()
}
