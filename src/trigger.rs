use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerStatus {
    Idle,
    Running,
    Failed,
    Done,
    Paused,
    Pausing,
}

impl std::fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f,"Idle"),
            Self::Running => write!(f,"Running"),
            Self::Failed => write!(f,"Failed"),
            Self::Done => write!(f,"Done"),
            Self::Paused => write!(f,"Paused"),
            Self::Pausing => write!(f,"Pausing"),
        }
    }
}

/// The kind of a trigger without its payload.
///
/// The declaration order is the dispatch precedence used to break priority ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    Single,
    Scheduled,
    Queue,
}

impl TriggerType {
    pub const PRECEDENCE: [TriggerType; 3] = [
        TriggerType::Single,
        TriggerType::Scheduled,
        TriggerType::Queue
    ];
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f,"Single"),
            Self::Scheduled => write!(f,"Scheduled"),
            Self::Queue => write!(f,"Queue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// Fires once when `next_run` has passed and is Done afterwards.
    Single {
        next_run: DateTime<Utc>
    },
    /// Fires whenever `next_run` has passed. Every claim moves `next_run` to
    /// the next instant of `cron_expr` after the claim.
    Scheduled {
        cron_expr: String,
        next_run: DateTime<Utc>
    },
    /// Fires once `min_batch_size` elements of `queue_name` are waiting.
    Queue {
        queue_name: String,
        min_batch_size: u32
    },
}

/// A persisted rule describing when and how to launch a process.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub id: String,
    pub name: String,
    pub process_name: String,
    pub process_path: String,
    pub process_args: String,
    pub is_git_repo: bool,
    pub git_branch: Option<String>,
    pub is_blocking: bool,
    pub priority: i64,
    pub scheduler_whitelist: Vec<String>,
    pub status: TriggerStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub kind: TriggerKind,
}

impl Trigger {

    fn new(name: &str, process_name: &str, process_path: &str, kind: TriggerKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            process_name: process_name.to_string(),
            process_path: process_path.to_string(),
            process_args: String::new(),
            is_git_repo: false,
            git_branch: None,
            is_blocking: false,
            priority: 0,
            scheduler_whitelist: Vec::new(),
            status: TriggerStatus::Idle,
            last_run: None,
            kind
        }
    }

    pub fn single(name: &str, process_name: &str, process_path: &str, next_run: DateTime<Utc>) -> Self {
        Self::new(name, process_name, process_path, TriggerKind::Single { next_run })
    }

    pub fn scheduled(name: &str, process_name: &str, process_path: &str, cron_expr: &str, next_run: DateTime<Utc>) -> Self {
        Self::new(name, process_name, process_path, TriggerKind::Scheduled {
            cron_expr: cron_expr.to_string(),
            next_run
        })
    }

    pub fn queue(name: &str, process_name: &str, process_path: &str, queue_name: &str, min_batch_size: u32) -> Self {
        Self::new(name, process_name, process_path, TriggerKind::Queue {
            queue_name: queue_name.to_string(),
            min_batch_size
        })
    }

    pub fn set_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn set_blocking(mut self, is_blocking: bool) -> Self {
        self.is_blocking = is_blocking;
        self
    }

    pub fn set_args(mut self, process_args: &str) -> Self {
        self.process_args = process_args.to_string();
        self
    }

    pub fn set_git_repo(mut self, git_branch: Option<&str>) -> Self {
        self.is_git_repo = true;
        self.git_branch = git_branch.map(|value| value.to_string());
        self
    }

    pub fn set_whitelist(mut self, machines: &[&str]) -> Self {
        self.scheduler_whitelist = machines.iter().map(|value| value.to_string()).collect();
        self
    }

    pub fn trigger_type(&self) -> TriggerType {
        match self.kind {
            TriggerKind::Single { .. } => TriggerType::Single,
            TriggerKind::Scheduled { .. } => TriggerType::Scheduled,
            TriggerKind::Queue { .. } => TriggerType::Queue,
        }
    }

    /// The instant used to order candidates of equal priority and kind.
    /// Queue triggers have no due instant and order by their last run instead.
    pub fn due_time(&self) -> Option<DateTime<Utc>> {
        match &self.kind {
            TriggerKind::Single { next_run } => Some(*next_run),
            TriggerKind::Scheduled { next_run, .. } => Some(*next_run),
            TriggerKind::Queue { .. } => self.last_run,
        }
    }

    /// Whether `machine_name` may run this trigger.
    /// In exclusive mode only triggers that name the machine explicitly qualify.
    pub fn allows_machine(&self, machine_name: &str, exclusive_mode: bool) -> bool {
        if self.scheduler_whitelist.is_empty() {
            return !exclusive_mode;
        }
        self.scheduler_whitelist.iter().any(|value| value == machine_name)
    }
}

/// Flat row form of a [`Trigger`] as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub uid: String,
    pub name: String,
    pub kind: TriggerType,
    pub process_name: String,
    pub process_path: String,
    #[serde(default)]
    pub process_args: String,
    #[serde(default)]
    pub is_git_repo: bool,
    #[serde(skip_serializing_if="Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub is_blocking: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub scheduler_whitelist: Vec<String>,
    pub status: TriggerStatus,
    #[serde(skip_serializing_if="Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub cron_expr: Option<String>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub queue_name: Option<String>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub min_batch_size: Option<u32>,
}

impl From<&Trigger> for TriggerRecord {
    fn from(trigger: &Trigger) -> Self {
        let (next_run, cron_expr, queue_name, min_batch_size) = match &trigger.kind {
            TriggerKind::Single { next_run } => (Some(*next_run), None, None, None),
            TriggerKind::Scheduled { cron_expr, next_run } => (Some(*next_run), Some(cron_expr.clone()), None, None),
            TriggerKind::Queue { queue_name, min_batch_size } => (None, None, Some(queue_name.clone()), Some(*min_batch_size)),
        };
        Self {
            uid: trigger.id.clone(),
            name: trigger.name.clone(),
            kind: trigger.trigger_type(),
            process_name: trigger.process_name.clone(),
            process_path: trigger.process_path.clone(),
            process_args: trigger.process_args.clone(),
            is_git_repo: trigger.is_git_repo,
            git_branch: trigger.git_branch.clone(),
            is_blocking: trigger.is_blocking,
            priority: trigger.priority,
            scheduler_whitelist: trigger.scheduler_whitelist.clone(),
            status: trigger.status,
            last_run: trigger.last_run,
            next_run,
            cron_expr,
            queue_name,
            min_batch_size,
        }
    }
}

impl TryFrom<TriggerRecord> for Trigger {
    type Error = Error;

    fn try_from(record: TriggerRecord) -> Result<Self> {
        let missing = |field: &str| Error::InvalidRecord {
            id: record.uid.clone(),
            message: format!("{} trigger without {}",record.kind,field)
        };
        let kind: TriggerKind = match record.kind {
            TriggerType::Single => TriggerKind::Single {
                next_run: record.next_run.ok_or_else(|| missing("next_run"))?
            },
            TriggerType::Scheduled => TriggerKind::Scheduled {
                cron_expr: record.cron_expr.clone().ok_or_else(|| missing("cron_expr"))?,
                next_run: record.next_run.ok_or_else(|| missing("next_run"))?
            },
            TriggerType::Queue => TriggerKind::Queue {
                queue_name: record.queue_name.clone().ok_or_else(|| missing("queue_name"))?,
                min_batch_size: record.min_batch_size.unwrap_or(1)
            },
        };
        Ok(Self {
            id: record.uid,
            name: record.name,
            process_name: record.process_name,
            process_path: record.process_path,
            process_args: record.process_args,
            is_git_repo: record.is_git_repo,
            git_branch: record.git_branch,
            is_blocking: record.is_blocking,
            priority: record.priority,
            scheduler_whitelist: record.scheduler_whitelist,
            status: record.status,
            last_run: record.last_run,
            kind,
        })
    }
}
