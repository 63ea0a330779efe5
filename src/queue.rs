use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueElementStatus {
    New,
    InProgress,
    Done,
    Failed,
}

impl std::fmt::Display for QueueElementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f,"New"),
            Self::InProgress => write!(f,"InProgress"),
            Self::Done => write!(f,"Done"),
            Self::Failed => write!(f,"Failed"),
        }
    }
}

/// A unit of work waiting in a named queue. Queue triggers become eligible
/// once enough `New` elements of their queue have accumulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueElement {
    #[serde(rename = "uid")]
    pub id: String,
    pub queue_name: String,
    #[serde(skip_serializing_if="Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub data: Option<Value>,
    pub status: QueueElementStatus,
    pub created_date: DateTime<Utc>,
}

impl QueueElement {
    pub fn new(queue_name: &str, reference: Option<String>, data: Option<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            queue_name: queue_name.to_string(),
            reference,
            data,
            status: QueueElementStatus::New,
            created_date: Utc::now(),
        }
    }
}
