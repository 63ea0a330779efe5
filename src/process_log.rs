use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Info,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f,"Trace"),
            Self::Info => write!(f,"Info"),
            Self::Error => write!(f,"Error"),
        }
    }
}

/// A log line attributed to a process, readable by operators from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "uid")]
    pub id: String,
    pub process_name: String,
    pub level: LogLevel,
    pub message: String,
    pub log_time: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(process_name: &str, level: LogLevel, message: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            process_name: process_name.to_string(),
            level,
            message: message.to_string(),
            log_time: Utc::now(),
        }
    }
}
