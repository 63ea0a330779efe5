use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness record of one scheduler machine. There is exactly one per
/// machine name; every tick refreshes `last_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerHeartbeat {
    pub machine_name: String,
    pub last_update: DateTime<Utc>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub latest_trigger: Option<String>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub latest_trigger_time: Option<DateTime<Utc>>,
}

impl SchedulerHeartbeat {
    pub fn new(machine_name: &str) -> Self {
        Self {
            machine_name: machine_name.to_string(),
            last_update: Utc::now(),
            latest_trigger: None,
            latest_trigger_time: None,
        }
    }
}
