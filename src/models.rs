use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Up,
    Down,
}

impl From<bool> for Status {
    fn from(reachable: bool) -> Self {
        if reachable { Status::Up } else { Status::Down }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Up => f.write_str("UP"),
            Status::Down => f.write_str("DOWN"),
        }
    }
}

/// A confirmed change produced by the debounce state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// First state established after startup. Closes nothing.
    Initial { status: Status },
    /// A confirmed flip away from the previous state.
    Changed {
        status: Status,
        previous: Status,
        lasted: Duration,
        total_up: Duration,
        total_down: Duration,
    },
}

impl Transition {
    #[cfg(test)]
    pub fn status(&self) -> Status {
        match self {
            Transition::Initial { status } | Transition::Changed { status, .. } => *status,
        }
    }
}

/// Point-in-time view of a monitor, with the open state already folded into the totals.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub name: String,
    pub address: String,
    pub state: Option<Status>,
    pub since: Option<DateTime<Utc>>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    #[serde(rename = "total_up_secs", serialize_with = "as_secs")]
    pub total_up: Duration,
    #[serde(rename = "total_down_secs", serialize_with = "as_secs")]
    pub total_down: Duration,
}

fn as_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}
