//! Timestamped job events.

use super::Stage;
use serde::{Deserialize, Serialize};

/// A timestamped diagnostic line recorded while a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The stage the job was in, if it had started one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,

    /// The event message.
    pub message: String,
}

impl JobEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(stage: Option<Stage>, message: impl Into<String>) -> Self {
        Self {
            timestamp: crate::utils::iso_timestamp(),
            stage,
            message: message.into(),
        }
    }

    /// Renders the event as a flat log line.
    #[must_use]
    pub fn to_line(&self) -> String {
        match self.stage {
            Some(stage) => format!("{} - [{}] {}", self.timestamp, stage, self.message),
            None => format!("{} - {}", self.timestamp, self.message),
        }
    }
}
