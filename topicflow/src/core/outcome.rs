//! Terminal job outcomes.

use super::Stage;
use crate::errors::StageError;
use serde::{Deserialize, Serialize};

/// The terminal result of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// Every stage completed.
    Success {
        /// Listing entry recognized as the topic's artifact.
        artifact_name: String,
        /// Structured payload returned by the conversion endpoint.
        conversion_payload: serde_json::Value,
    },
    /// A stage failed terminally.
    Failure {
        /// The stage the failure is attributed to.
        stage: Stage,
        /// Human-readable reason.
        reason: String,
    },
}

impl Outcome {
    /// Creates a success outcome.
    #[must_use]
    pub fn success(artifact_name: impl Into<String>, conversion_payload: serde_json::Value) -> Self {
        Self::Success {
            artifact_name: artifact_name.into(),
            conversion_payload,
        }
    }

    /// Creates a failure outcome.
    #[must_use]
    pub fn failure(stage: Stage, reason: impl Into<String>) -> Self {
        Self::Failure {
            stage,
            reason: reason.into(),
        }
    }

    /// Returns true if the outcome is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the failed stage, if any.
    #[must_use]
    pub const fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Failure { stage, .. } => Some(*stage),
            Self::Success { .. } => None,
        }
    }
}

impl From<StageError> for Outcome {
    fn from(err: StageError) -> Self {
        Self::failure(err.stage(), err.to_string())
    }
}
