//! Error types for the topicflow runner.
//!
//! Two layers live here. [`TopicflowError`] covers infrastructure failures
//! (HTTP, browser driver, I/O, configuration). [`StageError`] is the
//! per-stage taxonomy a job pipeline attributes its terminal failure to;
//! it never escapes a job's outcome.

use crate::core::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The main error type for topicflow operations.
#[derive(Debug, Error)]
pub enum TopicflowError {
    /// The process environment or config file is incomplete.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// An HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The browser automation driver reported an error.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TopicflowError {
    /// Creates an HTTP error.
    #[must_use]
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http(message.into())
    }

    /// Creates a browser error.
    #[must_use]
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser(message.into())
    }
}

impl From<reqwest::Error> for TopicflowError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Raised at startup when a required setting is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration error: {key}: {message}")]
pub struct ConfigurationError {
    /// The offending setting (config key or environment variable).
    pub key: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an error for a required setting that was not provided.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::new(key, "required value is missing")
    }
}

/// Failure of a single pipeline stage.
///
/// The `Display` output is the reason string recorded in a job's
/// `Failure` outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageError {
    /// The page was unreachable or did not load within its timeout.
    #[error("navigation failed: {reason}")]
    Navigation {
        /// Driver or timeout message.
        reason: String,
    },

    /// The page loaded but the trigger control was absent.
    #[error("control not found")]
    MissingControl {
        /// The selector that matched nothing.
        selector: String,
    },

    /// The artifact never appeared in the listing within the poll budget.
    #[error("artifact not observed")]
    ArtifactTimeout {
        /// Number of polling rounds performed.
        polls: usize,
    },

    /// The conversion endpoint failed or returned an unusable response.
    #[error("{reason}")]
    Conversion {
        /// Last response summary or transport error.
        reason: String,
    },
}

impl StageError {
    /// Creates a navigation error.
    #[must_use]
    pub fn navigation(reason: impl Into<String>) -> Self {
        Self::Navigation {
            reason: reason.into(),
        }
    }

    /// Creates a missing control error.
    #[must_use]
    pub fn missing_control(selector: impl Into<String>) -> Self {
        Self::MissingControl {
            selector: selector.into(),
        }
    }

    /// Creates a conversion error.
    #[must_use]
    pub fn conversion(reason: impl Into<String>) -> Self {
        Self::Conversion {
            reason: reason.into(),
        }
    }

    /// The stage this error is attributed to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Navigation { .. } => Stage::PageLoad,
            Self::MissingControl { .. } => Stage::Trigger,
            Self::ArtifactTimeout { .. } => Stage::ArtifactPoll,
            Self::Conversion { .. } => Stage::Convert,
        }
    }

    /// Whether the stage itself retries this error before giving up.
    #[must_use]
    pub const fn is_stage_retryable(&self) -> bool {
        matches!(self, Self::Navigation { .. } | Self::Conversion { .. })
    }

    /// Taxonomy name used in structured reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Navigation { .. } => "NavigationError",
            Self::MissingControl { .. } => "MissingControlError",
            Self::ArtifactTimeout { .. } => "ArtifactTimeoutError",
            Self::Conversion { .. } => "ConversionError",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> BTreeMap<String, serde_json::Value> {
        let mut map = BTreeMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("stage".to_string(), serde_json::json!(self.stage()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        match self {
            Self::MissingControl { selector } => {
                map.insert("selector".to_string(), serde_json::json!(selector));
            }
            Self::ArtifactTimeout { polls } => {
                map.insert("polls".to_string(), serde_json::json!(polls));
            }
            Self::Navigation { .. } | Self::Conversion { .. } => {}
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_reasons() {
        assert_eq!(StageError::missing_control("#pdfBtn").to_string(), "control not found");
        assert_eq!(
            StageError::ArtifactTimeout { polls: 36 }.to_string(),
            "artifact not observed"
        );
        assert_eq!(
            StageError::navigation("timed out").to_string(),
            "navigation failed: timed out"
        );
        assert_eq!(StageError::conversion("HTTP 500").to_string(), "HTTP 500");
    }

    #[test]
    fn test_stage_attribution() {
        assert_eq!(StageError::navigation("x").stage(), Stage::PageLoad);
        assert_eq!(StageError::missing_control("x").stage(), Stage::Trigger);
        assert_eq!(StageError::ArtifactTimeout { polls: 1 }.stage(), Stage::ArtifactPoll);
        assert_eq!(StageError::conversion("x").stage(), Stage::Convert);
    }

    #[test]
    fn test_stage_retryability() {
        assert!(StageError::navigation("x").is_stage_retryable());
        assert!(StageError::conversion("x").is_stage_retryable());
        assert!(!StageError::missing_control("x").is_stage_retryable());
        assert!(!StageError::ArtifactTimeout { polls: 3 }.is_stage_retryable());
    }

    #[test]
    fn test_stage_error_to_dict() {
        let dict = StageError::missing_control("#pdfBtn").to_dict();
        assert_eq!(dict.get("type").unwrap(), "MissingControlError");
        assert_eq!(dict.get("stage").unwrap(), "trigger");
        assert_eq!(dict.get("selector").unwrap(), "#pdfBtn");
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::missing("TOPICFLOW_TOKEN");
        assert!(err.to_string().contains("TOPICFLOW_TOKEN"));

        let wrapped: TopicflowError = err.into();
        assert!(matches!(wrapped, TopicflowError::Configuration(_)));
    }
}
