//! Pipeline stage enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One ordered phase of a job's pipeline.
///
/// The derived ordering follows execution order, so a job can only move
/// to a stage that compares greater than its current one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Navigate to the topic's source page.
    #[default]
    PageLoad,
    /// Locate and activate the generation control.
    Trigger,
    /// Wait for the generated artifact to appear server-side.
    ArtifactPoll,
    /// Ask the remote service to convert the artifact.
    Convert,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::PageLoad, Self::Trigger, Self::ArtifactPoll, Self::Convert];

    /// Returns the stage that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::PageLoad => Some(Self::Trigger),
            Self::Trigger => Some(Self::ArtifactPoll),
            Self::ArtifactPoll => Some(Self::Convert),
            Self::Convert => None,
        }
    }

    /// Returns the snake_case name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageLoad => "page_load",
            Self::Trigger => "trigger",
            Self::ArtifactPoll => "artifact_poll",
            Self::Convert => "convert",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::PageLoad < Stage::Trigger);
        assert!(Stage::Trigger < Stage::ArtifactPoll);
        assert!(Stage::ArtifactPoll < Stage::Convert);
    }

    #[test]
    fn test_stage_next_walks_all() {
        let mut walked = vec![Stage::default()];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL.to_vec());
    }

    #[test]
    fn test_stage_default_is_first() {
        assert_eq!(Stage::default(), Stage::ALL[0]);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::PageLoad.to_string(), "page_load");
        assert_eq!(Stage::ArtifactPoll.to_string(), "artifact_poll");
    }

    #[test]
    fn test_stage_serialize() {
        let json = serde_json::to_string(&Stage::Trigger).unwrap();
        assert_eq!(json, r#""trigger""#);

        let deserialized: Stage = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, Stage::Trigger);
    }
}
