//! Periodic polling of a listing location until the artifact appears.

use crate::collaborators::ListingSource;
use crate::core::FilenamePattern;
use crate::events::LogSink;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Polling budget and cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fixed wait between rounds in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of rounds.
    #[serde(default = "default_max_polls")]
    pub max_polls: usize,
}

const fn default_interval_ms() -> u64 {
    5_000
}

const fn default_max_polls() -> usize {
    36
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

impl PollConfig {
    /// Creates a poll configuration.
    #[must_use]
    pub fn new(interval: Duration, max_polls: usize) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            max_polls,
        }
    }

    /// Gets the interval as Duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// What a polling run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// An entry matched on the given 1-based round.
    Found {
        /// The matching entry, as listed.
        entry: String,
        /// Round the match was observed on.
        round: usize,
    },
    /// No entry matched within the budget.
    NotFound {
        /// Rounds performed.
        rounds: usize,
    },
}

impl PollOutcome {
    /// Rounds consumed by the poll.
    #[must_use]
    pub const fn rounds(&self) -> usize {
        match self {
            Self::Found { round, .. } => *round,
            Self::NotFound { rounds } => *rounds,
        }
    }
}

/// Returns the first entry, in listing order, that matches the pattern.
#[must_use]
pub fn find_match<'a>(entries: &'a [String], pattern: &FilenamePattern) -> Option<&'a str> {
    entries
        .iter()
        .find(|entry| pattern.matches(entry))
        .map(String::as_str)
}

/// Polls a [`ListingSource`] at a fixed interval.
///
/// A failed listing query counts as a round with no match; only exhausting
/// the round budget ends polling without a match.
#[derive(Clone)]
pub struct ArtifactPoller {
    listing: Arc<dyn ListingSource>,
    config: PollConfig,
}

impl ArtifactPoller {
    /// Creates a new poller.
    #[must_use]
    pub fn new(listing: Arc<dyn ListingSource>, config: PollConfig) -> Self {
        Self { listing, config }
    }

    /// The polling configuration.
    #[must_use]
    pub const fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls `location` until an entry matches `pattern` or the budget runs out.
    ///
    /// Every round's observed entries are appended to `sink`.
    pub async fn poll(
        &self,
        label: &str,
        location: &str,
        pattern: &FilenamePattern,
        sink: &dyn LogSink,
    ) -> PollOutcome {
        let max_polls = self.config.max_polls;

        for round in 1..=max_polls {
            match self.listing.list(location, pattern.candidates()).await {
                Ok(entries) => {
                    sink.info(&format!(
                        "[{label}] poll {round}/{max_polls} observed {entries:?}"
                    ));
                    if let Some(entry) = find_match(&entries, pattern) {
                        sink.info(&format!(
                            "[{label}] artifact {entry} observed on poll {round}/{max_polls}"
                        ));
                        return PollOutcome::Found {
                            entry: entry.to_string(),
                            round,
                        };
                    }
                }
                Err(e) => {
                    sink.warn(&format!("[{label}] poll {round}/{max_polls} listing failed: {e}"));
                }
            }

            if round < max_polls {
                tokio::time::sleep(self.config.interval()).await;
            }
        }

        sink.warn(&format!(
            "[{label}] artifact not observed after {max_polls} polls of {location}"
        ));
        PollOutcome::NotFound { rounds: max_polls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingLogSink, NoOpLogSink};
    use crate::testing::ScriptedListing;
    use chrono::NaiveDate;

    fn pattern() -> FilenamePattern {
        FilenamePattern::for_topic("history", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn poller(listing: Arc<ScriptedListing>, max_polls: usize) -> ArtifactPoller {
        ArtifactPoller::new(listing, PollConfig::new(Duration::from_millis(1), max_polls))
    }

    #[test]
    fn test_poll_config_interval_saturates() {
        assert_eq!(PollConfig::new(Duration::from_millis(1_500), 3).interval_ms, 1_500);
        assert_eq!(PollConfig::new(Duration::MAX, 3).interval_ms, u64::MAX);
    }

    #[test]
    fn test_find_match_first_in_listing_order() {
        let entries = vec![
            "unrelated.pdf".to_string(),
            "TODAYS-HISTORY-LARGE-PRINT-WORD-SEARCH-2024-06-01.pdf".to_string(),
            "todays-history-large-print-word-search-06_01_2024.pdf".to_string(),
        ];
        assert_eq!(
            find_match(&entries, &pattern()),
            Some("TODAYS-HISTORY-LARGE-PRINT-WORD-SEARCH-2024-06-01.pdf")
        );
        assert_eq!(find_match(&entries[..1], &pattern()), None);
    }

    #[tokio::test]
    async fn test_poll_found_on_third_round() {
        let listing = Arc::new(ScriptedListing::new(vec![
            Ok(vec![]),
            Ok(vec!["other.pdf".to_string()]),
            Ok(vec!["todays-history-large-print-word-search-06_01_2024.pdf".to_string()]),
        ]));
        let sink = CollectingLogSink::new();

        let outcome = poller(listing.clone(), 36)
            .poll("history", "https://x/auto-pdfs/history/", &pattern(), &sink)
            .await;

        assert_eq!(
            outcome,
            PollOutcome::Found {
                entry: "todays-history-large-print-word-search-06_01_2024.pdf".to_string(),
                round: 3,
            }
        );
        assert_eq!(listing.calls(), 3);
        assert!(sink.contains("poll 2/36 observed [\"other.pdf\"]"));
    }

    #[tokio::test]
    async fn test_poll_first_match_wins() {
        let listing = Arc::new(ScriptedListing::new(vec![
            Ok(vec!["todays-history-large-print-word-search-06_01_2024-v1.pdf".to_string()]),
            Ok(vec!["todays-history-large-print-word-search-06_01_2024.pdf".to_string()]),
        ]));
        let outcome = poller(listing.clone(), 5)
            .poll("history", "loc", &pattern(), &NoOpLogSink)
            .await;

        assert_eq!(outcome.rounds(), 1);
        assert_eq!(listing.calls(), 1);
    }

    #[tokio::test]
    async fn test_poll_tolerates_listing_failures() {
        let listing = Arc::new(ScriptedListing::new(vec![
            Err("connection reset".to_string()),
            Ok(vec!["todays-history-large-print-word-search-06_01_2024.pdf".to_string()]),
        ]));
        let sink = CollectingLogSink::new();

        let outcome = poller(listing, 3).poll("history", "loc", &pattern(), &sink).await;

        assert_eq!(outcome.rounds(), 2);
        assert!(sink.contains("poll 1/3 listing failed"));
    }

    #[tokio::test]
    async fn test_poll_budget_exhausted() {
        let listing = Arc::new(ScriptedListing::new(vec![]));
        let sink = CollectingLogSink::new();

        let outcome = poller(listing.clone(), 4).poll("history", "loc", &pattern(), &sink).await;

        assert_eq!(outcome, PollOutcome::NotFound { rounds: 4 });
        assert_eq!(listing.calls(), 4);
        assert!(sink.contains("artifact not observed after 4 polls"));
    }

    #[tokio::test]
    async fn test_poll_zero_budget_never_queries() {
        let listing = Arc::new(ScriptedListing::new(vec![Ok(vec![
            "todays-history-large-print-word-search-06_01_2024.pdf".to_string(),
        ])]));

        let outcome = poller(listing.clone(), 0)
            .poll("history", "loc", &pattern(), &NoOpLogSink)
            .await;

        assert_eq!(outcome, PollOutcome::NotFound { rounds: 0 });
        assert_eq!(listing.calls(), 0);
    }
}
