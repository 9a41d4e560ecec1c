//! Topics and the filename patterns that recognize their artifacts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One independent content category processed per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic name, also used as the artifact folder and converter parameter.
    pub name: String,
    /// Page that generates the topic's document.
    pub source_url: String,
}

impl Topic {
    /// Creates a new topic.
    #[must_use]
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
        }
    }
}

/// Ordered candidate substrings used to recognize a topic's artifact.
///
/// Order is a preference hint only: any candidate matching an entry is
/// accepted. Candidates are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenamePattern {
    candidates: Vec<String>,
}

impl FilenamePattern {
    /// Builds a pattern from explicit candidates, dropping empty and duplicate entries.
    #[must_use]
    pub fn from_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.into().trim().to_lowercase();
            if !candidate.is_empty() && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        Self { candidates: out }
    }

    /// Candidates for the artifact a topic produces on `date`.
    ///
    /// The generator names files `todays-<topic>-large-print-word-search-<MM_DD_YYYY>.pdf`;
    /// an ISO-dated variant and the extension-free stem are accepted as fallbacks.
    #[must_use]
    pub fn for_topic(topic: &str, date: NaiveDate) -> Self {
        let stem = format!("todays-{}-large-print-word-search", topic.to_lowercase());
        let us_date = date.format("%m_%d_%Y");
        let iso_date = date.format("%Y-%m-%d");
        Self::from_candidates([
            format!("{stem}-{us_date}.pdf"),
            format!("{stem}-{iso_date}.pdf"),
            format!("{stem}-{us_date}"),
        ])
    }

    /// The candidates in preference order.
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The most preferred candidate.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }

    /// Returns the first candidate that `entry` contains, ignoring case.
    #[must_use]
    pub fn matching_candidate(&self, entry: &str) -> Option<&str> {
        let entry = entry.to_lowercase();
        self.candidates
            .iter()
            .find(|candidate| entry.contains(candidate.as_str()))
            .map(String::as_str)
    }

    /// Whether `entry` contains any candidate, ignoring case.
    #[must_use]
    pub fn matches(&self, entry: &str) -> bool {
        self.matching_candidate(entry).is_some()
    }

    /// Returns true if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
