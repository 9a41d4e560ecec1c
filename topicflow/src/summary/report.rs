//! Per-topic reports and the run summary built from them.

use crate::core::{JobEvent, Outcome, Stage, Topic};
use crate::errors::TopicflowError;
use crate::utils::format_timestamp;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write;
use uuid::Uuid;

/// Final result for one topic after any whole-topic re-runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicReport {
    /// The topic processed.
    pub topic: Topic,
    /// Outcome of the last run.
    pub outcome: Outcome,
    /// Whole-topic runs performed (at least one).
    pub job_attempts: usize,
    /// Attempts per stage during the last run.
    pub stage_attempts: BTreeMap<Stage, usize>,
    /// Events from every run, in order.
    pub events: Vec<JobEvent>,
}

impl TopicReport {
    /// One human-readable line for this topic.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let name = &self.topic.name;
        let runs = self.job_attempts;
        match &self.outcome {
            Outcome::Success { artifact_name, .. } => {
                format!("[{name}] SUCCESS {artifact_name} (runs: {runs})")
            }
            Outcome::Failure { stage, reason } => {
                format!("[{name}] FAILURE at {stage}: {reason} (runs: {runs})")
            }
        }
    }
}

/// The report of one invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    run_id: Uuid,
    run_date: NaiveDate,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    reports: Vec<TopicReport>,
}

impl RunSummary {
    /// Builds a summary from reports in topic input order.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        run_date: NaiveDate,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        reports: Vec<TopicReport>,
    ) -> Self {
        Self {
            run_id,
            run_date,
            started_at,
            ended_at,
            reports,
        }
    }

    /// Run identifier.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Date the run processed.
    #[must_use]
    pub const fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    /// When the run started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the last topic finished.
    #[must_use]
    pub const fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Reports in topic input order.
    #[must_use]
    pub fn reports(&self) -> &[TopicReport] {
        &self.reports
    }

    /// Number of topics that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    /// Number of topics that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }

    /// Renders the flat, human-readable report.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Run summary {} for {}", self.run_id, self.run_date);
        let _ = writeln!(
            text,
            "Started {}, ended {}",
            format_timestamp(&self.started_at),
            format_timestamp(&self.ended_at)
        );
        for report in &self.reports {
            let _ = writeln!(text, "{}", report.summary_line());
        }
        let _ = writeln!(
            text,
            "Totals: {} succeeded, {} failed, {} topics",
            self.succeeded(),
            self.failed(),
            self.reports.len()
        );
        text
    }

    /// The structured record of the run.
    pub fn to_record(&self) -> Result<serde_json::Value, TopicflowError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Hex SHA-256 of the rendered text.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.render_text().as_bytes()))
    }
}
