//! Job record: one execution of the stage pipeline for a topic.

use super::{JobEvent, Outcome, Stage, Topic};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// One execution of the pipeline for a topic.
///
/// The current stage only moves forward and the outcome is set once.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    job_id: Uuid,
    topic: Topic,
    stage: Stage,
    attempts: BTreeMap<Stage, usize>,
    events: Vec<JobEvent>,
    outcome: Option<Outcome>,
}

impl Job {
    /// Creates a job positioned at the first stage.
    #[must_use]
    pub fn new(topic: Topic) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            topic,
            stage: Stage::PageLoad,
            attempts: BTreeMap::new(),
            events: Vec::new(),
            outcome: None,
        }
    }

    /// Unique id of this execution.
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// The topic being processed.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The stage the job is in (or terminated in).
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves to `next`. Returns false, leaving the stage unchanged, if
    /// `next` is not strictly after the current stage or the job is finished.
    pub fn advance(&mut self, next: Stage) -> bool {
        if self.outcome.is_some() || next <= self.stage {
            tracing::warn!(
                topic = %self.topic.name,
                from = %self.stage,
                to = %next,
                "Rejected non-forward stage transition"
            );
            return false;
        }
        self.stage = next;
        true
    }

    /// Records how many attempts a stage consumed.
    pub fn record_attempts(&mut self, stage: Stage, attempts: usize) {
        self.attempts.insert(stage, attempts);
    }

    /// Attempts consumed by `stage` (zero if it never ran).
    #[must_use]
    pub fn attempts(&self, stage: Stage) -> usize {
        self.attempts.get(&stage).copied().unwrap_or(0)
    }

    /// Attempt counts for every stage that ran.
    #[must_use]
    pub const fn attempt_counts(&self) -> &BTreeMap<Stage, usize> {
        &self.attempts
    }

    /// Appends an event.
    pub fn record(&mut self, event: JobEvent) {
        self.events.push(event);
    }

    /// Events recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> &[JobEvent] {
        &self.events
    }

    /// Sets the terminal outcome. A second call is ignored.
    pub fn finish(&mut self, outcome: Outcome) {
        if self.outcome.is_some() {
            tracing::warn!(topic = %self.topic.name, "Job outcome already set; ignoring");
            return;
        }
        self.outcome = Some(outcome);
    }

    /// The terminal outcome, once set.
    #[must_use]
    pub const fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Returns true once an outcome has been set.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Splits the job into its parts, substituting a failure if no outcome was set.
    #[must_use]
    pub fn into_parts(self) -> (Topic, Outcome, BTreeMap<Stage, usize>, Vec<JobEvent>) {
        let outcome = self.outcome.unwrap_or_else(|| {
            Outcome::failure(self.stage, "pipeline ended without an outcome")
        });
        (self.topic, outcome, self.attempts, self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic::new("history", "https://example.com/history.html")
    }

    #[test]
    fn test_job_starts_at_page_load() {
        let job = Job::new(topic());
        assert_eq!(job.stage(), Stage::PageLoad);
        assert!(!job.is_finished());
        assert_eq!(job.attempts(Stage::Convert), 0);
    }

    #[test]
    fn test_advance_is_forward_only() {
        let mut job = Job::new(topic());
        assert!(job.advance(Stage::Trigger));
        assert!(!job.advance(Stage::Trigger));
        assert!(!job.advance(Stage::PageLoad));
        assert!(job.advance(Stage::Convert));
        assert_eq!(job.stage(), Stage::Convert);
    }

    #[test]
    fn test_finish_only_once() {
        let mut job = Job::new(topic());
        job.finish(Outcome::failure(Stage::PageLoad, "first"));
        job.finish(Outcome::failure(Stage::PageLoad, "second"));
        assert_eq!(job.outcome(), Some(&Outcome::failure(Stage::PageLoad, "first")));
        assert!(!job.advance(Stage::Trigger));
    }

    #[test]
    fn test_into_parts_without_outcome() {
        let mut job = Job::new(topic());
        job.advance(Stage::ArtifactPoll);
        job.record_attempts(Stage::PageLoad, 2);
        let (_, outcome, attempts, _) = job.into_parts();
        assert_eq!(outcome.failed_stage(), Some(Stage::ArtifactPoll));
        assert_eq!(attempts.get(&Stage::PageLoad), Some(&2));
    }
}
