//! Sequential per-topic scheduling with whole-topic re-runs.

use super::stage_pipeline::JobExecutor;
use crate::core::{FilenamePattern, JobEvent, Stage, Topic};
use crate::events::LogSink;
use crate::summary::TopicReport;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Terminal stages after which a whole topic is run again from a fresh page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRetryScope {
    stages: BTreeSet<Stage>,
}

impl Default for JobRetryScope {
    fn default() -> Self {
        Self::all()
    }
}

impl JobRetryScope {
    /// Re-run after a failure in any stage.
    #[must_use]
    pub fn all() -> Self {
        Self::only(Stage::ALL)
    }

    /// Never re-run.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            stages: BTreeSet::new(),
        }
    }

    /// Re-run only after failures in `stages`.
    #[must_use]
    pub fn only(stages: impl IntoIterator<Item = Stage>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    /// Whether a failure in `stage` warrants a re-run.
    #[must_use]
    pub fn includes(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Extra whole-topic runs allowed after a failed run.
    pub job_retries: usize,
    /// Pause between topics and before a re-run.
    pub inter_topic_delay: Duration,
    /// Which failures are re-run.
    pub retry_scope: JobRetryScope,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            job_retries: 1,
            inter_topic_delay: Duration::from_secs(20),
            retry_scope: JobRetryScope::default(),
        }
    }
}

/// Runs topics one after another and collects one report per topic.
///
/// A topic's failure never stops the batch.
pub struct Scheduler {
    executor: Arc<dyn JobExecutor>,
    settings: SchedulerSettings,
    sink: Arc<dyn LogSink>,
}

impl Scheduler {
    /// Creates a scheduler over `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn JobExecutor>, settings: SchedulerSettings, sink: Arc<dyn LogSink>) -> Self {
        Self {
            executor,
            settings,
            sink,
        }
    }

    /// The scheduler settings.
    #[must_use]
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Processes `topics` in order for `run_date`.
    pub async fn run(&self, topics: &[Topic], run_date: NaiveDate) -> Vec<TopicReport> {
        let mut reports = Vec::with_capacity(topics.len());

        for (index, topic) in topics.iter().enumerate() {
            if index > 0 {
                self.pause(&format!("waiting {}ms before next topic", self.delay_ms()))
                    .await;
            }
            let pattern = FilenamePattern::for_topic(&topic.name, run_date);
            reports.push(self.run_topic(topic, &pattern).await);
        }

        reports
    }

    /// Runs one topic, re-running it while its failure is in scope and
    /// re-runs remain.
    pub async fn run_topic(&self, topic: &Topic, pattern: &FilenamePattern) -> TopicReport {
        let name = topic.name.as_str();
        let max_runs = self.settings.job_retries.saturating_add(1);
        let mut events = Vec::new();
        let mut run = 0;

        loop {
            run += 1;
            let message = format!("[{name}] starting run {run}/{max_runs}");
            self.sink.info(&message);
            events.push(JobEvent::new(None, message));

            let job = self.executor.run_job(topic, pattern).await;
            tracing::debug!(topic = name, job_id = %job.job_id(), run, "Job finished");
            let (_, outcome, stage_attempts, job_events) = job.into_parts();
            events.extend(job_events);

            let rerun_stage = outcome
                .failed_stage()
                .filter(|stage| run < max_runs && self.settings.retry_scope.includes(*stage));

            let Some(stage) = rerun_stage else {
                return TopicReport {
                    topic: topic.clone(),
                    outcome,
                    job_attempts: run,
                    stage_attempts,
                    events,
                };
            };

            let message = format!(
                "[{name}] run {run}/{max_runs} failed at {stage}; re-running in {}ms",
                self.delay_ms()
            );
            self.sink.warn(&message);
            events.push(JobEvent::new(None, message));
            tokio::time::sleep(self.settings.inter_topic_delay).await;
        }
    }

    fn delay_ms(&self) -> u128 {
        self.settings.inter_topic_delay.as_millis()
    }

    async fn pause(&self, message: &str) {
        self.sink.info(message);
        tokio::time::sleep(self.settings.inter_topic_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Job, Outcome};
    use crate::events::CollectingLogSink;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};

    /// Finishes jobs with scripted outcomes per topic; unscripted runs succeed.
    #[derive(Default)]
    struct ScriptedExecutor {
        outcomes: Mutex<HashMap<String, VecDeque<Outcome>>>,
        runs: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn with(self, topic: &str, outcomes: Vec<Outcome>) -> Self {
            self.outcomes.lock().insert(topic.to_string(), outcomes.into());
            self
        }

        fn runs(&self) -> Vec<String> {
            self.runs.lock().clone()
        }
    }

    #[async_trait]
    impl JobExecutor for ScriptedExecutor {
        async fn run_job(&self, topic: &Topic, _pattern: &FilenamePattern) -> Job {
            self.runs.lock().push(topic.name.clone());
            let outcome = self
                .outcomes
                .lock()
                .get_mut(&topic.name)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Outcome::success("a.pdf", json!({"status": "ok"})));
            let mut job = Job::new(topic.clone());
            job.finish(outcome);
            job
        }
    }

    fn topics(names: &[&str]) -> Vec<Topic> {
        names
            .iter()
            .map(|n| Topic::new(*n, format!("https://x/{n}.html")))
            .collect()
    }

    fn settings(job_retries: usize, retry_scope: JobRetryScope) -> SchedulerSettings {
        SchedulerSettings {
            job_retries,
            inter_topic_delay: Duration::from_millis(1),
            retry_scope,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_retry_scope() {
        assert!(JobRetryScope::default().includes(Stage::Trigger));
        assert!(!JobRetryScope::none().includes(Stage::PageLoad));

        let scope = JobRetryScope::only([Stage::PageLoad, Stage::Convert]);
        assert!(scope.includes(Stage::Convert));
        assert!(!scope.includes(Stage::Trigger));

        let parsed: JobRetryScope = serde_json::from_str(r#"["page_load","trigger"]"#).unwrap();
        assert_eq!(parsed, JobRetryScope::only([Stage::PageLoad, Stage::Trigger]));
    }

    #[tokio::test]
    async fn test_topics_run_in_order() {
        let executor = Arc::new(ScriptedExecutor::default());
        let scheduler = Scheduler::new(
            executor.clone(),
            settings(1, JobRetryScope::all()),
            Arc::new(CollectingLogSink::new()),
        );

        let reports = scheduler.run(&topics(&["a", "b", "c"]), date()).await;

        let names: Vec<&str> = reports.iter().map(|r| r.topic.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(executor.runs(), vec!["a", "b", "c"]);
        assert!(reports.iter().all(|r| r.job_attempts == 1));
    }

    #[tokio::test]
    async fn test_failure_rerun_then_continue() {
        let executor = Arc::new(ScriptedExecutor::default().with(
            "b",
            vec![
                Outcome::failure(Stage::Trigger, "control not found"),
                Outcome::failure(Stage::Trigger, "control not found"),
            ],
        ));
        let sink = Arc::new(CollectingLogSink::new());
        let scheduler = Scheduler::new(executor.clone(), settings(1, JobRetryScope::all()), sink.clone());

        let reports = scheduler.run(&topics(&["a", "b", "c"]), date()).await;

        assert_eq!(executor.runs(), vec!["a", "b", "b", "c"]);
        assert_eq!(reports[1].job_attempts, 2);
        assert_eq!(reports[1].outcome.failed_stage(), Some(Stage::Trigger));
        assert!(reports[2].outcome.is_success());
        assert!(sink.contains("[b] run 1/2 failed at trigger"));
    }

    #[tokio::test]
    async fn test_unbounded_job_retries_do_not_overflow() {
        let executor = Arc::new(ScriptedExecutor::default());
        let sink = Arc::new(CollectingLogSink::new());
        let scheduler = Scheduler::new(
            executor.clone(),
            settings(usize::MAX, JobRetryScope::all()),
            sink.clone(),
        );

        let reports = scheduler.run(&topics(&["a"]), date()).await;

        assert_eq!(reports[0].job_attempts, 1);
        assert!(sink.contains(&format!("[a] starting run 1/{}", usize::MAX)));
    }

    #[tokio::test]
    async fn test_rerun_recovers() {
        let executor = Arc::new(ScriptedExecutor::default().with(
            "a",
            vec![Outcome::failure(Stage::PageLoad, "navigation failed: reset")],
        ));
        let scheduler = Scheduler::new(
            executor.clone(),
            settings(2, JobRetryScope::all()),
            Arc::new(CollectingLogSink::new()),
        );

        let reports = scheduler.run(&topics(&["a"]), date()).await;

        assert!(reports[0].outcome.is_success());
        assert_eq!(reports[0].job_attempts, 2);
    }

    #[tokio::test]
    async fn test_out_of_scope_failure_not_rerun() {
        let executor = Arc::new(ScriptedExecutor::default().with(
            "a",
            vec![Outcome::failure(Stage::ArtifactPoll, "artifact not observed")],
        ));
        let scheduler = Scheduler::new(
            executor.clone(),
            settings(3, JobRetryScope::only([Stage::PageLoad])),
            Arc::new(CollectingLogSink::new()),
        );

        let reports = scheduler.run(&topics(&["a"]), date()).await;

        assert_eq!(executor.runs().len(), 1);
        assert_eq!(reports[0].job_attempts, 1);
    }

    #[tokio::test]
    async fn test_no_pause_after_last_topic() {
        let sink = Arc::new(CollectingLogSink::new());
        let scheduler = Scheduler::new(
            Arc::new(ScriptedExecutor::default()),
            settings(0, JobRetryScope::all()),
            sink.clone(),
        );

        scheduler.run(&topics(&["a", "b"]), date()).await;

        let pauses = sink
            .messages()
            .iter()
            .filter(|m| m.contains("before next topic"))
            .count();
        assert_eq!(pauses, 1);
    }

    #[tokio::test]
    async fn test_report_events_include_runs() {
        let executor = Arc::new(ScriptedExecutor::default().with(
            "a",
            vec![Outcome::failure(Stage::Convert, "HTTP 500: boom")],
        ));
        let scheduler = Scheduler::new(executor, settings(1, JobRetryScope::all()), Arc::new(CollectingLogSink::new()));

        let reports = scheduler.run(&topics(&["a"]), date()).await;

        let messages: Vec<&str> = reports[0].events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.iter().filter(|m| m.contains("starting run")).count(), 2);
        assert!(messages.iter().any(|m| m.contains("re-running")));
    }
}
