//! The per-topic stage pipeline: page load, trigger, artifact poll, convert.
//!
//! Each stage has its own failure policy. Page loads and conversion calls are
//! retried by [`retry`]; a missing trigger control fails the job at once; the
//! artifact poll is bounded by its own round budget. The first terminal
//! failure short-circuits the remaining stages.

use super::poller::{ArtifactPoller, PollOutcome};
use super::retry::{retry, RetryPolicy};
use crate::collaborators::{ConversionClient, PageDriver, PageHandle};
use crate::core::{FilenamePattern, Job, JobEvent, Outcome, Stage, Topic};
use crate::errors::StageError;
use crate::events::LogSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

/// Runs one job for a topic and returns the finished record.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Executes the pipeline once. The returned job always carries an outcome.
    async fn run_job(&self, topic: &Topic, pattern: &FilenamePattern) -> Job;
}

/// Stage-level settings for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on a single page load.
    pub load_timeout: Duration,
    /// Fixed wait after load before looking for the trigger control.
    pub settle_delay: Duration,
    /// CSS selector of the trigger control.
    pub trigger_selector: String,
    /// Retry policy for page loads.
    pub load_retry: RetryPolicy,
    /// Retry policy for conversion calls.
    pub convert_retry: RetryPolicy,
    /// Capture a screenshot when the trigger control is missing.
    pub screenshot_on_missing_control: bool,
    /// Directory screenshots are written to.
    pub screenshot_dir: PathBuf,
    /// Base URL under which each topic's artifact folder lives.
    pub artifact_base_url: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(90),
            settle_delay: Duration::from_secs(12),
            trigger_selector: "#pdfBtn".to_string(),
            load_retry: RetryPolicy::fixed(2, Duration::from_secs(10)),
            convert_retry: RetryPolicy::fixed(3, Duration::from_secs(20)),
            screenshot_on_missing_control: true,
            screenshot_dir: PathBuf::from("."),
            artifact_base_url: "https://wordsearchtoprint.com/auto-pdfs".to_string(),
        }
    }
}

impl PipelineSettings {
    /// Folder polled for a topic's artifact.
    #[must_use]
    pub fn artifact_location(&self, topic: &str) -> String {
        format!("{}/{}/", self.artifact_base_url.trim_end_matches('/'), topic)
    }
}

/// Sink handed to stages while a job runs.
///
/// Every line goes to the run sink and is also recorded on the job as an
/// event tagged with the job's current stage.
struct JobRecorder<'a> {
    sink: &'a dyn LogSink,
    job: Mutex<Job>,
}

impl<'a> JobRecorder<'a> {
    fn new(job: Job, sink: &'a dyn LogSink) -> Self {
        Self {
            sink,
            job: Mutex::new(job),
        }
    }

    fn enter(&self, stage: Stage) {
        self.job.lock().advance(stage);
    }

    fn record_attempts(&self, stage: Stage, attempts: usize) {
        self.job.lock().record_attempts(stage, attempts);
    }

    fn finish(self, outcome: Outcome) -> Job {
        let mut job = self.job.into_inner();
        job.finish(outcome);
        job
    }
}

impl LogSink for JobRecorder<'_> {
    fn append(&self, level: Level, message: &str) {
        self.sink.append(level, message);
        let mut job = self.job.lock();
        let stage = job.stage();
        job.record(JobEvent::new(Some(stage), message));
    }
}

/// Drives a topic through the four stages.
#[derive(Clone)]
pub struct StagePipeline {
    page: Arc<dyn PageDriver>,
    poller: ArtifactPoller,
    converter: ConversionClient,
    settings: PipelineSettings,
    sink: Arc<dyn LogSink>,
}

impl StagePipeline {
    /// Creates a pipeline over its collaborators.
    #[must_use]
    pub fn new(
        page: Arc<dyn PageDriver>,
        poller: ArtifactPoller,
        converter: ConversionClient,
        settings: PipelineSettings,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            page,
            poller,
            converter,
            settings,
            sink,
        }
    }

    /// The pipeline settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs the pipeline once for `topic`.
    pub async fn run(&self, topic: &Topic, pattern: &FilenamePattern) -> Job {
        let recorder = JobRecorder::new(Job::new(topic.clone()), self.sink.as_ref());
        let name = topic.name.as_str();
        let mut page = None;

        let outcome = match self.drive(topic, pattern, &recorder, &mut page).await {
            Ok(outcome) => {
                recorder.info(&format!("[{name}] completed"));
                outcome
            }
            Err(e) => {
                recorder.error(&format!("[{name}] failed at {}: {e}", e.stage()));
                Outcome::from(e)
            }
        };

        if let Some(page) = page {
            self.page.close(page).await;
        }

        recorder.finish(outcome)
    }

    async fn drive(
        &self,
        topic: &Topic,
        pattern: &FilenamePattern,
        recorder: &JobRecorder<'_>,
        page_slot: &mut Option<PageHandle>,
    ) -> Result<Outcome, StageError> {
        let name = topic.name.as_str();
        let settings = &self.settings;

        recorder.info(&format!("[{name}] loading {}", topic.source_url));
        let url = topic.source_url.as_str();
        let loaded = retry(&settings.load_retry, name, recorder, |_| self.load_page(url)).await;
        recorder.record_attempts(Stage::PageLoad, loaded.attempts);
        let page: &PageHandle = page_slot.insert(loaded.result?);

        recorder.enter(Stage::Trigger);
        tokio::time::sleep(settings.settle_delay).await;
        recorder.record_attempts(Stage::Trigger, 1);
        let selector = settings.trigger_selector.as_str();
        let Some(control) = self.page.find_control(page, selector).await else {
            recorder.warn(&format!("[{name}] {selector} not found"));
            if settings.screenshot_on_missing_control {
                self.capture_screenshot(name, page, recorder).await;
            }
            return Err(StageError::missing_control(selector));
        };
        self.page.activate(&control).await;
        recorder.info(&format!("[{name}] clicked {selector}"));

        recorder.enter(Stage::ArtifactPoll);
        let location = settings.artifact_location(name);
        let polled = self.poller.poll(name, &location, pattern, recorder).await;
        recorder.record_attempts(Stage::ArtifactPoll, polled.rounds());
        let artifact = match polled {
            PollOutcome::Found { entry, .. } => entry,
            PollOutcome::NotFound { rounds } => {
                return Err(StageError::ArtifactTimeout { polls: rounds });
            }
        };

        recorder.enter(Stage::Convert);
        let converted = retry(&settings.convert_retry, name, recorder, |_| {
            self.converter.convert(name, &artifact, recorder)
        })
        .await;
        recorder.record_attempts(Stage::Convert, converted.attempts);
        let payload = converted.result?;

        Ok(Outcome::success(artifact, payload))
    }

    /// The driver enforces the load timeout and releases what it opened.
    async fn load_page(&self, url: &str) -> Result<PageHandle, StageError> {
        self.page
            .load(url, self.settings.load_timeout)
            .await
            .map_err(|e| StageError::navigation(e.to_string()))
    }

    async fn capture_screenshot(&self, name: &str, page: &PageHandle, sink: &dyn LogSink) {
        let path = self.settings.screenshot_dir.join(format!("debug-{name}.png"));
        let written = match self.page.screenshot(page).await {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::create_dir_all(&self.settings.screenshot_dir).await {
                    Err(e.to_string())
                } else {
                    tokio::fs::write(&path, bytes).await.map_err(|e| e.to_string())
                }
            }
            Err(e) => Err(e.to_string()),
        };
        match written {
            Ok(()) => sink.info(&format!("[{name}] screenshot saved to {}", path.display())),
            Err(e) => sink.warn(&format!("[{name}] screenshot failed: {e}")),
        }
    }
}

#[async_trait]
impl JobExecutor for StagePipeline {
    async fn run_job(&self, topic: &Topic, pattern: &FilenamePattern) -> Job {
        self.run(topic, pattern).await
    }
}
