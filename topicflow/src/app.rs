//! Wiring a complete run from configuration.

use crate::collaborators::{
    ConversionClient, HttpFolderListing, HttpProbeListing, HttpTransport, ListingSource,
    PageDriver, ReqwestTransport, WebDriverPage,
};
use crate::config::{AppConfig, ListingMode};
use crate::errors::{ConfigurationError, TopicflowError};
use crate::events::{FileLogSink, LogSink, TeeLogSink, TracingLogSink};
use crate::pipeline::{ArtifactPoller, Scheduler, StagePipeline};
use crate::summary::{
    summary_file_name, HttpSummaryUploader, PublishReport, RunSummary, SummaryPublisher,
    SummaryUploader,
};
use crate::utils::now_utc;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

/// The external capabilities a run consumes.
#[derive(Clone)]
pub struct Collaborators {
    /// Browser page driver.
    pub page: Arc<dyn PageDriver>,
    /// HTTP transport for the conversion endpoint.
    pub transport: Arc<dyn HttpTransport>,
    /// Artifact folder listing.
    pub listing: Arc<dyn ListingSource>,
    /// Summary upload; `None` disables uploading.
    pub uploader: Option<Arc<dyn SummaryUploader>>,
}

impl Collaborators {
    /// Builds the production collaborators: WebDriver pages and reqwest HTTP.
    pub fn from_config(config: &AppConfig) -> Result<Self, TopicflowError> {
        let token = config.token()?;
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(&config.http)?);
        let listing: Arc<dyn ListingSource> = match config.listing {
            ListingMode::Folder => Arc::new(HttpFolderListing::new(transport.clone())),
            ListingMode::Probe => Arc::new(HttpProbeListing::new(transport.clone())),
        };
        let uploader: Arc<dyn SummaryUploader> = Arc::new(HttpSummaryUploader::new(
            transport.clone(),
            config.log_upload_url.clone(),
            token,
        ));

        Ok(Self {
            page: Arc::new(WebDriverPage::new(config.webdriver.clone())?),
            transport,
            listing,
            uploader: Some(uploader),
        })
    }
}

/// Opens the run log: every line goes to `tracing` and is appended to the
/// day's summary file under `summary_dir`.
pub fn open_run_sink(config: &AppConfig, run_date: NaiveDate) -> Result<Arc<dyn LogSink>, TopicflowError> {
    let path = config.summary_dir.join(summary_file_name(run_date));
    let file = FileLogSink::open(&path)?;
    tracing::debug!(path = %path.display(), "Run log opened");
    Ok(Arc::new(
        TeeLogSink::default()
            .with(Arc::new(TracingLogSink))
            .with(Arc::new(file)),
    ))
}

/// Summary and publish result of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The aggregated summary.
    pub summary: RunSummary,
    /// Where it was written and how the upload went.
    pub publish: PublishReport,
}

/// One invocation over the configured topics.
pub struct Runner {
    config: AppConfig,
    token: String,
    collaborators: Collaborators,
    sink: Arc<dyn LogSink>,
}

impl Runner {
    /// Creates a runner, rejecting incomplete configuration before anything runs.
    pub fn new(
        config: AppConfig,
        collaborators: Collaborators,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let token = config.token()?.to_string();
        Ok(Self {
            config,
            token,
            collaborators,
            sink,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Processes every selected topic, then publishes the summary once.
    ///
    /// `only` restricts the run to the named topics; empty means all.
    pub async fn run(self, run_date: NaiveDate, only: &[String]) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = now_utc();
        let topics = self.config.resolve_topics(only);

        self.sink.info(&format!(
            "starting run {run_id} for {run_date}: {} topic(s)",
            topics.len()
        ));
        if topics.is_empty() {
            self.sink.warn(&format!("no configured topic matches {only:?}"));
        }

        let converter = ConversionClient::new(
            self.collaborators.transport.clone(),
            self.config.converter_url.clone(),
            self.token.clone(),
        );
        let poller = ArtifactPoller::new(self.collaborators.listing.clone(), self.config.poll.clone());
        let pipeline = StagePipeline::new(
            self.collaborators.page.clone(),
            poller,
            converter,
            self.config.pipeline_settings(),
            self.sink.clone(),
        );
        let scheduler = Scheduler::new(
            Arc::new(pipeline),
            self.config.scheduler_settings(),
            self.sink.clone(),
        );

        let reports = scheduler.run(&topics, run_date).await;
        let summary = RunSummary::new(run_id, run_date, started_at, now_utc(), reports);

        let publish = SummaryPublisher::new(
            self.collaborators.uploader.clone(),
            self.config.summary_dir.clone(),
            self.sink.clone(),
        )
        .publish(&summary)
        .await;

        self.sink.info("done: all topics processed");
        RunReport { summary, publish }
    }
}
