//! # Topicflow
//!
//! Unattended per-topic document generation, artifact polling and
//! conversion.
//!
//! For each configured topic a run loads the topic's page, triggers
//! generation, waits for the generated artifact to appear in a remote
//! folder, then calls a conversion endpoint. Topics run strictly one after
//! another; every topic ends in exactly one outcome, and the outcomes are
//! aggregated into a summary that is written to disk and uploaded once.
//!
//! - **Stage pipeline**: page load, trigger, artifact poll, convert, each with
//!   its own retry policy
//! - **Scheduler**: ordered topics, whole-topic re-runs, inter-topic pacing
//! - **Explicit run log**: a [`events::LogSink`] handed to every component
//! - **Collaborator seams**: browser, HTTP and listing access behind traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use topicflow::prelude::*;
//!
//! let config = AppConfig::default();
//! let sink = open_run_sink(&config, run_date)?;
//! let runner = Runner::new(config.clone(), Collaborators::from_config(&config)?, sink)?;
//! let report = runner.run(run_date, &[]).await;
//! println!("{}", report.summary.render_text());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod app;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod summary;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::app::{open_run_sink, Collaborators, RunReport, Runner};
    pub use crate::collaborators::{
        ConversionClient, HttpTransport, ListingSource, PageDriver, ReqwestTransport,
        WebDriverPage,
    };
    pub use crate::config::AppConfig;
    pub use crate::core::{FilenamePattern, Job, JobEvent, Outcome, Stage, Topic};
    pub use crate::errors::{ConfigurationError, StageError, TopicflowError};
    pub use crate::events::{CollectingLogSink, FileLogSink, LogSink, TeeLogSink, TracingLogSink};
    pub use crate::pipeline::{
        retry, ArtifactPoller, JobRetryScope, PollConfig, PollOutcome, RetryPolicy, Scheduler,
        StagePipeline,
    };
    pub use crate::summary::{RunSummary, SummaryPublisher, SummaryUploader, TopicReport};
    pub use crate::utils::{iso_timestamp, today_utc, Timestamp};
}
