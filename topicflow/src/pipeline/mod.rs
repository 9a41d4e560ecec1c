//! Job orchestration.
//!
//! This module provides:
//! - The bounded retry primitive
//! - The periodic artifact poller
//! - The per-topic stage pipeline
//! - The sequential scheduler with whole-topic re-runs

mod poller;
mod retry;
mod scheduler;
mod stage_pipeline;


pub use poller::{find_match, ArtifactPoller, PollConfig, PollOutcome};
pub use retry::{retry, BackoffStrategy, JitterStrategy, Retried, RetryPolicy};
pub use scheduler::{JobRetryScope, Scheduler, SchedulerSettings};
pub use stage_pipeline::{JobExecutor, PipelineSettings, StagePipeline};
