//! Core domain model types for topicflow.
//!
//! This module contains the fundamental types used throughout the runner:
//! - Topics and their artifact filename patterns
//! - The ordered pipeline stages
//! - Job records, timestamped job events and terminal outcomes

mod event;
mod job;
mod outcome;
mod stage;
mod topic;

pub use event::JobEvent;
pub use job::Job;
pub use outcome::Outcome;
pub use stage::Stage;
pub use topic::{FilenamePattern, Topic};
