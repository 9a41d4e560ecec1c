//! Testing utilities for topicflow pipelines.
//!
//! This module provides scripted stand-ins for every external collaborator,
//! so stage pipelines and schedulers can run end to end without a browser
//! or network.

mod mocks;

pub use mocks::{
    RecordingUploader, ScriptedConverterTransport, ScriptedListing, ScriptedPageDriver,
    ScriptedReply,
};
