//! Run summary aggregation and publishing.

mod report;
mod upload;

pub use report::{RunSummary, TopicReport};
pub use upload::{
    record_file_name, summary_file_name, HttpSummaryUploader, PublishReport, SummaryPublisher,
    SummaryUploader, UploadStatus,
};
