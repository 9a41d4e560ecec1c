//! Writing the run summary to disk and handing it to the upload endpoint.

use super::report::RunSummary;
use crate::collaborators::{FilePart, HttpResponse, HttpTransport};
use crate::errors::TopicflowError;
use crate::events::LogSink;
use crate::utils::truncate_chars;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the run log/summary for `date`.
#[must_use]
pub fn summary_file_name(date: NaiveDate) -> String {
    format!("upload-summary-{}.txt", date.format("%Y-%m-%d"))
}

/// File name of the structured run record for `date`.
#[must_use]
pub fn record_file_name(date: NaiveDate) -> String {
    format!("upload-summary-{}.json", date.format("%Y-%m-%d"))
}

/// Destination for the finished run summary.
#[async_trait]
pub trait SummaryUploader: Send + Sync {
    /// Uploads `contents` under `file_name`.
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<HttpResponse, TopicflowError>;
}

/// Posts the summary as a multipart form with `token` and `file` fields.
#[derive(Clone)]
pub struct HttpSummaryUploader {
    transport: Arc<dyn HttpTransport>,
    url: String,
    token: String,
}

impl std::fmt::Debug for HttpSummaryUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSummaryUploader")
            .field("url", &self.url)
            .field("token", &"***")
            .finish_non_exhaustive()
    }
}

impl HttpSummaryUploader {
    /// Creates an uploader posting to `url`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl SummaryUploader for HttpSummaryUploader {
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<HttpResponse, TopicflowError> {
        let file = FilePart {
            field: "file".to_string(),
            file_name: file_name.to_string(),
            bytes: contents,
        };
        self.transport
            .post_multipart(
                &self.url,
                vec![("token".to_string(), self.token.clone())],
                Some(file),
            )
            .await
    }
}

/// What happened to the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Uploading was disabled.
    Skipped,
    /// The endpoint answered.
    Completed {
        /// HTTP status of the answer.
        status: u16,
    },
    /// The request failed.
    Failed(String),
}

/// Files written and upload status of a published summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// The text summary file.
    pub text_path: PathBuf,
    /// The JSON record file, if it could be written.
    pub record_path: Option<PathBuf>,
    /// Digest of the rendered text.
    pub digest: String,
    /// Upload result.
    pub upload: UploadStatus,
}

/// Emits a finished [`RunSummary`] once: logs it, writes it under the
/// summary directory and uploads the summary file.
///
/// Publishing consumes the publisher, so a run cannot upload twice.
pub struct SummaryPublisher {
    uploader: Option<Arc<dyn SummaryUploader>>,
    summary_dir: PathBuf,
    sink: Arc<dyn LogSink>,
}

impl SummaryPublisher {
    /// Creates a publisher. With no uploader the upload step is skipped.
    #[must_use]
    pub fn new(
        uploader: Option<Arc<dyn SummaryUploader>>,
        summary_dir: impl Into<PathBuf>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            uploader,
            summary_dir: summary_dir.into(),
            sink,
        }
    }

    /// Publishes `summary`. Failures are logged, never returned.
    pub async fn publish(self, summary: &RunSummary) -> PublishReport {
        let text = summary.render_text();
        for line in text.lines() {
            self.sink.info(line);
        }

        let text_path = self.summary_dir.join(summary_file_name(summary.run_date()));
        if let Err(e) = ensure_text_file(&text_path, &text).await {
            self.sink
                .warn(&format!("could not write {}: {e}", text_path.display()));
        }

        let record_path = self.summary_dir.join(record_file_name(summary.run_date()));
        let record_path = match write_record(&record_path, summary).await {
            Ok(()) => Some(record_path),
            Err(e) => {
                self.sink
                    .warn(&format!("could not write {}: {e}", record_path.display()));
                None
            }
        };

        let upload = self.upload(&text_path, &text).await;

        PublishReport {
            text_path,
            record_path,
            digest: summary.digest(),
            upload,
        }
    }

    async fn upload(&self, text_path: &Path, text: &str) -> UploadStatus {
        let Some(uploader) = &self.uploader else {
            self.sink.info("summary upload disabled");
            return UploadStatus::Skipped;
        };

        let contents = match tokio::fs::read(text_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %text_path.display(), error = %e, "Falling back to rendered summary");
                text.as_bytes().to_vec()
            }
        };
        let file_name = text_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.sink.info("uploading run summary");
        match uploader.upload(&file_name, contents).await {
            Ok(response) => {
                self.sink.info(&format!(
                    "summary upload response ({}): {}",
                    response.status,
                    truncate_chars(response.body.trim(), 800)
                ));
                UploadStatus::Completed {
                    status: response.status,
                }
            }
            Err(e) => {
                self.sink.warn(&format!("summary upload failed: {e}"));
                UploadStatus::Failed(e.to_string())
            }
        }
    }
}

/// Writes `text` to `path` unless a run log is already being appended there.
async fn ensure_text_file(path: &Path, text: &str) -> Result<(), TopicflowError> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    Ok(())
}

async fn write_record(path: &Path, summary: &RunSummary) -> Result<(), TopicflowError> {
    let record = serde_json::to_vec_pretty(&summary.to_record()?)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, record).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Outcome, Stage, Topic};
    use crate::events::{CollectingLogSink, FileLogSink, LogSink};
    use crate::summary::TopicReport;
    use crate::testing::{RecordingUploader, ScriptedConverterTransport};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn summary() -> RunSummary {
        RunSummary::new(
            Uuid::nil(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 2, 5, 0).unwrap(),
            vec![TopicReport {
                topic: Topic::new("history", "https://x/history.html"),
                outcome: Outcome::failure(Stage::ArtifactPoll, "artifact not observed"),
                job_attempts: 2,
                stage_attempts: BTreeMap::new(),
                events: Vec::new(),
            }],
        )
    }

    #[test]
    fn test_file_names() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(summary_file_name(date), "upload-summary-2024-06-01.txt");
        assert_eq!(record_file_name(date), "upload-summary-2024-06-01.json");
    }

    #[tokio::test]
    async fn test_http_uploader_posts_token_and_file() {
        let transport = Arc::new(ScriptedConverterTransport::new(vec![]));
        let uploader = HttpSummaryUploader::new(transport.clone(), "https://x/upload.php", "t0k");

        let response = uploader
            .upload("upload-summary-2024-06-01.txt", b"lines".to_vec())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        let posts = transport.posts();
        assert_eq!(posts.len(), 1);
        let (url, fields, file) = &posts[0];
        assert_eq!(url, "https://x/upload.php");
        assert_eq!(fields, &vec![("token".to_string(), "t0k".to_string())]);
        let file = file.as_ref().unwrap();
        assert_eq!(file.field, "file");
        assert_eq!(file.file_name, "upload-summary-2024-06-01.txt");
        assert_eq!(file.bytes, b"lines".to_vec());
    }

    #[tokio::test]
    async fn test_publish_uploads_run_log_once() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("upload-summary-2024-06-01.txt");
        let file_sink: Arc<dyn LogSink> = Arc::new(FileLogSink::open(&log_path).unwrap());
        file_sink.info("[history] loading");
        let uploader = Arc::new(RecordingUploader::new());

        let report = SummaryPublisher::new(Some(uploader.clone()), dir.path(), file_sink)
            .publish(&summary())
            .await;

        assert_eq!(report.upload, UploadStatus::Completed { status: 200 });
        assert_eq!(report.text_path, log_path);
        assert_eq!(uploader.upload_count(), 1);

        let (name, contents) = &uploader.uploads()[0];
        assert_eq!(name, "upload-summary-2024-06-01.txt");
        let contents = String::from_utf8(contents.clone()).unwrap();
        assert!(contents.contains("[history] loading"));
        assert!(contents.contains("[history] FAILURE at artifact_poll: artifact not observed (runs: 2)"));

        let record: serde_json::Value =
            serde_json::from_slice(&std::fs::read(report.record_path.unwrap()).unwrap()).unwrap();
        assert_eq!(record["reports"][0]["job_attempts"], 2);
    }

    #[tokio::test]
    async fn test_publish_without_run_log_writes_text() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CollectingLogSink::new());
        let uploader = Arc::new(RecordingUploader::new());

        let report = SummaryPublisher::new(Some(uploader.clone()), dir.path(), sink.clone())
            .publish(&summary())
            .await;

        let written = std::fs::read_to_string(&report.text_path).unwrap();
        assert_eq!(written, summary().render_text());
        assert_eq!(uploader.uploads()[0].1, written.into_bytes());
        assert!(sink.contains("Totals: 0 succeeded, 1 failed, 1 topics"));
    }

    #[tokio::test]
    async fn test_upload_failure_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CollectingLogSink::new());
        let uploader = Arc::new(RecordingUploader::failing());

        let report = SummaryPublisher::new(Some(uploader.clone()), dir.path(), sink.clone())
            .publish(&summary())
            .await;

        assert!(matches!(report.upload, UploadStatus::Failed(_)));
        assert_eq!(uploader.upload_count(), 1);
        assert!(sink.contains("summary upload failed"));
    }

    #[tokio::test]
    async fn test_upload_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let report = SummaryPublisher::new(None, dir.path(), Arc::new(CollectingLogSink::new()))
            .publish(&summary())
            .await;
        assert_eq!(report.upload, UploadStatus::Skipped);
        assert!(report.text_path.exists());
    }
}
