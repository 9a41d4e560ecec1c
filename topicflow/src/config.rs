//! Runner configuration.
//!
//! Values come from compiled-in defaults, then an optional JSON file, then
//! `TOPICFLOW_*` environment variables. Durations are milliseconds.

use crate::collaborators::{HttpClientConfig, WebDriverConfig};
use crate::core::Topic;
use crate::errors::{ConfigurationError, TopicflowError};
use crate::pipeline::{JobRetryScope, PipelineSettings, PollConfig, RetryPolicy, SchedulerSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the service token.
pub const TOKEN_VAR: &str = "TOPICFLOW_TOKEN";

/// How the artifact folder is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    /// Fetch the folder index and parse its links.
    #[default]
    Folder,
    /// Probe each candidate file name directly.
    Probe,
}

/// One configured topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name.
    pub name: String,
    /// Page slug under `base_url`; ignored when `source_url` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Full page URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl TopicConfig {
    fn with_slug(name: &str, slug: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: Some(slug.to_string()),
            source_url: None,
        }
    }
}

/// Page-stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Page-load timeout.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Wait after load before looking for the trigger.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// CSS selector of the trigger control.
    #[serde(default = "default_trigger_selector")]
    pub trigger_selector: String,
    /// Retry policy for page loads.
    #[serde(default = "default_load_retry")]
    pub load_retry: RetryPolicy,
    /// Save `debug-<topic>.png` when the trigger is missing.
    #[serde(default = "default_true")]
    pub screenshot_on_missing_control: bool,
}

const fn default_load_timeout_ms() -> u64 {
    90_000
}

const fn default_settle_delay_ms() -> u64 {
    12_000
}

fn default_trigger_selector() -> String {
    "#pdfBtn".to_string()
}

fn default_load_retry() -> RetryPolicy {
    RetryPolicy::fixed(2, Duration::from_secs(10))
}

const fn default_true() -> bool {
    true
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            trigger_selector: default_trigger_selector(),
            load_retry: default_load_retry(),
            screenshot_on_missing_control: true,
        }
    }
}

/// Conversion-stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Retry policy for conversion calls.
    #[serde(default = "default_convert_retry")]
    pub retry: RetryPolicy,
}

fn default_convert_retry() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::from_secs(20))
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            retry: default_convert_retry(),
        }
    }
}

/// Complete runner configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the topic pages.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Conversion endpoint.
    #[serde(default = "default_converter_url")]
    pub converter_url: String,
    /// Summary upload endpoint.
    #[serde(default = "default_log_upload_url")]
    pub log_upload_url: String,
    /// Base URL of the per-topic artifact folders.
    #[serde(default = "default_artifact_base_url")]
    pub artifact_base_url: String,
    /// Service token. Never serialized.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Topics in processing order.
    #[serde(default = "default_topics")]
    pub topics: Vec<TopicConfig>,
    /// Page stage.
    #[serde(default)]
    pub page: PageConfig,
    /// Artifact polling.
    #[serde(default)]
    pub poll: PollConfig,
    /// Artifact listing strategy.
    #[serde(default)]
    pub listing: ListingMode,
    /// Conversion stage.
    #[serde(default)]
    pub convert: ConvertConfig,
    /// Whole-topic re-runs after a failed run.
    #[serde(default = "default_job_retries")]
    pub job_retries: usize,
    /// Stages whose failure triggers a whole-topic re-run.
    #[serde(default)]
    pub job_retry_stages: JobRetryScope,
    /// Pause between topics and before re-runs.
    #[serde(default = "default_inter_topic_delay_ms")]
    pub inter_topic_delay_ms: u64,
    /// Directory for the summary file, record and screenshots.
    #[serde(default = "default_summary_dir")]
    pub summary_dir: PathBuf,
    /// WebDriver session settings.
    #[serde(default)]
    pub webdriver: WebDriverConfig,
    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_base_url() -> String {
    "https://wordsearchtoprint.com/puzzles".to_string()
}

fn default_converter_url() -> String {
    "https://wordsearchtoprint.com/auto_pdf_to_jpg.php".to_string()
}

fn default_log_upload_url() -> String {
    "https://wordsearchtoprint.com/auto_log_upload.php".to_string()
}

fn default_artifact_base_url() -> String {
    "https://wordsearchtoprint.com/auto-pdfs".to_string()
}

fn default_topics() -> Vec<TopicConfig> {
    vec![
        TopicConfig::with_slug("inspirational", "Daily-Inspirational-Large-Print-Word-Search-test"),
        TopicConfig::with_slug("relaxing", "Daily-Relaxing-Large-Print-Word-Search-test"),
        TopicConfig::with_slug("history", "Daily-History-Themed-Large-Print-Word-Search-test"),
    ]
}

const fn default_job_retries() -> usize {
    1
}

const fn default_inter_topic_delay_ms() -> u64 {
    20_000
}

fn default_summary_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            converter_url: default_converter_url(),
            log_upload_url: default_log_upload_url(),
            artifact_base_url: default_artifact_base_url(),
            token: None,
            topics: default_topics(),
            page: PageConfig::default(),
            poll: PollConfig::default(),
            listing: ListingMode::default(),
            convert: ConvertConfig::default(),
            job_retries: default_job_retries(),
            job_retry_stages: JobRetryScope::default(),
            inter_topic_delay_ms: default_inter_topic_delay_ms(),
            summary_dir: default_summary_dir(),
            webdriver: WebDriverConfig::default(),
            http: HttpClientConfig::default(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("base_url", &self.base_url)
            .field("converter_url", &self.converter_url)
            .field("log_upload_url", &self.log_upload_url)
            .field("artifact_base_url", &self.artifact_base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("topics", &self.topics)
            .field("page", &self.page)
            .field("poll", &self.poll)
            .field("listing", &self.listing)
            .field("convert", &self.convert)
            .field("job_retries", &self.job_retries)
            .field("job_retry_stages", &self.job_retry_stages)
            .field("inter_topic_delay_ms", &self.inter_topic_delay_ms)
            .field("summary_dir", &self.summary_dir)
            .field("webdriver", &self.webdriver)
            .field("http", &self.http)
            .finish()
    }
}

impl AppConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TopicflowError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::new(path.display().to_string(), format!("cannot read: {e}"))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, TopicflowError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Applies `TOPICFLOW_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigurationError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(TOKEN_VAR) {
            self.token = Some(token);
        }
        if let Some(v) = get("TOPICFLOW_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("TOPICFLOW_CONVERTER_URL") {
            self.converter_url = v;
        }
        if let Some(v) = get("TOPICFLOW_LOG_UPLOAD_URL") {
            self.log_upload_url = v;
        }
        if let Some(v) = get("TOPICFLOW_ARTIFACT_BASE_URL") {
            self.artifact_base_url = v;
        }
        if let Some(v) = get("TOPICFLOW_WEBDRIVER_URL") {
            self.webdriver.endpoint = v;
        }
        if let Some(v) = get("TOPICFLOW_SUMMARY_DIR") {
            self.summary_dir = PathBuf::from(v);
        }
        if let Some(v) = get("TOPICFLOW_JOB_RETRIES") {
            self.job_retries = parse_number("TOPICFLOW_JOB_RETRIES", &v)?;
        }
        if let Some(v) = get("TOPICFLOW_MAX_POLLS") {
            self.poll.max_polls = parse_number("TOPICFLOW_MAX_POLLS", &v)?;
        }
        if let Some(v) = get("TOPICFLOW_POLL_INTERVAL_MS") {
            self.poll.interval_ms = parse_number("TOPICFLOW_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("TOPICFLOW_INTER_TOPIC_DELAY_MS") {
            self.inter_topic_delay_ms = parse_number("TOPICFLOW_INTER_TOPIC_DELAY_MS", &v)?;
        }
        Ok(())
    }

    /// The service token, required before any topic runs.
    pub fn token(&self) -> Result<&str, ConfigurationError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigurationError::missing(TOKEN_VAR))
    }

    /// Checks settings that would make every topic fail.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.token()?;
        if self.topics.is_empty() {
            return Err(ConfigurationError::new("topics", "at least one topic is required"));
        }
        for topic in &self.topics {
            if topic.name.trim().is_empty() {
                return Err(ConfigurationError::new("topics", "topic name is empty"));
            }
            if topic.slug.is_none() && topic.source_url.is_none() {
                return Err(ConfigurationError::new(
                    format!("topics.{}", topic.name),
                    "either slug or source_url is required",
                ));
            }
        }
        Ok(())
    }

    /// Resolved topics, keeping only names in `only` when it is non-empty.
    #[must_use]
    pub fn resolve_topics(&self, only: &[String]) -> Vec<Topic> {
        self.topics
            .iter()
            .filter(|t| only.is_empty() || only.iter().any(|o| o.eq_ignore_ascii_case(&t.name)))
            .map(|t| {
                let url = t.source_url.clone().unwrap_or_else(|| {
                    format!(
                        "{}/{}.html",
                        self.base_url.trim_end_matches('/'),
                        t.slug.as_deref().unwrap_or(&t.name)
                    )
                });
                Topic::new(t.name.clone(), url)
            })
            .collect()
    }

    /// Stage pipeline settings derived from this config.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            load_timeout: Duration::from_millis(self.page.load_timeout_ms),
            settle_delay: Duration::from_millis(self.page.settle_delay_ms),
            trigger_selector: self.page.trigger_selector.clone(),
            load_retry: self.page.load_retry.clone(),
            convert_retry: self.convert.retry.clone(),
            screenshot_on_missing_control: self.page.screenshot_on_missing_control,
            screenshot_dir: self.summary_dir.clone(),
            artifact_base_url: self.artifact_base_url.clone(),
        }
    }

    /// Scheduler settings derived from this config.
    #[must_use]
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            job_retries: self.job_retries,
            inter_topic_delay: Duration::from_millis(self.inter_topic_delay_ms),
            retry_scope: self.job_retry_stages.clone(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::new(key, format!("expected a number, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stage;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_production_job() {
        let config = AppConfig::default();
        let names: Vec<&str> = config.topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["inspirational", "relaxing", "history"]);
        assert_eq!(config.page.load_timeout_ms, 90_000);
        assert_eq!(config.page.settle_delay_ms, 12_000);
        assert_eq!(config.page.trigger_selector, "#pdfBtn");
        assert_eq!(config.poll, PollConfig { interval_ms: 5_000, max_polls: 36 });
        assert_eq!(config.convert.retry.max_attempts, 3);
        assert_eq!(config.convert.retry.delay_for(0), Duration::from_secs(20));
        assert_eq!(config.inter_topic_delay_ms, 20_000);
        assert_eq!(config.job_retries, 1);
        assert!(config.job_retry_stages.includes(Stage::Trigger));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json_str(
            r#"{
                "poll": { "max_polls": 10 },
                "job_retry_stages": ["page_load"],
                "topics": [{ "name": "history", "source_url": "https://x/h.html" }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.poll.max_polls, 10);
        assert_eq!(config.poll.interval_ms, 5_000);
        assert!(!config.job_retry_stages.includes(Stage::Trigger));
        assert_eq!(config.page.settle_delay_ms, 12_000);
        assert_eq!(config.resolve_topics(&[]), vec![Topic::new("history", "https://x/h.html")]);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(AppConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topicflow.json");
        std::fs::write(&path, r#"{ "job_retries": 3 }"#).unwrap();

        let config = AppConfig::from_json_file(&path).unwrap();
        assert_eq!(config.job_retries, 3);

        let missing = AppConfig::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(TopicflowError::Configuration(_))));
    }

    #[test]
    fn test_missing_token_is_configuration_error() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert_eq!(err.key, TOKEN_VAR);

        let mut blank = AppConfig::default();
        blank.token = Some("  ".to_string());
        assert!(blank.token().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                (TOKEN_VAR, "secret"),
                ("TOPICFLOW_WEBDRIVER_URL", "http://driver:4444"),
                ("TOPICFLOW_MAX_POLLS", "12"),
                ("TOPICFLOW_SUMMARY_DIR", "/var/log/topicflow"),
                ("TOPICFLOW_BASE_URL", ""),
            ]))
            .unwrap();

        assert_eq!(config.token().unwrap(), "secret");
        assert_eq!(config.webdriver.endpoint, "http://driver:4444");
        assert_eq!(config.poll.max_polls, 12);
        assert_eq!(config.summary_dir, PathBuf::from("/var/log/topicflow"));
        assert_eq!(config.base_url, default_base_url());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_rejects_bad_number() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("TOPICFLOW_JOB_RETRIES", "lots")]))
            .unwrap_err();
        assert_eq!(err.key, "TOPICFLOW_JOB_RETRIES");
    }

    #[test]
    fn test_resolve_topics_from_slugs_and_filter() {
        let config = AppConfig::default();
        let all = config.resolve_topics(&[]);
        assert_eq!(
            all[2].source_url,
            "https://wordsearchtoprint.com/puzzles/Daily-History-Themed-Large-Print-Word-Search-test.html"
        );

        let only = config.resolve_topics(&["History".to_string()]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "history");
    }

    #[test]
    fn test_default_topics_load_production_pages() {
        let urls: Vec<String> = AppConfig::default()
            .resolve_topics(&[])
            .into_iter()
            .map(|t| t.source_url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://wordsearchtoprint.com/puzzles/Daily-Inspirational-Large-Print-Word-Search-test.html",
                "https://wordsearchtoprint.com/puzzles/Daily-Relaxing-Large-Print-Word-Search-test.html",
                "https://wordsearchtoprint.com/puzzles/Daily-History-Themed-Large-Print-Word-Search-test.html",
            ]
        );
    }

    #[test]
    fn test_token_never_serialized_or_debug_printed() {
        let mut config = AppConfig::default();
        config.token = Some("secret".to_string());
        assert!(!serde_json::to_string(&config).unwrap().contains("secret"));
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_derived_settings() {
        let config = AppConfig::default();
        let pipeline = config.pipeline_settings();
        assert_eq!(pipeline.settle_delay, Duration::from_secs(12));
        assert_eq!(pipeline.artifact_location("history"), "https://wordsearchtoprint.com/auto-pdfs/history/");
        let scheduler = config.scheduler_settings();
        assert_eq!(scheduler.inter_topic_delay, Duration::from_secs(20));
        assert_eq!(scheduler.job_retries, 1);
    }
}
