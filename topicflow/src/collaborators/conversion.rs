//! Client for the remote conversion endpoint.

use super::http::{HttpResponse, HttpTransport};
use crate::errors::{StageError, TopicflowError};
use crate::events::LogSink;
use crate::utils::truncate_chars;
use serde_json::Value;
use std::sync::Arc;

/// Response bodies are logged up to this many characters.
const LOGGED_BODY_CHARS: usize = 800;

/// Calls `endpoint?token=&topic=&filename=` and validates the answer.
#[derive(Clone)]
pub struct ConversionClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    token: String,
}

impl std::fmt::Debug for ConversionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"***")
            .finish_non_exhaustive()
    }
}

impl ConversionClient {
    /// Creates a new conversion client.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoint: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    fn build_url(&self, token: &str, topic: &str, filename: &str) -> Result<String, TopicflowError> {
        reqwest::Url::parse_with_params(
            &self.endpoint,
            &[("token", token), ("topic", topic), ("filename", filename)],
        )
        .map(String::from)
        .map_err(|e| TopicflowError::http(format!("invalid converter URL {}: {e}", self.endpoint)))
    }

    /// The request URL for `topic` and `filename`, query-encoded.
    pub fn request_url(&self, topic: &str, filename: &str) -> Result<String, TopicflowError> {
        self.build_url(&self.token, topic, filename)
    }

    /// Makes one conversion call, logging the request and response to `sink`.
    /// The caller owns retrying.
    pub async fn convert(
        &self,
        topic: &str,
        filename: &str,
        sink: &dyn LogSink,
    ) -> Result<Value, StageError> {
        let url = self
            .request_url(topic, filename)
            .map_err(|e| StageError::conversion(e.to_string()))?;
        let shown = self
            .build_url("***", topic, filename)
            .unwrap_or_else(|_| self.endpoint.clone());
        sink.info(&format!("[{topic}] calling converter: {shown}"));

        let response = match self.transport.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                sink.warn(&format!("[{topic}] converter error: {e}"));
                return Err(StageError::conversion(e.to_string()));
            }
        };

        sink.info(&format!(
            "[{topic}] converter HTTP {}: {}",
            response.status,
            truncate_chars(&response.body, LOGGED_BODY_CHARS)
        ));

        let payload = interpret_conversion_response(&response)?;
        sink.info(&format!("[{topic}] conversion success"));
        Ok(payload)
    }
}

/// Accepts a response only if it is 2xx, parses as JSON and carries `"status": "ok"`.
///
/// Anything else, including a 2xx with a malformed or ambiguous body, is a
/// [`StageError::Conversion`] describing what was seen.
pub fn interpret_conversion_response(response: &HttpResponse) -> Result<Value, StageError> {
    let body = truncate_chars(response.body.trim(), 200);

    if !response.is_success() {
        return Err(StageError::conversion(format!(
            "HTTP {}: {body}",
            response.status
        )));
    }

    let payload: Value = serde_json::from_str(response.body.trim()).map_err(|_| {
        StageError::conversion(format!("HTTP {}: malformed response: {body}", response.status))
    })?;

    match payload.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(payload),
        Some(other) => Err(StageError::conversion(format!(
            "HTTP {}: status \"{other}\": {body}",
            response.status
        ))),
        None => Err(StageError::conversion(format!(
            "HTTP {}: response has no status field: {body}",
            response.status
        ))),
    }
}
