//! [`PageDriver`] over the W3C WebDriver protocol.
//!
//! Each `load` opens a fresh browser session, so topics never share page
//! state. Works against any chromedriver/geckodriver-compatible endpoint.

use super::page::{ControlHandle, PageDriver, PageHandle};
use crate::errors::TopicflowError;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Configuration for the WebDriver endpoint and browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebDriverConfig {
    /// Base URL of the WebDriver server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Browser to request.
    #[serde(default = "default_browser_name")]
    pub browser_name: String,
    /// Command-line arguments for the browser.
    #[serde(default = "default_browser_args")]
    pub browser_args: Vec<String>,
    /// User agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Timeout for individual WebDriver commands in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:9515".to_string()
}

fn default_browser_name() -> String {
    "chrome".to_string()
}

fn default_browser_args() -> Vec<String> {
    [
        "--headless=new",
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-blink-features=AutomationControlled",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_command_timeout_ms() -> u64 {
    120_000
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            browser_name: default_browser_name(),
            browser_args: default_browser_args(),
            user_agent: Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string()),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl WebDriverConfig {
    /// Session capabilities, with the page-load timeout set to `page_load`.
    #[must_use]
    pub fn capabilities(&self, page_load: Duration) -> Value {
        let mut args = self.browser_args.clone();
        if let Some(ref agent) = self.user_agent {
            args.push(format!("--user-agent={agent}"));
        }
        let page_load_ms = u64::try_from(page_load.as_millis()).unwrap_or(u64::MAX);

        let mut always_match = json!({
            "browserName": self.browser_name,
            "timeouts": { "pageLoad": page_load_ms },
        });
        let options_key = match self.browser_name.as_str() {
            "firefox" => "moz:firefoxOptions",
            _ => "goog:chromeOptions",
        };
        always_match[options_key] = json!({ "args": args });

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

/// WebDriver-backed page driver.
#[derive(Debug, Clone)]
pub struct WebDriverPage {
    client: reqwest::Client,
    config: WebDriverConfig,
}

impl WebDriverPage {
    /// Creates a driver for the configured endpoint.
    pub fn new(config: WebDriverConfig) -> Result<Self, TopicflowError> {
        // The driver endpoint is a sidecar process, never reached via a proxy.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.command_timeout_ms))
            .no_proxy()
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TopicflowError> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let parsed: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        if (200..300).contains(&status) {
            Ok(parsed.get("value").cloned().unwrap_or(Value::Null))
        } else {
            Err(command_error(status, &parsed))
        }
    }

    async fn delete_session(&self, session_id: &str) {
        if let Err(e) = self
            .command(Method::DELETE, &format!("session/{session_id}"), None)
            .await
        {
            tracing::warn!(session_id, error = %e, "Failed to close WebDriver session");
        }
    }
}

/// Builds an error from a WebDriver error payload.
fn command_error(status: u16, payload: &Value) -> TopicflowError {
    let value = payload.get("value");
    let error = value
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("");
    TopicflowError::browser(format!("WebDriver {status} {error}: {message}"))
}

/// Extracts the session id from a new-session response value.
fn session_id(value: &Value) -> Option<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Extracts the element id from a find-element response value.
fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(String::from)
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn load(&self, url: &str, timeout: Duration) -> Result<PageHandle, TopicflowError> {
        let created = self
            .command(Method::POST, "session", Some(self.config.capabilities(timeout)))
            .await?;
        let id = session_id(&created)
            .ok_or_else(|| TopicflowError::browser("new session response had no sessionId"))?;

        let navigate_path = format!("session/{id}/url");
        let navigate = self.command(
            Method::POST,
            &navigate_path,
            Some(json!({ "url": url })),
        );
        let navigated = match tokio::time::timeout(timeout, navigate).await {
            Ok(result) => result,
            Err(_) => Err(TopicflowError::browser(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        };

        match navigated {
            Ok(_) => Ok(PageHandle::new(id)),
            Err(e) => {
                self.delete_session(&id).await;
                Err(e)
            }
        }
    }

    async fn find_control(&self, page: &PageHandle, selector: &str) -> Option<ControlHandle> {
        let found = self
            .command(
                Method::POST,
                &format!("session/{}/element", page.id),
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await;

        match found {
            Ok(value) => element_id(&value).map(|element_id| ControlHandle {
                page: page.clone(),
                element_id,
            }),
            Err(e) => {
                tracing::debug!(selector, error = %e, "Control lookup failed");
                None
            }
        }
    }

    async fn activate(&self, control: &ControlHandle) {
        let path = format!(
            "session/{}/element/{}/click",
            control.page.id, control.element_id
        );
        if let Err(e) = self.command(Method::POST, &path, Some(json!({}))).await {
            tracing::debug!(error = %e, "Click dispatch reported an error");
        }
    }

    async fn screenshot(&self, page: &PageHandle) -> Result<Vec<u8>, TopicflowError> {
        let value = self
            .command(Method::GET, &format!("session/{}/screenshot", page.id), None)
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| TopicflowError::browser("screenshot response was not a string"))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| TopicflowError::browser(format!("invalid screenshot data: {e}")))
    }

    async fn close(&self, page: PageHandle) {
        self.delete_session(&page.id).await;
    }
}
