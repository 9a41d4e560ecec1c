//! Scripted collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

use crate::collaborators::{
    ControlHandle, FilePart, HttpResponse, HttpTransport, ListingSource, PageDriver, PageHandle,
};
use crate::errors::TopicflowError;
use crate::summary::SummaryUploader;

#[derive(Debug, Default)]
struct PageState {
    loads: usize,
    failing_loads: usize,
    next_id: usize,
    open: HashMap<String, String>,
    lookups: Vec<String>,
    clicks: Vec<String>,
    screenshots: usize,
    closed: usize,
    released: usize,
    loaded_at: Vec<Instant>,
    looked_up_at: Vec<Instant>,
}

/// A page driver whose loads and control lookups follow a script.
#[derive(Debug, Default)]
pub struct ScriptedPageDriver {
    state: Mutex<PageState>,
    load_delay: Option<Duration>,
    control_missing_everywhere: bool,
    control_missing_for: Vec<String>,
}

impl ScriptedPageDriver {
    /// Creates a driver where every load succeeds and every control exists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` loads with a navigation error.
    #[must_use]
    pub fn failing_loads(self, count: usize) -> Self {
        self.state.lock().failing_loads = count;
        self
    }

    /// Delays every load by `delay`. A load slower than its timeout fails
    /// once the timeout elapses and releases the page it opened.
    #[must_use]
    pub const fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// No page has the trigger control.
    #[must_use]
    pub const fn without_control(mut self) -> Self {
        self.control_missing_everywhere = true;
        self
    }

    /// Pages whose URL contains `fragment` lack the trigger control.
    #[must_use]
    pub fn without_control_for(mut self, fragment: impl Into<String>) -> Self {
        self.control_missing_for.push(fragment.into());
        self
    }

    /// Number of load calls.
    #[must_use]
    pub fn loads(&self) -> usize {
        self.state.lock().loads
    }

    /// URLs of pages on which a control lookup happened, in order.
    #[must_use]
    pub fn lookups(&self) -> Vec<String> {
        self.state.lock().lookups.clone()
    }

    /// Number of activations.
    #[must_use]
    pub fn clicks(&self) -> usize {
        self.state.lock().clicks.len()
    }

    /// URLs of pages whose control was activated, in order.
    #[must_use]
    pub fn clicked_urls(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    /// Number of screenshots taken.
    #[must_use]
    pub fn screenshots(&self) -> usize {
        self.state.lock().screenshots
    }

    /// Number of pages closed.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }

    /// Number of pages loaded and not yet closed.
    #[must_use]
    pub fn open_pages(&self) -> usize {
        self.state.lock().open.len()
    }

    /// Number of pages the driver released itself after a load timed out.
    #[must_use]
    pub fn released(&self) -> usize {
        self.state.lock().released
    }

    /// When each successful load completed.
    #[must_use]
    pub fn loaded_at(&self) -> Vec<Instant> {
        self.state.lock().loaded_at.clone()
    }

    /// When each control lookup ran.
    #[must_use]
    pub fn looked_up_at(&self) -> Vec<Instant> {
        self.state.lock().looked_up_at.clone()
    }
}

#[async_trait]
impl PageDriver for ScriptedPageDriver {
    async fn load(&self, url: &str, timeout: Duration) -> Result<PageHandle, TopicflowError> {
        {
            let mut state = self.state.lock();
            state.loads += 1;
            if state.failing_loads > 0 {
                state.failing_loads -= 1;
                return Err(TopicflowError::browser(format!(
                    "net::ERR_CONNECTION_RESET at {url}"
                )));
            }
        }

        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = format!("page-{}", state.next_id);
            state.open.insert(id.clone(), url.to_string());
            id
        };

        if let Some(delay) = self.load_delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                let mut state = self.state.lock();
                state.open.remove(&id);
                state.released += 1;
                return Err(TopicflowError::browser(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(delay).await;
        }

        self.state.lock().loaded_at.push(Instant::now());
        Ok(PageHandle::new(id))
    }

    async fn find_control(&self, page: &PageHandle, _selector: &str) -> Option<ControlHandle> {
        let mut state = self.state.lock();
        state.looked_up_at.push(Instant::now());
        let url = state.open.get(&page.id).cloned().unwrap_or_default();
        state.lookups.push(url.clone());

        let missing = self.control_missing_everywhere
            || self.control_missing_for.iter().any(|f| url.contains(f.as_str()));
        (!missing).then(|| ControlHandle {
            page: page.clone(),
            element_id: "element-1".to_string(),
        })
    }

    async fn activate(&self, control: &ControlHandle) {
        let mut state = self.state.lock();
        let url = state.open.get(&control.page.id).cloned().unwrap_or_default();
        state.clicks.push(url);
    }

    async fn screenshot(&self, _page: &PageHandle) -> Result<Vec<u8>, TopicflowError> {
        self.state.lock().screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&self, page: PageHandle) {
        let mut state = self.state.lock();
        state.open.remove(&page.id);
        state.closed += 1;
    }
}

/// A listing source that answers successive queries from a script.
///
/// Once the script runs out every query returns an empty listing.
#[derive(Debug, Default)]
pub struct ScriptedListing {
    script: Mutex<VecDeque<Result<Vec<String>, String>>>,
    locations: Mutex<Vec<String>>,
}

impl ScriptedListing {
    /// Creates a listing answering with `script`, one entry per query.
    #[must_use]
    pub fn new(script: Vec<Result<Vec<String>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            locations: Mutex::new(Vec::new()),
        }
    }

    /// Number of queries made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.locations.lock().len()
    }

    /// Locations queried, in order.
    #[must_use]
    pub fn locations(&self) -> Vec<String> {
        self.locations.lock().clone()
    }
}

#[async_trait]
impl ListingSource for ScriptedListing {
    async fn list(&self, location: &str, _candidates: &[String]) -> Result<Vec<String>, TopicflowError> {
        self.locations.lock().push(location.to_string());
        match self.script.lock().pop_front() {
            Some(Ok(entries)) => Ok(entries),
            Some(Err(message)) => Err(TopicflowError::http(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Scripted reply of the conversion endpoint: `(status, body)` or a transport error.
pub type ScriptedReply = Result<(u16, &'static str), &'static str>;

/// An HTTP transport that answers GETs from a script.
///
/// Once the script runs out every GET answers `200 {"status":"ok"}`.
/// Multipart POSTs are recorded and answered with `200 ok`.
#[derive(Debug, Default)]
pub struct ScriptedConverterTransport {
    script: Mutex<VecDeque<ScriptedReply>>,
    urls: Mutex<Vec<String>>,
    posts: Mutex<Vec<(String, Vec<(String, String)>, Option<FilePart>)>>,
}

impl ScriptedConverterTransport {
    /// Creates a transport answering with `script`, one entry per GET.
    #[must_use]
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Number of GETs made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.urls.lock().len()
    }

    /// URLs requested, in order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Multipart POSTs made, in order.
    #[must_use]
    pub fn posts(&self) -> Vec<(String, Vec<(String, String)>, Option<FilePart>)> {
        self.posts.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedConverterTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TopicflowError> {
        self.urls.lock().push(url.to_string());
        match self.script.lock().pop_front() {
            Some(Ok((status, body))) => Ok(HttpResponse::new(status, body)),
            Some(Err(message)) => Err(TopicflowError::http(message)),
            None => Ok(HttpResponse::new(200, r#"{"status":"ok"}"#)),
        }
    }

    async fn post_multipart(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
        file: Option<FilePart>,
    ) -> Result<HttpResponse, TopicflowError> {
        self.posts.lock().push((url.to_string(), fields, file));
        Ok(HttpResponse::new(200, "ok"))
    }
}

/// An uploader that records every upload.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl RecordingUploader {
    /// Creates an uploader that accepts every upload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an uploader that records, then fails, every upload.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Uploads received as `(file name, contents)`.
    #[must_use]
    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().clone()
    }

    /// Number of uploads received.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().len()
    }
}

#[async_trait]
impl SummaryUploader for RecordingUploader {
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<HttpResponse, TopicflowError> {
        self.uploads.lock().push((file_name.to_string(), contents));
        if self.fail {
            Err(TopicflowError::http("upload endpoint unreachable"))
        } else {
            Ok(HttpResponse::new(200, "uploaded"))
        }
    }
}
