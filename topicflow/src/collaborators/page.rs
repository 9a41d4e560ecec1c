//! Browser page collaborator.

use crate::errors::TopicflowError;
use async_trait::async_trait;
use std::time::Duration;

/// Opaque handle to a loaded page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageHandle {
    /// Driver-specific page or session id.
    pub id: String,
}

impl PageHandle {
    /// Creates a new page handle.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Opaque handle to a control found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlHandle {
    /// Page the control belongs to.
    pub page: PageHandle,
    /// Driver-specific element id.
    pub element_id: String,
}

/// Protocol for driving a browser page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Loads `url`, failing if navigation errors or exceeds `timeout`.
    ///
    /// A failed load must release whatever it acquired; callers only ever
    /// close handles that were returned.
    async fn load(&self, url: &str, timeout: Duration) -> Result<PageHandle, TopicflowError>;

    /// Looks up a control by CSS selector. `None` when nothing matches.
    async fn find_control(&self, page: &PageHandle, selector: &str) -> Option<ControlHandle>;

    /// Activates (clicks) a control. Fire-and-forget: there is no result channel.
    async fn activate(&self, control: &ControlHandle);

    /// Captures a PNG screenshot of the page.
    async fn screenshot(&self, page: &PageHandle) -> Result<Vec<u8>, TopicflowError>;

    /// Releases the page. Errors are logged by the driver, not returned.
    async fn close(&self, page: PageHandle);
}
