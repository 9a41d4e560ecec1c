//! Sources the artifact poller queries for the current folder contents.

use super::http::HttpTransport;
use crate::errors::TopicflowError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Protocol for listing the entries at an artifact location.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Returns the entry names currently visible at `location`.
    ///
    /// `candidates` lets probe-style sources check only the names of interest;
    /// folder-style sources may ignore it.
    async fn list(&self, location: &str, candidates: &[String]) -> Result<Vec<String>, TopicflowError>;
}

#[allow(clippy::expect_used)]
static PDF_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']+?\.pdf)["']"#).expect("valid href pattern")
});

/// Extracts the file names of `.pdf` links from an HTML listing.
///
/// Only the final path segment of each link is kept. Duplicates are dropped,
/// first-seen order is preserved.
#[must_use]
pub fn extract_pdf_links(html: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for capture in PDF_HREF.captures_iter(html) {
        let href = &capture[1];
        let name = href.rsplit('/').next().unwrap_or(href).trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Joins a folder URL and an entry name with exactly one slash.
fn join_location(location: &str, name: &str) -> String {
    format!("{}/{}", location.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Lists a folder by fetching its HTML index.
///
/// A non-2xx answer or an empty body is an empty listing; only transport
/// failures are errors.
#[derive(Clone)]
pub struct HttpFolderListing {
    transport: Arc<dyn HttpTransport>,
}

impl HttpFolderListing {
    /// Creates a folder listing over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ListingSource for HttpFolderListing {
    async fn list(&self, location: &str, _candidates: &[String]) -> Result<Vec<String>, TopicflowError> {
        let response = self.transport.get(location).await?;
        if !response.is_success() {
            tracing::debug!(location, status = response.status, "Listing not available yet");
            return Ok(Vec::new());
        }
        Ok(extract_pdf_links(&response.body))
    }
}

/// Lists a folder by probing each candidate name directly.
///
/// A candidate is present when `GET <location>/<candidate>` answers 2xx.
/// Candidates without a `.pdf` extension are skipped.
#[derive(Clone)]
pub struct HttpProbeListing {
    transport: Arc<dyn HttpTransport>,
}

impl HttpProbeListing {
    /// Creates a probe listing over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ListingSource for HttpProbeListing {
    async fn list(&self, location: &str, candidates: &[String]) -> Result<Vec<String>, TopicflowError> {
        let mut present = Vec::new();
        let mut probed = 0;
        let mut failed = 0;
        let mut last_error = None;

        for candidate in candidates.iter().filter(|c| c.to_lowercase().ends_with(".pdf")) {
            probed += 1;
            match self.transport.get(&join_location(location, candidate)).await {
                Ok(response) if response.is_success() => present.push(candidate.clone()),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(candidate = %candidate, error = %e, "Probe failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            // every probe failed at the transport level
            Some(e) if probed > 0 && failed == probed => Err(e),
            _ => Ok(present),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{HttpResponse, MockHttpTransport};
    use mockall::predicate::eq;

    #[test]
    fn test_extract_pdf_links() {
        let html = r#"
            <a href="../">Parent</a>
            <a href="todays-history-large-print-word-search-06_01_2024.pdf">one</a>
            <a HREF='/auto-pdfs/history/Other.PDF'>two</a>
            <a href="notes.txt">three</a>
            <a href="todays-history-large-print-word-search-06_01_2024.pdf">dup</a>
        "#;
        assert_eq!(
            extract_pdf_links(html),
            vec![
                "todays-history-large-print-word-search-06_01_2024.pdf".to_string(),
                "Other.PDF".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_pdf_links_empty_body() {
        assert!(extract_pdf_links("").is_empty());
    }

    #[test]
    fn test_join_location() {
        assert_eq!(join_location("https://x/a/", "b.pdf"), "https://x/a/b.pdf");
        assert_eq!(join_location("https://x/a", "/b.pdf"), "https://x/a/b.pdf");
    }

    #[tokio::test]
    async fn test_folder_listing_parses_body() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_get()
            .with(eq("https://x/auto-pdfs/history/"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"<a href="a.pdf">a</a>"#)));

        let listing = HttpFolderListing::new(Arc::new(transport));
        let entries = listing.list("https://x/auto-pdfs/history/", &[]).await.unwrap();
        assert_eq!(entries, vec!["a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_folder_listing_non_success_is_empty() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(HttpResponse::new(404, r#"<a href="stale.pdf">x</a>"#)));

        let listing = HttpFolderListing::new(Arc::new(transport));
        let entries = listing.list("https://x/f/", &[]).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_folder_listing_transport_error_propagates() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_get()
            .returning(|_| Err(TopicflowError::http("connection refused")));

        let listing = HttpFolderListing::new(Arc::new(transport));
        assert!(listing.list("https://x/f/", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_probe_listing_reports_present_candidates() {
        let mut transport = MockHttpTransport::new();
        transport.expect_get().returning(|url| {
            if url.ends_with("/b.pdf") {
                Ok(HttpResponse::new(200, ""))
            } else {
                Ok(HttpResponse::new(404, ""))
            }
        });

        let listing = HttpProbeListing::new(Arc::new(transport));
        let candidates = vec!["a.pdf".to_string(), "b.pdf".to_string(), "stem".to_string()];
        let entries = listing.list("https://x/f", &candidates).await.unwrap();
        assert_eq!(entries, vec!["b.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_listing_all_transport_failures_is_error() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_get()
            .returning(|_| Err(TopicflowError::http("connection refused")));

        let listing = HttpProbeListing::new(Arc::new(transport));
        let result = listing.list("https://x/f", &["a.pdf".to_string()]).await;
        assert!(result.is_err());
    }
}
