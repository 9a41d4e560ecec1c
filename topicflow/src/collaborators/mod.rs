//! Capabilities the pipeline consumes from the outside world.
//!
//! Each collaborator is a trait so the pipeline can be driven by scripted
//! implementations in tests:
//! - [`PageDriver`]: browser page load, control lookup, activation
//! - [`HttpTransport`]: plain GET / multipart POST
//! - [`ListingSource`]: the folder the generated artifact lands in
//! - [`ConversionClient`]: the remote conversion endpoint

mod conversion;
mod http;
mod listing;
mod page;
mod webdriver;

pub use conversion::{interpret_conversion_response, ConversionClient};
pub use http::{FilePart, HttpClientConfig, HttpResponse, HttpTransport, ReqwestTransport};
pub use listing::{extract_pdf_links, HttpFolderListing, HttpProbeListing, ListingSource};
pub use page::{ControlHandle, PageDriver, PageHandle};
pub use webdriver::{WebDriverConfig, WebDriverPage};

#[cfg(test)]
pub use http::MockHttpTransport;
