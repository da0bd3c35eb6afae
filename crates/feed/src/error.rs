//! Error types for the feed crate.

use thiserror::Error;

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors surfaced by feed client implementations.
///
/// All of these are transient from the coordinator's point of view: the scan
/// that hit one is abandoned and the next scheduled scan retries.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The catalog index document could not be fetched.
    #[error("failed to fetch catalog index: {reason}")]
    IndexFetch { reason: String },

    /// A catalog page document could not be fetched.
    #[error("failed to fetch catalog page '{uri}': {reason}")]
    PageFetch { uri: String, reason: String },

    /// A fetched document did not parse as expected.
    #[error("malformed catalog document '{uri}': {reason}")]
    Malformed { uri: String, reason: String },
}

impl FeedError {
    /// Create an index fetch error.
    pub fn index_fetch(reason: impl Into<String>) -> Self {
        Self::IndexFetch {
            reason: reason.into(),
        }
    }

    /// Create a page fetch error.
    pub fn page_fetch(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PageFetch {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed document error.
    pub fn malformed(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}
