//! The feed client boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::page::{CatalogIndex, CatalogPage, PageRef};

/// Remote catalog feed, consumed but not implemented by the core.
///
/// Implementations own fetching and parsing of the feed's index and page
/// documents; the core relies only on the bounds queries of the returned
/// values. Fetches are the coordinator's only suspension points besides actor
/// sends.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch the catalog index document.
    async fn fetch_index(&self) -> Result<CatalogIndex>;

    /// Fetch one catalog page.
    async fn fetch_page(&self, page: &PageRef) -> Result<CatalogPage>;
}
