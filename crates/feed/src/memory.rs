//! In-memory feed for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::FeedClient;
use crate::error::{FeedError, Result};
use crate::leaf::CatalogLeaf;
use crate::page::{CatalogIndex, CatalogPage, PageRef, TimestampSpan};

/// In-memory feed for testing.
///
/// Pages are registered with explicit spans; fetch counters let tests assert
/// that a saturated coordinator performs no fetch at all.
#[derive(Default)]
pub struct InMemoryFeed {
    pages: RwLock<Vec<(PageRef, Vec<CatalogLeaf>)>>,
    index_fetches: AtomicUsize,
    page_fetches: AtomicUsize,
}

impl InMemoryFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page covering `span` with the given leaves.
    pub async fn push_page(&self, span: TimestampSpan, leaves: Vec<CatalogLeaf>) {
        let mut pages = self.pages.write().await;
        let uri = format!("memory://page-{}", pages.len());
        pages.push((PageRef::new(uri, span), leaves));
    }

    /// Number of index fetches performed so far.
    #[must_use]
    pub fn index_fetches(&self) -> usize {
        self.index_fetches.load(Ordering::SeqCst)
    }

    /// Number of page fetches performed so far.
    #[must_use]
    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedClient for InMemoryFeed {
    async fn fetch_index(&self) -> Result<CatalogIndex> {
        self.index_fetches.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.read().await;
        Ok(CatalogIndex::new(
            pages.iter().map(|(page_ref, _)| page_ref.clone()).collect(),
        ))
    }

    async fn fetch_page(&self, page: &PageRef) -> Result<CatalogPage> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.read().await;
        pages
            .iter()
            .find(|(page_ref, _)| page_ref.uri == page.uri)
            .map(|(_, leaves)| CatalogPage::new(leaves.clone()))
            .ok_or_else(|| FeedError::page_fetch(&page.uri, "unknown page"))
    }
}
