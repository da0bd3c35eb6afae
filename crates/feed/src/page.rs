//! Feed-page abstraction: page references, spans, and bounds queries.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::leaf::CatalogLeaf;

/// Inclusive commit-timestamp span covered by one catalog page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSpan {
    /// Earliest commit timestamp the page may contain.
    pub start: DateTime<Utc>,
    /// Latest commit timestamp the page may contain.
    pub end: DateTime<Utc>,
}

impl TimestampSpan {
    /// Create a new span.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether any part of the span lies inside the open interval
    /// `(lower, upper)`.
    #[must_use]
    pub fn overlaps(&self, lower: DateTime<Utc>, upper: DateTime<Utc>) -> bool {
        self.end > lower && self.start < upper
    }
}

/// Reference to one remote catalog page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    /// Where the page document lives.
    pub uri: String,
    /// The span of commit timestamps the page covers.
    pub span: TimestampSpan,
}

impl PageRef {
    /// Create a new page reference.
    pub fn new(uri: impl Into<String>, span: TimestampSpan) -> Self {
        Self {
            uri: uri.into(),
            span,
        }
    }
}

/// The catalog's index document: every page the feed currently exposes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogIndex {
    pages: Vec<PageRef>,
}

impl CatalogIndex {
    /// Create an index; pages are kept ascending by span start.
    #[must_use]
    pub fn new(mut pages: Vec<PageRef>) -> Self {
        pages.sort_by_key(|page| page.span.start);
        Self { pages }
    }

    /// Pages whose span overlaps the open interval `(lower, upper)`,
    /// ascending by span start.
    #[must_use]
    pub fn pages_in_bounds(&self, lower: DateTime<Utc>, upper: DateTime<Utc>) -> Vec<PageRef> {
        self.pages
            .iter()
            .filter(|page| page.span.overlaps(lower, upper))
            .cloned()
            .collect()
    }

    /// Number of pages in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the index has no pages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// One fetched catalog page: the leaves inside its span.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPage {
    leaves: Vec<CatalogLeaf>,
}

impl CatalogPage {
    /// Create a page; leaves are kept ascending by commit timestamp.
    #[must_use]
    pub fn new(mut leaves: Vec<CatalogLeaf>) -> Self {
        leaves.sort_by_key(|leaf| leaf.commit_timestamp);
        Self { leaves }
    }

    /// Leaves with `lower < commit_timestamp < upper`, ascending.
    ///
    /// With `collapse_redundant`, multiple leaves for the same
    /// case-insensitive `(package_id, package_version)` inside the window
    /// collapse to the one with the highest commit timestamp; the earlier
    /// ones carry nothing the final leaf does not supersede.
    #[must_use]
    pub fn leaves_in_bounds(
        &self,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
        collapse_redundant: bool,
    ) -> Vec<CatalogLeaf> {
        let window = self
            .leaves
            .iter()
            .filter(|leaf| leaf.commit_timestamp > lower && leaf.commit_timestamp < upper)
            .cloned();

        if !collapse_redundant {
            return window.collect();
        }

        let mut kept: Vec<CatalogLeaf> = window
            .into_grouping_map_by(|leaf| (leaf.routing_key(), leaf.package_version.clone()))
            .max_by_key(|_key, leaf| leaf.commit_timestamp)
            .into_values()
            .collect();
        kept.sort_by_key(|leaf| leaf.commit_timestamp);
        kept
    }

    /// Number of leaves in the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the page has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}
