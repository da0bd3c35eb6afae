//! Catalog feed domain model for canopy.
//!
//! This crate owns the vocabulary of the catalog feed: leaf values and their
//! identity, the feed-page abstraction with its bounds queries, and the
//! `FeedClient` boundary behind which the remote feed lives.
//!
//! # Key Types
//!
//! - `CatalogLeaf` / `LeafKind`: one immutable package event
//! - `CatalogIndex` / `CatalogPage` / `PageRef`: the page abstraction
//! - `FeedClient`: the fetch boundary, consumed but not implemented here
//! - `InMemoryFeed`: feed double for tests

pub mod client;
pub mod error;
pub mod leaf;
pub mod memory;
pub mod page;

pub use client::FeedClient;
pub use error::{FeedError, Result};
pub use leaf::{CatalogLeaf, LeafKind};
pub use memory::InMemoryFeed;
pub use page::{CatalogIndex, CatalogPage, PageRef, TimestampSpan};
