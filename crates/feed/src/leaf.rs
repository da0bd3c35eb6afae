//! Catalog leaf values and their identity.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a catalog leaf.
///
/// The taxonomy is closed. Every dispatch site matches on it exhaustively, so
/// adding a kind is a compile-time-visible change at each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeafKind {
    /// Package details were published or updated.
    DetailsUpdate,
    /// Package was removed from the catalog.
    Delete,
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DetailsUpdate => write!(f, "details-update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One immutable package event from the catalog feed.
///
/// Two leaves describe the same event iff `kind`, `package_id`,
/// `package_version` and `commit_timestamp` are all equal; the derived
/// `PartialEq` is that identity. The commit timestamp is the sole ordering
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogLeaf {
    /// What happened to the package.
    pub kind: LeafKind,
    /// Case-insensitive package identity.
    pub package_id: String,
    /// Version the event applies to.
    pub package_version: String,
    /// Totally ordered timestamp assigned by the feed.
    pub commit_timestamp: DateTime<Utc>,
}

impl CatalogLeaf {
    /// Create a new leaf.
    pub fn new(
        kind: LeafKind,
        package_id: impl Into<String>,
        package_version: impl Into<String>,
        commit_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            package_id: package_id.into(),
            package_version: package_version.into(),
            commit_timestamp,
        }
    }

    /// Lower-cased package id, the per-package actor routing key.
    #[must_use]
    pub fn routing_key(&self) -> String {
        self.package_id.to_lowercase()
    }
}

impl fmt::Display for CatalogLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {}",
            self.kind,
            self.package_id,
            self.package_version,
            self.commit_timestamp.to_rfc3339()
        )
    }
}
