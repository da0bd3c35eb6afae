//! Messages for the coordinator and package worker actors.
//!
//! Design principles:
//! - Commands are fire-and-forget casts
//! - Queries return responses via `RpcReplyPort`
//! - Tolerated anomalies are logged, never actor crashes; invariant
//!   violations crash the actor loudly

use chrono::{DateTime, Utc};
use ractor::RpcReplyPort;

use canopy_feed::{CatalogLeaf, LeafKind};

/// Snapshot of the two cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorView {
    /// Timestamp below which all leaves are fully processed.
    pub public_cursor: DateTime<Utc>,
    /// Timestamp below which all leaves have at least been dispatched.
    pub internal_cursor: DateTime<Utc>,
}

/// Operational statistics for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Timestamp below which all leaves are fully processed.
    pub public_cursor: DateTime<Utc>,
    /// Timestamp below which all leaves have at least been dispatched.
    pub internal_cursor: DateTime<Utc>,
    /// Leaves dispatched but not yet confirmed complete.
    pub pending_leaves: usize,
    /// Package workers currently alive.
    pub active_workers: usize,
}

/// Messages for the coordinator actor.
pub enum CoordinatorMessage {
    // ═══════════════════════════════════════════════════════════════════════
    // COMMANDS (fire-and-forget)
    // ═══════════════════════════════════════════════════════════════════════
    /// Scan the feed forward from the internal cursor and dispatch newly
    /// discovered leaves. Fired by the scan timer or cast directly.
    Scan,

    /// A package worker finished processing a leaf. The payload is the same
    /// leaf value that was dispatched, used purely as a matching key.
    LeafCompleted {
        /// The completed leaf.
        leaf: CatalogLeaf,
    },

    /// Initiate graceful shutdown.
    Shutdown,

    // ═══════════════════════════════════════════════════════════════════════
    // QUERIES (request-response)
    // ═══════════════════════════════════════════════════════════════════════
    /// Get the two cursors.
    GetCursors {
        /// Reply port for the response.
        reply: RpcReplyPort<CursorView>,
    },

    /// Get operational statistics.
    GetStats {
        /// Reply port for the response.
        reply: RpcReplyPort<CoordinatorStats>,
    },
}

/// Messages for a package worker actor; one operation per leaf kind.
#[derive(Debug, Clone)]
pub enum PackageMessage {
    /// Apply a details-update leaf.
    ApplyDetailsUpdate {
        /// The leaf to apply.
        leaf: CatalogLeaf,
    },
    /// Apply a delete leaf.
    ApplyDelete {
        /// The leaf to apply.
        leaf: CatalogLeaf,
    },
}

impl PackageMessage {
    /// Select the worker operation for a leaf from its kind.
    ///
    /// Exhaustive over the closed taxonomy: a new kind fails to compile here
    /// and in the worker's handler.
    #[must_use]
    pub fn for_leaf(leaf: CatalogLeaf) -> Self {
        match leaf.kind {
            LeafKind::DetailsUpdate => Self::ApplyDetailsUpdate { leaf },
            LeafKind::Delete => Self::ApplyDelete { leaf },
        }
    }

    /// The leaf carried by this message.
    #[must_use]
    pub fn leaf(&self) -> &CatalogLeaf {
        match self {
            Self::ApplyDetailsUpdate { leaf } | Self::ApplyDelete { leaf } => leaf,
        }
    }
}
