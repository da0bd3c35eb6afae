//! Dual-cursor bookkeeping for catalog indexing.
//!
//! The coordinator tracks two cursors over the feed's commit-timestamp axis:
//! `internal_cursor`, below which every leaf has at least been dispatched,
//! and `public_cursor`, below which every leaf is confirmed fully processed.
//! The pending set holds the in-flight gap between the two. All three are
//! mutated only from inside the coordinator actor, so none of the operations
//! here need locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use canopy_feed::CatalogLeaf;

/// Default bound on dispatched-but-unconfirmed leaves.
pub const DEFAULT_MAX_PENDING_LEAVES: usize = 100;

/// Fatal internal-consistency failures.
///
/// These indicate a bug in the uniqueness or monotonicity guarantees. The
/// operation that detects one must abort loudly rather than silently pick an
/// interpretation.
#[derive(Debug, Clone, Error)]
pub enum InvariantViolation {
    /// A leaf with this exact identity is already pending.
    #[error("leaf already pending: {leaf}")]
    DuplicatePendingEntry { leaf: CatalogLeaf },

    /// Admission was attempted past the capacity bound.
    #[error("pending set at capacity {capacity}, refused admission of {leaf}")]
    CapacityExceeded { capacity: usize, leaf: CatalogLeaf },

    /// A completion signal matched more than one pending entry.
    #[error("completion matched {matches} pending entries for {leaf}")]
    AmbiguousCompletion { leaf: CatalogLeaf, matches: usize },

    /// The public cursor already leads the completed leaf's timestamp.
    #[error("public cursor {public} leads completed leaf timestamp {completed}")]
    PublicCursorAhead {
        public: DateTime<Utc>,
        completed: DateTime<Utc>,
    },
}

/// Outcome of reconciling one completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// No pending entry matched: a duplicate or orphaned signal. Tolerated,
    /// nothing changed.
    Untracked,
    /// The leaf was removed but an older leaf is still outstanding, so the
    /// public cursor stayed put.
    Acknowledged,
    /// The public cursor advanced to the contained value.
    Advanced(DateTime<Utc>),
}

/// Serialized form of the cursor state; one record per coordinator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSnapshot {
    /// Timestamp below which all leaves are fully processed.
    pub public_cursor: DateTime<Utc>,
    /// Timestamp below which all leaves have at least been dispatched.
    pub internal_cursor: DateTime<Utc>,
    /// Leaves dispatched but not yet confirmed complete.
    pub pending: Vec<CatalogLeaf>,
}

/// Cursor and pending-set state owned by the coordinator actor.
#[derive(Debug, Clone)]
pub struct CursorState {
    public_cursor: DateTime<Utc>,
    internal_cursor: DateTime<Utc>,
    pending: Vec<CatalogLeaf>,
    capacity: usize,
}

impl CursorState {
    /// Fresh state: both cursors at the minimum representable timestamp.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            public_cursor: DateTime::<Utc>::MIN_UTC,
            internal_cursor: DateTime::<Utc>::MIN_UTC,
            pending: Vec::new(),
            capacity,
        }
    }

    /// Rebuild state from a persisted snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: CursorSnapshot, capacity: usize) -> Self {
        Self {
            public_cursor: snapshot.public_cursor,
            internal_cursor: snapshot.internal_cursor,
            pending: snapshot.pending,
            capacity,
        }
    }

    /// Snapshot the state for persistence.
    #[must_use]
    pub fn snapshot(&self) -> CursorSnapshot {
        CursorSnapshot {
            public_cursor: self.public_cursor,
            internal_cursor: self.internal_cursor,
            pending: self.pending.clone(),
        }
    }

    /// Timestamp below which all leaves are fully processed.
    #[must_use]
    pub fn public_cursor(&self) -> DateTime<Utc> {
        self.public_cursor
    }

    /// Timestamp below which all leaves have at least been dispatched.
    #[must_use]
    pub fn internal_cursor(&self) -> DateTime<Utc> {
        self.internal_cursor
    }

    /// Number of pending leaves.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the pending set has reached its capacity bound.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    /// Pending leaves for one routing key, ascending by commit timestamp.
    #[must_use]
    pub fn pending_for_package(&self, routing_key: &str) -> Vec<CatalogLeaf> {
        let mut leaves: Vec<CatalogLeaf> = self
            .pending
            .iter()
            .filter(|leaf| leaf.routing_key() == routing_key)
            .cloned()
            .collect();
        leaves.sort_by_key(|leaf| leaf.commit_timestamp);
        leaves
    }

    /// Whether any pending leaf routes to the given key.
    #[must_use]
    pub fn has_pending_for_package(&self, routing_key: &str) -> bool {
        self.pending
            .iter()
            .any(|leaf| leaf.routing_key() == routing_key)
    }

    /// Admit a newly discovered leaf into the pending set.
    ///
    /// The discovery loop refuses admission before the capacity bound is
    /// reached; hitting either guard here means the caller's bookkeeping is
    /// broken.
    ///
    /// # Errors
    ///
    /// `DuplicatePendingEntry` if a leaf with the same identity is already
    /// pending, `CapacityExceeded` if the set is full.
    pub fn admit(&mut self, leaf: CatalogLeaf) -> Result<(), InvariantViolation> {
        if self.pending.len() >= self.capacity {
            return Err(InvariantViolation::CapacityExceeded {
                capacity: self.capacity,
                leaf,
            });
        }
        if self.pending.contains(&leaf) {
            return Err(InvariantViolation::DuplicatePendingEntry { leaf });
        }
        self.pending.push(leaf);
        Ok(())
    }

    /// Raise the internal cursor to the maximum pending commit timestamp.
    ///
    /// Never lowers it: the cursor is monotone across the coordinator's
    /// lifetime even if the pending set has drained since the last raise.
    pub fn advance_internal(&mut self) -> DateTime<Utc> {
        let max_pending = self.pending.iter().map(|leaf| leaf.commit_timestamp).max();
        if let Some(max) = max_pending {
            if max > self.internal_cursor {
                self.internal_cursor = max;
            }
        }
        self.internal_cursor
    }

    /// Reconcile one completion signal against the pending set.
    ///
    /// The public cursor can only move past a timestamp once no older leaf
    /// remains outstanding; because workers complete out of order across
    /// packages, the three-way branch below is what keeps the cursor honest.
    ///
    /// # Errors
    ///
    /// `AmbiguousCompletion` if the leaf matched more than one pending entry,
    /// `PublicCursorAhead` if the public cursor already leads the completed
    /// leaf's timestamp. Both are fatal; the state is left unmodified except
    /// for the removal that exposed the violation, which the caller must not
    /// persist.
    pub fn complete(&mut self, leaf: &CatalogLeaf) -> Result<Completion, InvariantViolation> {
        let before = self.pending.len();
        self.pending.retain(|candidate| candidate != leaf);
        let removed = before.saturating_sub(self.pending.len());

        match removed {
            0 => Ok(Completion::Untracked),
            1 => {
                if self.public_cursor > leaf.commit_timestamp {
                    return Err(InvariantViolation::PublicCursorAhead {
                        public: self.public_cursor,
                        completed: leaf.commit_timestamp,
                    });
                }

                let next = if self.pending.is_empty() {
                    // Everything discovered so far is done; discovery may have
                    // moved past the completed leaf already.
                    self.internal_cursor
                } else if self
                    .pending
                    .iter()
                    .all(|candidate| candidate.commit_timestamp > leaf.commit_timestamp)
                {
                    // The completed leaf was the oldest outstanding one.
                    leaf.commit_timestamp
                } else {
                    // An older leaf is still pending; the cursor cannot skip
                    // over unprocessed work.
                    self.public_cursor
                };

                if next > self.public_cursor {
                    self.public_cursor = next;
                    Ok(Completion::Advanced(next))
                } else {
                    Ok(Completion::Acknowledged)
                }
            }
            matches => Err(InvariantViolation::AmbiguousCompletion {
                leaf: leaf.clone(),
                matches,
            }),
        }
    }
}
