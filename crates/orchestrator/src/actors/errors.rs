//! Coordinator-side error types.
//!
//! Transient failures (feed, store, worker plumbing) are logged and retried
//! by the scan schedule. Invariant violations are fatal and abort the actor
//! without applying the triggering mutation.

use thiserror::Error;

use canopy_feed::FeedError;

use crate::cursor::InvariantViolation;
use crate::persistence::StoreError;

/// Failures inside coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The feed could not be fetched.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The snapshot could not be saved or loaded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An internal-consistency guarantee was broken.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// An actor could not be spawned.
    #[error("failed to spawn actor '{target}': {reason}")]
    Spawn { target: String, reason: String },

    /// A message to a package worker could not be delivered.
    #[error("failed to deliver to package worker '{routing_key}'")]
    WorkerSend { routing_key: String },
}

impl CoordinatorError {
    /// Create a spawn error.
    pub fn spawn(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a worker delivery error.
    pub fn worker_send(routing_key: impl Into<String>) -> Self {
        Self::WorkerSend {
            routing_key: routing_key.into(),
        }
    }

    /// Whether this error must abort the actor rather than be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}
