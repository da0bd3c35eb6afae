//! The package-processing boundary.
//!
//! The side effect performed for each leaf (updating a search index,
//! invalidating caches, and so on) is an external collaborator. It must be
//! idempotent: delivery between actors is at-least-once, so a leaf may be
//! applied more than once after a worker respawn or a process restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock};

use canopy_feed::CatalogLeaf;

/// Error from a package processor.
#[derive(Debug, Clone, Error)]
#[error("package processing failed: {reason}")]
pub struct ProcessorError {
    /// What went wrong, in the collaborator's own words.
    pub reason: String,
}

impl ProcessorError {
    /// Create a processor error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Per-leaf package business logic, consumed but not implemented by the core.
#[async_trait]
pub trait PackageProcessor: Send + Sync {
    /// Apply a details-update leaf.
    async fn apply_details_update(&self, leaf: &CatalogLeaf) -> Result<(), ProcessorError>;

    /// Apply a delete leaf.
    async fn apply_delete(&self, leaf: &CatalogLeaf) -> Result<(), ProcessorError>;
}

/// Processor double for testing: records applied leaves in order.
///
/// In gated mode each leaf blocks until released, which lets tests decide the
/// completion order across packages deterministically while still exercising
/// the real worker path.
#[derive(Default)]
pub struct RecordingProcessor {
    applied: RwLock<Vec<CatalogLeaf>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    gated: bool,
}

impl RecordingProcessor {
    /// Pass-through recorder: every leaf applies immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gated recorder: each leaf blocks until `release` is called for it.
    #[must_use]
    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::default()
        }
    }

    fn gate_id(leaf: &CatalogLeaf) -> String {
        format!(
            "{}|{}|{}|{}",
            leaf.kind,
            leaf.routing_key(),
            leaf.package_version,
            leaf.commit_timestamp.to_rfc3339()
        )
    }

    async fn gate(&self, leaf: &CatalogLeaf) -> Arc<Notify> {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(Self::gate_id(leaf)).or_default())
    }

    /// Allow one blocked (or future) application of `leaf` to proceed.
    pub async fn release(&self, leaf: &CatalogLeaf) {
        self.gate(leaf).await.notify_one();
    }

    /// Every applied leaf, in application order.
    pub async fn applied(&self) -> Vec<CatalogLeaf> {
        self.applied.read().await.clone()
    }

    /// Applied leaves for one routing key, in application order.
    pub async fn applied_for(&self, routing_key: &str) -> Vec<CatalogLeaf> {
        self.applied
            .read()
            .await
            .iter()
            .filter(|leaf| leaf.routing_key() == routing_key)
            .cloned()
            .collect()
    }

    async fn apply(&self, leaf: &CatalogLeaf) -> Result<(), ProcessorError> {
        if self.gated {
            let gate = self.gate(leaf).await;
            gate.notified().await;
        }
        self.applied.write().await.push(leaf.clone());
        Ok(())
    }
}

#[async_trait]
impl PackageProcessor for RecordingProcessor {
    async fn apply_details_update(&self, leaf: &CatalogLeaf) -> Result<(), ProcessorError> {
        self.apply(leaf).await
    }

    async fn apply_delete(&self, leaf: &CatalogLeaf) -> Result<(), ProcessorError> {
        self.apply(leaf).await
    }
}
