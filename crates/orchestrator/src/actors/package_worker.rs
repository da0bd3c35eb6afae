//! Per-package worker actor.
//!
//! One instance per active lower-cased package id. The mailbox applies the
//! package's leaves strictly in delivery order, which together with the
//! coordinator's ascending dispatch preserves per-package causal order end to
//! end. The worker holds no state of its own between leaves; everything
//! durable lives with the coordinator.

use std::sync::Arc;

use ractor::{Actor, ActorProcessingErr, ActorRef};
use tracing::{debug, warn};

use canopy_feed::CatalogLeaf;

use crate::processor::PackageProcessor;

use super::messages::{CoordinatorMessage, PackageMessage};

/// The package worker actor definition.
#[derive(Clone, Default)]
pub struct PackageWorkerDef;

/// Arguments passed to a worker on startup.
pub struct PackageWorkerArguments {
    /// Lower-cased package id this worker serves.
    pub routing_key: String,
    /// Where completion signals go.
    pub coordinator: ActorRef<CoordinatorMessage>,
    /// The package business logic.
    pub processor: Arc<dyn PackageProcessor>,
}

/// Worker state: collaborator handles only.
pub struct PackageWorkerState {
    routing_key: String,
    coordinator: ActorRef<CoordinatorMessage>,
    processor: Arc<dyn PackageProcessor>,
}

impl Actor for PackageWorkerDef {
    type Msg = PackageMessage;
    type State = PackageWorkerState;
    type Arguments = PackageWorkerArguments;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        debug!(package = %args.routing_key, "package worker starting");
        Ok(PackageWorkerState {
            routing_key: args.routing_key,
            coordinator: args.coordinator,
            processor: args.processor,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        // Exhaustive over the closed leaf taxonomy: a new kind must add an
        // arm here and in the coordinator's dispatch selection.
        let leaf: CatalogLeaf = match message {
            PackageMessage::ApplyDetailsUpdate { leaf } => {
                debug!(package = %state.routing_key, leaf = %leaf, "applying details update");
                if let Err(e) = state.processor.apply_details_update(&leaf).await {
                    warn!(package = %state.routing_key, leaf = %leaf, error = %e, "package processing failed");
                    return Err(Box::new(e));
                }
                leaf
            }
            PackageMessage::ApplyDelete { leaf } => {
                debug!(package = %state.routing_key, leaf = %leaf, "applying delete");
                if let Err(e) = state.processor.apply_delete(&leaf).await {
                    warn!(package = %state.routing_key, leaf = %leaf, error = %e, "package processing failed");
                    return Err(Box::new(e));
                }
                leaf
            }
        };

        // At-least-once: if this send is lost the leaf stays pending and is
        // redelivered after restart; if it is duplicated the coordinator
        // tolerates the untracked match.
        if let Err(e) = state
            .coordinator
            .send_message(CoordinatorMessage::LeafCompleted { leaf })
        {
            debug!(package = %state.routing_key, error = %e, "coordinator unreachable for completion signal");
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        debug!(package = %state.routing_key, "package worker stopping");
        Ok(())
    }
}
