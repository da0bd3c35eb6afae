//! The catalog coordinator actor.
//!
//! A single global identity owns the cursor state, the pending set, and the
//! per-package worker registry. Its mailbox serializes every operation, so
//! none of that state needs locking; the actor only suspends on feed fetches,
//! snapshot saves, and sends to other actors, and no suspension blocks any
//! other identity's progress.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use canopy_feed::{CatalogLeaf, FeedClient};

use crate::config::IndexerConfig;
use crate::cursor::{Completion, CursorState};
use crate::persistence::{CursorSink, StateStore};
use crate::processor::PackageProcessor;

use super::errors::CoordinatorError;
use super::messages::{CoordinatorMessage, CoordinatorStats, CursorView, PackageMessage};
use super::package_worker::{PackageWorkerArguments, PackageWorkerDef};

/// The coordinator actor definition.
#[derive(Clone, Default)]
pub struct CoordinatorActorDef;

/// Arguments passed to the coordinator on startup.
#[derive(Clone)]
pub struct CoordinatorArguments {
    /// Indexer configuration.
    pub config: IndexerConfig,
    /// The remote catalog feed.
    pub feed: Arc<dyn FeedClient>,
    /// Snapshot storage.
    pub store: Arc<dyn StateStore>,
    /// The package business logic handed to every worker.
    pub processor: Arc<dyn PackageProcessor>,
    /// Publication point for the public cursor.
    pub sink: Arc<dyn CursorSink>,
}

impl CoordinatorArguments {
    /// Create arguments with the default configuration.
    pub fn new(
        feed: Arc<dyn FeedClient>,
        store: Arc<dyn StateStore>,
        processor: Arc<dyn PackageProcessor>,
        sink: Arc<dyn CursorSink>,
    ) -> Self {
        Self {
            config: IndexerConfig::default(),
            feed,
            store,
            processor,
            sink,
        }
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }
}

/// Actor state: cursors, the worker registry, and collaborator handles.
pub struct CoordinatorState {
    cursors: CursorState,
    workers: HashMap<String, ActorRef<PackageMessage>>,
    feed: Arc<dyn FeedClient>,
    store: Arc<dyn StateStore>,
    processor: Arc<dyn PackageProcessor>,
    sink: Arc<dyn CursorSink>,
    scan_handle: Option<ScanHandle>,
}

impl Actor for CoordinatorActorDef {
    type Msg = CoordinatorMessage;
    type State = CoordinatorState;
    type Arguments = CoordinatorArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("CatalogCoordinator starting");

        let cursors = match args.store.load().await {
            Ok(Some(snapshot)) => {
                info!(
                    public = %snapshot.public_cursor,
                    internal = %snapshot.internal_cursor,
                    pending = snapshot.pending.len(),
                    "restored cursor snapshot"
                );
                CursorState::from_snapshot(snapshot, args.config.max_pending_leaves)
            }
            Ok(None) => CursorState::new(args.config.max_pending_leaves),
            Err(e) => return Err(Box::new(e)),
        };

        let mut state = CoordinatorState {
            cursors,
            workers: HashMap::new(),
            feed: args.feed,
            store: args.store,
            processor: args.processor,
            sink: args.sink,
            scan_handle: None,
        };

        // Redeliver leaves that were dispatched but not confirmed before the
        // last shutdown. Duplicate applications are absorbed by processor
        // idempotency and the untracked-completion tolerance.
        if let Err(e) = Self::redispatch_pending(&myself, &mut state).await {
            return Err(Box::new(e));
        }

        if let Some(interval) = args.config.scan_interval() {
            state.scan_handle = Some(ScanTimer::start(myself.clone(), interval));
        }

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CoordinatorMessage::Scan => {
                if let Err(e) = Self::run_scan(&myself, state).await {
                    if e.is_fatal() {
                        return Err(Box::new(e));
                    }
                    warn!(error = %e, "scan failed, retrying on next trigger");
                }
            }

            CoordinatorMessage::LeafCompleted { leaf } => {
                if let Err(e) = Self::handle_leaf_completed(state, &leaf).await {
                    if e.is_fatal() {
                        return Err(Box::new(e));
                    }
                    warn!(error = %e, leaf = %leaf, "completion bookkeeping incomplete");
                }
            }

            CoordinatorMessage::Shutdown => {
                info!("shutdown requested, stopping coordinator");
                Self::shutdown_workers(state);
                myself.stop(None);
            }

            CoordinatorMessage::GetCursors { reply } => {
                // Ignore send error - caller may have timed out
                let _ = reply.send(CursorView {
                    public_cursor: state.cursors.public_cursor(),
                    internal_cursor: state.cursors.internal_cursor(),
                });
            }

            CoordinatorMessage::GetStats { reply } => {
                let _ = reply.send(CoordinatorStats {
                    public_cursor: state.cursors.public_cursor(),
                    internal_cursor: state.cursors.internal_cursor(),
                    pending_leaves: state.cursors.pending_len(),
                    active_workers: state.workers.len(),
                });
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        info!("CatalogCoordinator stopping");
        Self::shutdown_workers(state);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Implementation
// ═══════════════════════════════════════════════════════════════════════════

impl CoordinatorActorDef {
    /// Discovery and dispatch: scan the feed forward from the internal
    /// cursor, admit and dispatch each new leaf, persist after every page.
    async fn run_scan(
        myself: &ActorRef<CoordinatorMessage>,
        state: &mut CoordinatorState,
    ) -> Result<(), CoordinatorError> {
        if state.cursors.is_saturated() {
            debug!(
                pending = state.cursors.pending_len(),
                "pending set full, skipping scan"
            );
            return Ok(());
        }

        let index = state.feed.fetch_index().await?;
        let pages = index.pages_in_bounds(state.cursors.internal_cursor(), DateTime::<Utc>::MAX_UTC);
        debug!(
            pages = pages.len(),
            internal = %state.cursors.internal_cursor(),
            "scanning catalog"
        );

        for page_ref in pages {
            if state.cursors.is_saturated() {
                debug!(page = %page_ref.uri, "pending set full, deferring remaining pages");
                break;
            }

            let page = state.feed.fetch_page(&page_ref).await?;
            let leaves = page.leaves_in_bounds(
                state.cursors.internal_cursor(),
                DateTime::<Utc>::MAX_UTC,
                true,
            );
            if leaves.is_empty() {
                // Pages are ordered: an empty yield means nothing further is
                // discoverable in this pass.
                break;
            }

            let mut admitted = 0usize;
            for leaf in leaves {
                if state.cursors.is_saturated() {
                    // Un-admitted leaves stay beyond the internal cursor and
                    // are rediscovered once completions free capacity.
                    break;
                }
                state.cursors.admit(leaf.clone())?;
                Self::dispatch_leaf(myself, state, &leaf).await?;
                admitted = admitted.saturating_add(1);
            }
            if admitted == 0 {
                break;
            }

            let internal = state.cursors.advance_internal();
            debug!(page = %page_ref.uri, admitted, internal = %internal, "page dispatched");
            // Persist before the next page so a crash leaves the internal
            // cursor consistent with exactly the pages fully processed.
            Self::persist(state).await?;
        }

        Ok(())
    }

    /// Completion reconciliation: match the leaf off the pending set and
    /// advance the public cursor when nothing older remains outstanding.
    async fn handle_leaf_completed(
        state: &mut CoordinatorState,
        leaf: &CatalogLeaf,
    ) -> Result<(), CoordinatorError> {
        let outcome = state.cursors.complete(leaf)?;

        match outcome {
            Completion::Untracked => {
                // The dispatch was never durably recorded (crash between send
                // and save) or the signal is a duplicate. Load-bearing for
                // crash recovery: tolerated, nothing to change.
                warn!(leaf = %leaf, "completion for untracked leaf, ignoring");
                return Ok(());
            }
            Completion::Acknowledged => {
                debug!(leaf = %leaf, "leaf completed, older work still outstanding");
            }
            Completion::Advanced(cursor) => {
                debug!(leaf = %leaf, cursor = %cursor, "leaf completed, public cursor advanced");
            }
        }

        let key = leaf.routing_key();
        if !state.cursors.has_pending_for_package(&key) {
            if let Some(worker) = state.workers.remove(&key) {
                debug!(package = %key, "reclaiming idle package worker");
                worker.stop(None);
            }
        }

        Self::persist(state).await?;

        if let Completion::Advanced(cursor) = outcome {
            if let Err(e) = state.sink.publish(cursor).await {
                warn!(error = %e, cursor = %cursor, "failed to publish public cursor");
            }
        }

        Ok(())
    }

    /// Route a leaf to its package worker, spawning one if needed.
    async fn dispatch_leaf(
        myself: &ActorRef<CoordinatorMessage>,
        state: &mut CoordinatorState,
        leaf: &CatalogLeaf,
    ) -> Result<(), CoordinatorError> {
        let key = leaf.routing_key();

        if let Some(worker) = state.workers.get(&key) {
            match worker.send_message(PackageMessage::for_leaf(leaf.clone())) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // The worker died since we last used it; replace it and
                    // replay its pending leaves in order.
                    warn!(package = %key, error = %e, "package worker unreachable, respawning");
                    state.workers.remove(&key);
                }
            }
        }

        Self::spawn_worker(myself, state, &key).await
    }

    /// Spawn a worker for a routing key and replay every pending leaf for
    /// that key in ascending timestamp order, so per-package causal order
    /// survives worker loss.
    async fn spawn_worker(
        myself: &ActorRef<CoordinatorMessage>,
        state: &mut CoordinatorState,
        routing_key: &str,
    ) -> Result<(), CoordinatorError> {
        let args = PackageWorkerArguments {
            routing_key: routing_key.to_string(),
            coordinator: myself.clone(),
            processor: Arc::clone(&state.processor),
        };
        let (worker, _join) = Actor::spawn(None, PackageWorkerDef, args)
            .await
            .map_err(|e| CoordinatorError::spawn(routing_key, e.to_string()))?;

        for pending in state.cursors.pending_for_package(routing_key) {
            worker
                .send_message(PackageMessage::for_leaf(pending))
                .map_err(|_| CoordinatorError::worker_send(routing_key))?;
        }

        state.workers.insert(routing_key.to_string(), worker);
        Ok(())
    }

    /// Redeliver all persisted pending leaves after a restart.
    async fn redispatch_pending(
        myself: &ActorRef<CoordinatorMessage>,
        state: &mut CoordinatorState,
    ) -> Result<(), CoordinatorError> {
        let keys: BTreeSet<String> = state
            .cursors
            .snapshot()
            .pending
            .iter()
            .map(CatalogLeaf::routing_key)
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        info!(
            leaves = state.cursors.pending_len(),
            packages = keys.len(),
            "redispatching unconfirmed leaves"
        );
        for key in keys {
            Self::spawn_worker(myself, state, &key).await?;
        }
        Ok(())
    }

    async fn persist(state: &mut CoordinatorState) -> Result<(), CoordinatorError> {
        state.store.save(&state.cursors.snapshot()).await?;
        Ok(())
    }

    fn shutdown_workers(state: &mut CoordinatorState) {
        if let Some(handle) = state.scan_handle.take() {
            handle.stop();
        }
        for (key, worker) in state.workers.drain() {
            debug!(package = %key, "stopping package worker");
            worker.stop(None);
        }
    }
}

/// Handle for stopping a scan timer.
#[derive(Clone)]
pub struct ScanHandle {
    stop_tx: watch::Sender<bool>,
}

impl ScanHandle {
    /// Stop the timer.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Timer that casts `Scan` to the coordinator at a fixed interval.
///
/// The first tick fires immediately, giving a startup scan; the timer dies
/// with the coordinator.
#[derive(Clone, Debug)]
pub struct ScanTimer;

impl ScanTimer {
    /// Start the timer against a coordinator.
    pub fn start(target: ActorRef<CoordinatorMessage>, interval: Duration) -> ScanHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let mut ticker = tokio::time::interval(interval);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if target.send_message(CoordinatorMessage::Scan).is_err() {
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        ScanHandle { stop_tx }
    }
}

/// Spawn a coordinator actor.
///
/// # Errors
///
/// `CoordinatorError::Spawn` when startup fails, including a failed snapshot
/// load or a failed redispatch of persisted pending leaves.
pub async fn spawn_coordinator(
    args: CoordinatorArguments,
) -> Result<ActorRef<CoordinatorMessage>, CoordinatorError> {
    let (actor_ref, _handle) = Actor::spawn(None, CoordinatorActorDef, args)
        .await
        .map_err(|e| CoordinatorError::spawn("catalog-coordinator", e.to_string()))?;
    Ok(actor_ref)
}
