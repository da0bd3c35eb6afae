//! Catalog coordinator and per-package workers for canopy.
//!
//! This crate indexes an append-only, strictly-ordered feed of package
//! events while giving each package its own total order of processing and
//! letting unrelated packages process fully in parallel.
//!
//! # Architecture
//!
//! - `cursor`: the dual-cursor consistency model and pending-set bookkeeping
//! - `actors`: the coordinator singleton and the per-package workers
//! - `persistence`: snapshot storage and public-cursor publication
//! - `processor`: the boundary behind which the package business logic lives
//! - `config` / `telemetry`: ambient configuration and tracing setup
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use canopy_feed::InMemoryFeed;
//! use canopy_orchestrator::{
//!     CoordinatorArguments, InMemoryStateStore, LoggingCursorSink, RecordingProcessor,
//!     spawn_coordinator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     canopy_orchestrator::telemetry::init_telemetry();
//!
//!     let args = CoordinatorArguments::new(
//!         Arc::new(InMemoryFeed::new()),
//!         Arc::new(InMemoryStateStore::new()),
//!         Arc::new(RecordingProcessor::new()),
//!         Arc::new(LoggingCursorSink),
//!     );
//!     let coordinator = spawn_coordinator(args).await?;
//!
//!     // The scan timer drives discovery from here on.
//!     coordinator.send_message(canopy_orchestrator::CoordinatorMessage::Shutdown)?;
//!     Ok(())
//! }
//! ```

pub mod actors;
pub mod config;
pub mod cursor;
pub mod persistence;
pub mod processor;
pub mod telemetry;

pub use actors::{
    CoordinatorActorDef, CoordinatorArguments, CoordinatorError, CoordinatorMessage,
    CoordinatorStats, CursorView, PackageMessage, PackageWorkerDef, spawn_coordinator,
};
pub use config::{ConfigError, IndexerConfig};
pub use cursor::{
    Completion, CursorSnapshot, CursorState, DEFAULT_MAX_PENDING_LEAVES, InvariantViolation,
};
pub use persistence::{
    CursorSink, FileStateStore, InMemoryCursorSink, InMemoryStateStore, LoggingCursorSink,
    StateStore, StoreError,
};
pub use processor::{PackageProcessor, ProcessorError, RecordingProcessor};
