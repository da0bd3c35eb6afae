//! Actor-based coordination for catalog indexing.
//!
//! Two cooperating actor roles, composed by message passing:
//!
//! - **Coordinator** (one global instance): scans the feed forward from its
//!   last-seen position, dispatches newly discovered leaves, and advances the
//!   publicly visible "safe" cursor as completions come back.
//! - **Package worker** (one instance per lower-cased package id): applies a
//!   package's leaves one at a time in delivery order and reports each
//!   completion upstream.
//!
//! The Coordinator is a single identity, so all of its operations are
//! mutually exclusive with each other. Workers are keyed per package, so
//! operations for the same package serialize while different packages run in
//! parallel. Sends between actors are at-least-once; the completion path is
//! built to tolerate duplicates and reordered signals.

pub mod coordinator;
pub mod errors;
pub mod messages;
pub mod package_worker;

pub use coordinator::{
    CoordinatorActorDef, CoordinatorArguments, CoordinatorState, ScanHandle, ScanTimer,
    spawn_coordinator,
};
pub use errors::CoordinatorError;
pub use messages::{CoordinatorMessage, CoordinatorStats, CursorView, PackageMessage};
pub use package_worker::{PackageWorkerArguments, PackageWorkerDef, PackageWorkerState};
