//! Coordinator behavioral tests.
//!
//! Following the BDD naming convention: given_<context>_when_<action>_then_<outcome>
//!
//! These drive the real actors end to end: an in-memory feed on one side, a
//! recording (optionally gated) processor on the other, and the coordinator's
//! query messages to observe cursor movement deterministically.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ractor::ActorRef;
use ractor::rpc::CallResult;

use canopy_feed::{CatalogLeaf, FeedClient, InMemoryFeed, LeafKind, TimestampSpan};
use canopy_orchestrator::{
    CoordinatorArguments, CoordinatorMessage, CoordinatorStats, CursorSink, IndexerConfig,
    InMemoryCursorSink, InMemoryStateStore, PackageProcessor, RecordingProcessor, StateStore,
    spawn_coordinator,
};

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn span(start: i64, end: i64) -> TimestampSpan {
    TimestampSpan::new(ts(start), ts(end))
}

fn update(id: &str, version: &str, secs: i64) -> CatalogLeaf {
    CatalogLeaf::new(LeafKind::DetailsUpdate, id, version, ts(secs))
}

struct Harness {
    feed: Arc<InMemoryFeed>,
    store: Arc<InMemoryStateStore>,
    processor: Arc<RecordingProcessor>,
    sink: Arc<InMemoryCursorSink>,
    coordinator: ActorRef<CoordinatorMessage>,
}

async fn spawn_harness(max_pending: usize, gated: bool) -> Harness {
    let feed = Arc::new(InMemoryFeed::new());
    let store = Arc::new(InMemoryStateStore::new());
    let processor = Arc::new(if gated {
        RecordingProcessor::gated()
    } else {
        RecordingProcessor::new()
    });
    let sink = Arc::new(InMemoryCursorSink::new());

    let config = IndexerConfig {
        max_pending_leaves: max_pending,
        scan_interval_secs: 0,
        state_path: None,
    };
    let args = CoordinatorArguments::new(
        Arc::clone(&feed) as Arc<dyn FeedClient>,
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::clone(&processor) as Arc<dyn PackageProcessor>,
        Arc::clone(&sink) as Arc<dyn CursorSink>,
    )
    .with_config(config);

    let coordinator = spawn_coordinator(args).await.expect("spawn should succeed");
    Harness {
        feed,
        store,
        processor,
        sink,
        coordinator,
    }
}

async fn stats(coordinator: &ActorRef<CoordinatorMessage>) -> CoordinatorStats {
    let result = coordinator
        .call(
            |reply| CoordinatorMessage::GetStats { reply },
            Some(Duration::from_secs(5)),
        )
        .await
        .expect("GetStats rpc should not fail");
    match result {
        CallResult::Success(stats) => stats,
        _ => panic!("GetStats call did not succeed"),
    }
}

async fn wait_for_stats(
    coordinator: &ActorRef<CoordinatorMessage>,
    predicate: impl Fn(&CoordinatorStats) -> bool,
) -> CoordinatorStats {
    for _ in 0..500 {
        let current = stats(coordinator).await;
        if predicate(&current) {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("coordinator did not reach the expected state in time");
}

fn scan(coordinator: &ActorRef<CoordinatorMessage>) {
    coordinator
        .send_message(CoordinatorMessage::Scan)
        .expect("coordinator should accept Scan");
}

// ============================================================================
// 1. DISCOVERY & CURSOR PROTOCOL
// ============================================================================

#[tokio::test]
async fn given_discovery_and_ordered_completions_then_cursors_follow_the_protocol() {
    let h = spawn_harness(100, true).await;
    h.feed
        .push_page(
            span(0, 4),
            vec![
                update("a", "1.0.0", 1),
                update("b", "1.0.0", 2),
                update("a", "1.1.0", 3),
            ],
        )
        .await;

    // Discovery: A@1, B@2, A@3 all dispatched, internal follows the newest,
    // public untouched.
    scan(&h.coordinator);
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 3).await;
    assert_eq!(s.internal_cursor, ts(3));
    assert_eq!(s.public_cursor, DateTime::<Utc>::MIN_UTC);
    assert_eq!(s.active_workers, 2);

    // Complete B@2: A@1 is older and still pending, public stays put.
    h.processor.release(&update("b", "1.0.0", 2)).await;
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 2).await;
    assert_eq!(s.public_cursor, DateTime::<Utc>::MIN_UTC);
    assert_eq!(s.active_workers, 1, "b's worker should be reclaimed");

    // Complete A@1: it was the oldest outstanding, public advances to it.
    h.processor.release(&update("a", "1.0.0", 1)).await;
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 1).await;
    assert_eq!(s.public_cursor, ts(1));
    assert_eq!(h.sink.latest().await, Some(ts(1)));

    // Complete A@3: pending drains, public catches up to internal.
    h.processor.release(&update("a", "1.1.0", 3)).await;
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 0).await;
    assert_eq!(s.public_cursor, ts(3));
    assert_eq!(s.internal_cursor, ts(3));
    assert_eq!(s.active_workers, 0);
    assert_eq!(h.sink.history().await, vec![ts(1), ts(3)]);
}

#[tokio::test]
async fn given_already_scanned_feed_when_scanned_again_then_nothing_new_is_dispatched() {
    let h = spawn_harness(100, false).await;
    h.feed
        .push_page(span(0, 2), vec![update("a", "1.0.0", 1)])
        .await;

    scan(&h.coordinator);
    wait_for_stats(&h.coordinator, |s| {
        s.pending_leaves == 0 && s.public_cursor == ts(1)
    })
    .await;

    // Everything is at or below the internal cursor now; a second scan finds
    // nothing and must not re-admit the leaf.
    scan(&h.coordinator);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let s = stats(&h.coordinator).await;
    assert_eq!(s.pending_leaves, 0);
    assert_eq!(s.public_cursor, ts(1));
    assert_eq!(h.processor.applied().await.len(), 1);
}

// ============================================================================
// 2. PER-PACKAGE ORDER & CROSS-PACKAGE INDEPENDENCE
// ============================================================================

#[tokio::test]
async fn given_leaves_across_pages_then_package_receives_them_in_timestamp_order() {
    let h = spawn_harness(100, false).await;
    // Page batching differs from per-package order on purpose; the id casing
    // differs too, the routing key must not care.
    h.feed
        .push_page(span(0, 1), vec![update("pkg", "1.0.0", 1)])
        .await;
    h.feed
        .push_page(
            span(2, 3),
            vec![update("Pkg", "1.1.0", 3), update("PKG", "1.0.1", 2)],
        )
        .await;

    scan(&h.coordinator);
    wait_for_stats(&h.coordinator, |s| {
        s.pending_leaves == 0 && s.public_cursor == ts(3)
    })
    .await;

    let applied = h.processor.applied_for("pkg").await;
    let stamps: Vec<_> = applied.iter().map(|l| l.commit_timestamp).collect();
    assert_eq!(stamps, vec![ts(1), ts(2), ts(3)]);
}

#[tokio::test]
async fn given_blocked_package_then_other_packages_still_complete() {
    let h = spawn_harness(100, true).await;
    h.feed
        .push_page(
            span(0, 3),
            vec![update("stuck", "1.0.0", 1), update("free", "1.0.0", 2)],
        )
        .await;

    scan(&h.coordinator);
    wait_for_stats(&h.coordinator, |s| s.pending_leaves == 2).await;

    // "free" completes while "stuck" never releases: independence both ways.
    h.processor.release(&update("free", "1.0.0", 2)).await;
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 1).await;
    assert_eq!(h.processor.applied_for("free").await.len(), 1);
    assert!(h.processor.applied_for("stuck").await.is_empty());
    // The public cursor cannot pass the older, still-stuck leaf.
    assert_eq!(s.public_cursor, DateTime::<Utc>::MIN_UTC);

    h.processor.release(&update("stuck", "1.0.0", 1)).await;
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 0).await;
    assert_eq!(s.public_cursor, ts(2));
}

// ============================================================================
// 3. BACKPRESSURE
// ============================================================================

#[tokio::test]
async fn given_saturated_pending_set_when_scanned_then_no_fetch_and_no_change() {
    let h = spawn_harness(2, true).await;
    h.feed
        .push_page(
            span(0, 4),
            vec![
                update("a", "1.0.0", 1),
                update("b", "1.0.0", 2),
                update("c", "1.0.0", 3),
            ],
        )
        .await;

    // Capacity 2: only the two oldest leaves are admitted.
    scan(&h.coordinator);
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 2).await;
    assert_eq!(s.internal_cursor, ts(2));

    // A saturated coordinator refuses to even look at the feed.
    let fetches_before = h.feed.index_fetches();
    scan(&h.coordinator);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let s = stats(&h.coordinator).await;
    assert_eq!(s.pending_leaves, 2);
    assert_eq!(s.internal_cursor, ts(2));
    assert_eq!(h.feed.index_fetches(), fetches_before);

    // Completions free capacity; the deferred leaf is picked up next pass.
    h.processor.release(&update("a", "1.0.0", 1)).await;
    wait_for_stats(&h.coordinator, |s| s.pending_leaves == 1).await;
    scan(&h.coordinator);
    let s = wait_for_stats(&h.coordinator, |s| s.internal_cursor == ts(3)).await;
    assert_eq!(s.pending_leaves, 2);

    h.processor.release(&update("b", "1.0.0", 2)).await;
    h.processor.release(&update("c", "1.0.0", 3)).await;
    let s = wait_for_stats(&h.coordinator, |s| s.pending_leaves == 0).await;
    assert_eq!(s.public_cursor, ts(3));
}

// ============================================================================
// 4. REDUNDANCY COLLAPSE
// ============================================================================

#[tokio::test]
async fn given_redundant_leaves_in_one_window_then_only_the_final_one_is_dispatched() {
    let h = spawn_harness(100, false).await;
    h.feed
        .push_page(
            span(0, 3),
            vec![
                CatalogLeaf::new(LeafKind::DetailsUpdate, "pkg", "1.0.0", ts(1)),
                CatalogLeaf::new(LeafKind::Delete, "pkg", "1.0.0", ts(2)),
            ],
        )
        .await;

    scan(&h.coordinator);
    wait_for_stats(&h.coordinator, |s| {
        s.pending_leaves == 0 && s.public_cursor == ts(2)
    })
    .await;

    let applied = h.processor.applied().await;
    assert_eq!(applied.len(), 1);
    assert_eq!(applied.first().unwrap().kind, LeafKind::Delete);
    assert_eq!(applied.first().unwrap().commit_timestamp, ts(2));
}

// ============================================================================
// 5. COMPLETION ANOMALIES
// ============================================================================

#[tokio::test]
async fn given_untracked_completion_then_state_is_unchanged_and_actor_survives() {
    let h = spawn_harness(100, false).await;
    h.feed
        .push_page(span(0, 2), vec![update("a", "1.0.0", 1)])
        .await;

    scan(&h.coordinator);
    wait_for_stats(&h.coordinator, |s| {
        s.pending_leaves == 0 && s.public_cursor == ts(1)
    })
    .await;

    // A completion for a leaf that was never dispatched: warn-and-ignore, the
    // cursors and the sink history stay exactly as they were.
    h.coordinator
        .send_message(CoordinatorMessage::LeafCompleted {
            leaf: update("ghost", "9.9.9", 5),
        })
        .expect("send should succeed");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let s = stats(&h.coordinator).await;
    assert_eq!(s.public_cursor, ts(1));
    assert_eq!(s.internal_cursor, ts(1));
    assert_eq!(s.pending_leaves, 0);
    assert_eq!(h.sink.history().await, vec![ts(1)]);
}

#[tokio::test]
async fn given_duplicate_completion_then_second_is_ignored() {
    let h = spawn_harness(100, false).await;
    h.feed
        .push_page(span(0, 2), vec![update("a", "1.0.0", 1)])
        .await;

    scan(&h.coordinator);
    wait_for_stats(&h.coordinator, |s| s.public_cursor == ts(1)).await;

    // The worker already completed this leaf once; the duplicate signal is a
    // tolerated no-op.
    h.coordinator
        .send_message(CoordinatorMessage::LeafCompleted {
            leaf: update("a", "1.0.0", 1),
        })
        .expect("send should succeed");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let s = stats(&h.coordinator).await;
    assert_eq!(s.public_cursor, ts(1));
    assert_eq!(h.sink.history().await, vec![ts(1)]);
}

// ============================================================================
// 6. SCAN TIMER
// ============================================================================

#[tokio::test]
async fn given_scan_timer_enabled_then_discovery_runs_without_manual_scans() {
    canopy_orchestrator::telemetry::init_telemetry();

    let feed = Arc::new(InMemoryFeed::new());
    feed.push_page(span(0, 2), vec![update("a", "1.0.0", 1)])
        .await;

    let config = IndexerConfig {
        max_pending_leaves: 100,
        scan_interval_secs: 1,
        state_path: None,
    };
    let args = CoordinatorArguments::new(
        Arc::clone(&feed) as Arc<dyn FeedClient>,
        Arc::new(InMemoryStateStore::new()) as Arc<dyn StateStore>,
        Arc::new(RecordingProcessor::new()) as Arc<dyn PackageProcessor>,
        Arc::new(canopy_orchestrator::LoggingCursorSink) as Arc<dyn CursorSink>,
    )
    .with_config(config);
    let coordinator = spawn_coordinator(args).await.expect("spawn should succeed");

    // The first timer tick fires immediately; no manual Scan is ever cast.
    let s = wait_for_stats(&coordinator, |s| {
        s.pending_leaves == 0 && s.public_cursor == ts(1)
    })
    .await;
    assert_eq!(s.internal_cursor, ts(1));

    coordinator
        .send_message(CoordinatorMessage::Shutdown)
        .expect("send should succeed");
}

// ============================================================================
// 7. PERSISTENCE ALONG THE WAY
// ============================================================================

#[tokio::test]
async fn given_discovery_then_snapshot_is_persisted_per_page_and_completion() {
    let h = spawn_harness(100, false).await;
    h.feed
        .push_page(span(0, 2), vec![update("a", "1.0.0", 1)])
        .await;
    h.feed
        .push_page(span(2, 4), vec![update("b", "1.0.0", 3)])
        .await;

    scan(&h.coordinator);
    wait_for_stats(&h.coordinator, |s| {
        s.pending_leaves == 0 && s.public_cursor == ts(3)
    })
    .await;

    // Two pages plus two completions: at least four saves.
    assert!(h.store.saves() >= 4, "saves = {}", h.store.saves());
    let snapshot = h.store.load().await.unwrap().unwrap();
    assert_eq!(snapshot.public_cursor, ts(3));
    assert_eq!(snapshot.internal_cursor, ts(3));
    assert!(snapshot.pending.is_empty());
}
