//! Property-based tests for the cursor-advancement algorithm.
//!
//! Properties verified:
//! - Both cursors are monotone under any completion order
//! - `public_cursor <= internal_cursor` after every operation
//! - Completion is idempotent: a second signal for the same leaf never
//!   mutates state

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use canopy_feed::{CatalogLeaf, LeafKind};
use canopy_orchestrator::{Completion, CursorState};

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Build `count` leaves spread over `packages` routing keys, one per second.
fn build_leaves(count: usize, packages: u8) -> Vec<CatalogLeaf> {
    (0..count)
        .map(|i| {
            let kind = if i % 3 == 0 {
                LeafKind::Delete
            } else {
                LeafKind::DetailsUpdate
            };
            CatalogLeaf::new(
                kind,
                format!("pkg-{}", i % usize::from(packages)),
                format!("1.0.{i}"),
                ts(i as i64 + 1),
            )
        })
        .collect()
}

/// A leaf population plus a shuffled completion order over it.
fn population() -> impl Strategy<Value = (usize, u8, Vec<usize>)> {
    (1..40usize, 1..5u8).prop_flat_map(|(count, packages)| {
        let order: Vec<usize> = (0..count).collect();
        (Just(count), Just(packages), Just(order).prop_shuffle())
    })
}

proptest! {
    /// Whatever order completions arrive in, the cursors only move forward
    /// and the public cursor never leads the internal one.
    #[test]
    fn prop_cursors_monotone_under_any_completion_order(
        (count, packages, order) in population(),
    ) {
        let leaves = build_leaves(count, packages);
        let mut state = CursorState::new(count);

        for leaf in &leaves {
            state.admit(leaf.clone()).expect("admission should succeed");
            prop_assert!(state.public_cursor() <= state.internal_cursor());
        }
        state.advance_internal();
        prop_assert_eq!(state.internal_cursor(), ts(count as i64));

        let mut last_public = state.public_cursor();
        let mut last_internal = state.internal_cursor();
        for index in order {
            let outcome = state
                .complete(&leaves[index])
                .expect("completion should succeed");
            prop_assert!(outcome != Completion::Untracked, "first completion must match");

            prop_assert!(state.public_cursor() >= last_public);
            prop_assert!(state.internal_cursor() >= last_internal);
            prop_assert!(state.public_cursor() <= state.internal_cursor());
            last_public = state.public_cursor();
            last_internal = state.internal_cursor();
        }

        // Everything completed: the public cursor caught up with discovery.
        prop_assert_eq!(state.pending_len(), 0);
        prop_assert_eq!(state.public_cursor(), state.internal_cursor());
        prop_assert_eq!(state.public_cursor(), ts(count as i64));
    }

    /// A duplicate completion is a no-op regardless of when it arrives.
    #[test]
    fn prop_duplicate_completion_never_mutates_state(
        (count, packages, order) in population(),
    ) {
        let leaves = build_leaves(count, packages);
        let mut state = CursorState::new(count);
        for leaf in &leaves {
            state.admit(leaf.clone()).expect("admission should succeed");
        }
        state.advance_internal();

        for index in order {
            state
                .complete(&leaves[index])
                .expect("completion should succeed");

            let public = state.public_cursor();
            let internal = state.internal_cursor();
            let pending = state.pending_len();

            let duplicate = state
                .complete(&leaves[index])
                .expect("duplicate completion must be tolerated");
            prop_assert_eq!(duplicate, Completion::Untracked);
            prop_assert_eq!(state.public_cursor(), public);
            prop_assert_eq!(state.internal_cursor(), internal);
            prop_assert_eq!(state.pending_len(), pending);
        }
    }
}
