// Locally displayed counters with optimistic deltas, rollback and deferred
// reconciliation.
//
// All counter mutation in the client goes through this store. At most one
// delta may be pending per (entity, key); authoritative values that arrive
// while a delta is pending are queued and settled when it resolves.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::backend::{EntityId, ProfileSide};

/// Entity id under which the global aggregate counters are stored.
pub const GLOBAL_ENTITY: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKey {
    /// Head-to-head battle wins.
    Votes,
    /// Chad side of a profile or of the global aggregate.
    SideA,
    /// Jeet side of a profile or of the global aggregate.
    SideB,
    /// Global total.
    Total,
    /// Comment likes.
    Likes,
}

impl CounterKey {
    pub fn for_side(side: ProfileSide) -> Self {
        match side {
            ProfileSide::Chad => CounterKey::SideA,
            ProfileSide::Jeet => CounterKey::SideB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterRef {
    pub entity_id: EntityId,
    pub key: CounterKey,
}

impl CounterRef {
    pub fn new(entity_id: impl Into<EntityId>, key: CounterKey) -> Self {
        Self {
            entity_id: entity_id.into(),
            key,
        }
    }

    pub fn global(key: CounterKey) -> Self {
        Self::new(GLOBAL_ENTITY, key)
    }
}

impl fmt::Display for CounterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.entity_id, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaStatus {
    Pending,
    Committed,
    RolledBack,
}

/// A single optimistic mutation of one counter.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterDelta {
    pub id: u64,
    pub target: CounterRef,
    pub amount: i64,
    pub applied_at: DateTime<Utc>,
    pub status: DeltaStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("an update to {target} is already in flight")]
pub struct ConflictError {
    pub target: CounterRef,
}

/// What `merge_authoritative` did with the incoming value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    Deferred,
}

/// Two complementary percentages that always sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub a: u8,
    pub b: u8,
}

/// Percentage split between two counters.
///
/// `a` is `round(a / (a + b) * 100)` rounded half up; `b` is its
/// complement. An empty total is an even split.
pub fn split_percent(a: u64, b: u64) -> Split {
    let total = a as u128 + b as u128;
    if total == 0 {
        return Split { a: 50, b: 50 };
    }
    let pct = (a as u128 * 200 + total) / (total * 2);
    let pct = pct.min(100) as u8;
    Split { a: pct, b: 100 - pct }
}

// ---------------------------------------------------------------------------
// OptimisticCounterStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct OptimisticCounterStore {
    values: HashMap<CounterRef, i64>,
    pending: HashMap<CounterRef, CounterDelta>,
    deferred: HashMap<CounterRef, u64>,
    next_delta_id: u64,
}

impl OptimisticCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Displayed value, clamped at zero. Untracked counters read as zero.
    pub fn value(&self, target: &CounterRef) -> u64 {
        self.raw(target).max(0) as u64
    }

    fn raw(&self, target: &CounterRef) -> i64 {
        self.values.get(target).copied().unwrap_or(0)
    }

    pub fn is_pending(&self, target: &CounterRef) -> bool {
        self.pending.contains_key(target)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Split between two counters of the same entity.
    pub fn split(&self, entity_id: &str, key_a: CounterKey, key_b: CounterKey) -> Split {
        split_percent(
            self.value(&CounterRef::new(entity_id, key_a)),
            self.value(&CounterRef::new(entity_id, key_b)),
        )
    }

    /// Set a display baseline. Unlike `merge_authoritative` nothing is
    /// queued: a counter with a pending delta is left alone and `false` is
    /// returned.
    pub fn seed(&mut self, target: CounterRef, value: u64) -> bool {
        if self.pending.contains_key(&target) {
            return false;
        }
        self.values.insert(target, to_signed(value));
        true
    }

    pub fn apply_optimistic(
        &mut self,
        target: CounterRef,
        amount: i64,
    ) -> Result<CounterDelta, ConflictError> {
        if self.pending.contains_key(&target) {
            return Err(ConflictError { target });
        }

        self.next_delta_id += 1;
        let delta = CounterDelta {
            id: self.next_delta_id,
            target: target.clone(),
            amount,
            applied_at: Utc::now(),
            status: DeltaStatus::Pending,
        };
        *self.values.entry(target.clone()).or_insert(0) += amount;
        self.pending.insert(target, delta.clone());
        debug!(delta = delta.id, target = %delta.target, amount, "applied optimistic delta");
        Ok(delta)
    }

    /// Settle a pending delta as successful.
    ///
    /// An authoritative value from the server replaces the displayed value
    /// and supersedes any queued poll result. Without one the optimistic
    /// value stands and the queued result is dropped as stale; the next
    /// poll reconciles.
    pub fn commit(&mut self, delta: &mut CounterDelta, authoritative: Option<u64>) {
        if !self.take_pending(delta) {
            // Already settled; still honour a fresh server value.
            if let Some(value) = authoritative {
                self.merge_authoritative(delta.target.clone(), value);
            }
            return;
        }

        delta.status = DeltaStatus::Committed;
        let queued = self.deferred.remove(&delta.target);
        if let Some(value) = authoritative {
            self.values.insert(delta.target.clone(), to_signed(value));
        } else if let Some(stale) = queued {
            debug!(target = %delta.target, stale, "dropped queued merge behind committed delta");
        }
    }

    /// Settle a pending delta as failed: reverse it exactly, then apply any
    /// authoritative value that was queued behind it.
    pub fn rollback(&mut self, delta: &mut CounterDelta) {
        if !self.take_pending(delta) {
            return;
        }

        delta.status = DeltaStatus::RolledBack;
        *self.values.entry(delta.target.clone()).or_insert(0) -= delta.amount;
        if let Some(value) = self.deferred.remove(&delta.target) {
            self.values.insert(delta.target.clone(), to_signed(value));
        }
        debug!(delta = delta.id, target = %delta.target, "rolled back delta");
    }

    /// Merge a server value. Replaces the displayed value unless a delta is
    /// pending for the key, in which case the value is queued; a later
    /// merge overwrites an earlier queued one.
    pub fn merge_authoritative(&mut self, target: CounterRef, value: u64) -> MergeOutcome {
        if self.pending.contains_key(&target) {
            self.deferred.insert(target, value);
            return MergeOutcome::Deferred;
        }
        self.values.insert(target, to_signed(value));
        MergeOutcome::Applied
    }

    fn take_pending(&mut self, delta: &CounterDelta) -> bool {
        if delta.status != DeltaStatus::Pending {
            return false;
        }
        match self.pending.get(&delta.target) {
            Some(pending) if pending.id == delta.id => {
                self.pending.remove(&delta.target);
                true
            }
            _ => false,
        }
    }
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(id: &str) -> CounterRef {
        CounterRef::new(id, CounterKey::Votes)
    }

    fn store_with(pairs: &[(&str, u64)]) -> OptimisticCounterStore {
        let mut store = OptimisticCounterStore::new();
        for (id, v) in pairs {
            store.merge_authoritative(votes(id), *v);
        }
        store
    }

    fn battle_split(store: &OptimisticCounterStore, a: &str, b: &str) -> Split {
        split_percent(store.value(&votes(a)), store.value(&votes(b)))
    }

    // ------ split ------

    #[test]
    fn split_even_when_empty() {
        assert_eq!(split_percent(0, 0), Split { a: 50, b: 50 });
    }

    #[test]
    fn split_rounds_half_up_and_complements() {
        assert_eq!(split_percent(1, 1), Split { a: 50, b: 50 });
        assert_eq!(split_percent(1, 2), Split { a: 33, b: 67 });
        assert_eq!(split_percent(2, 1), Split { a: 67, b: 33 });
        // 1/8 = 12.5% rounds up.
        assert_eq!(split_percent(1, 7), Split { a: 13, b: 87 });
        assert_eq!(split_percent(5, 0), Split { a: 100, b: 0 });
        assert_eq!(split_percent(0, 5), Split { a: 0, b: 100 });
    }

    #[test]
    fn split_handles_extreme_counts() {
        let s = split_percent(u64::MAX, u64::MAX);
        assert_eq!(s, Split { a: 50, b: 50 });
        let s = split_percent(u64::MAX, 1);
        assert_eq!(u16::from(s.a) + u16::from(s.b), 100);
    }

    // ------ apply / rollback ------

    #[test]
    fn vote_then_failure_restores_tally() {
        let mut store = store_with(&[("A", 40), ("B", 60)]);

        let mut delta = store.apply_optimistic(votes("A"), 1).unwrap();
        assert_eq!(store.value(&votes("A")), 41);
        assert_eq!(battle_split(&store, "A", "B").a, 41);

        store.rollback(&mut delta);
        assert_eq!(delta.status, DeltaStatus::RolledBack);
        assert_eq!(store.value(&votes("A")), 40);
        assert_eq!(store.value(&votes("B")), 60);
        assert_eq!(battle_split(&store, "A", "B").a, 40);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn second_delta_on_same_key_conflicts_without_effect() {
        let mut store = store_with(&[("A", 10)]);
        let _first = store.apply_optimistic(votes("A"), 1).unwrap();

        let err = store.apply_optimistic(votes("A"), 1).unwrap_err();
        assert_eq!(err.target, votes("A"));
        assert_eq!(store.value(&votes("A")), 11);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn different_keys_of_same_entity_do_not_conflict() {
        let mut store = OptimisticCounterStore::new();
        store
            .apply_optimistic(CounterRef::new("X", CounterKey::SideA), 1)
            .unwrap();
        store
            .apply_optimistic(CounterRef::new("X", CounterKey::Votes), 1)
            .unwrap();
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn key_is_free_again_after_resolution() {
        let mut store = OptimisticCounterStore::new();
        let mut first = store.apply_optimistic(votes("A"), 1).unwrap();
        store.commit(&mut first, None);
        assert!(store.apply_optimistic(votes("A"), 1).is_ok());
    }

    #[test]
    fn double_rollback_is_a_noop() {
        let mut store = store_with(&[("A", 5)]);
        let mut delta = store.apply_optimistic(votes("A"), 1).unwrap();
        store.rollback(&mut delta);
        store.rollback(&mut delta);
        assert_eq!(store.value(&votes("A")), 5);
    }

    #[test]
    fn negative_delta_never_displays_below_zero() {
        let mut store = OptimisticCounterStore::new();
        let mut delta = store
            .apply_optimistic(CounterRef::new("c1", CounterKey::Likes), -1)
            .unwrap();
        assert_eq!(store.value(&CounterRef::new("c1", CounterKey::Likes)), 0);
        store.rollback(&mut delta);
        assert_eq!(store.value(&CounterRef::new("c1", CounterKey::Likes)), 0);
    }

    // ------ commit ------

    #[test]
    fn commit_with_authoritative_value_wins() {
        let mut store = store_with(&[("A", 40)]);
        let mut delta = store.apply_optimistic(votes("A"), 1).unwrap();
        store.commit(&mut delta, Some(97));
        assert_eq!(delta.status, DeltaStatus::Committed);
        assert_eq!(store.value(&votes("A")), 97);
    }

    #[test]
    fn commit_without_authoritative_value_keeps_guess() {
        let mut store = store_with(&[("A", 40)]);
        let mut delta = store.apply_optimistic(votes("A"), 1).unwrap();
        store.commit(&mut delta, None);
        assert_eq!(store.value(&votes("A")), 41);
    }

    #[test]
    fn commit_after_rollback_still_sets_authoritative_value() {
        let mut store = store_with(&[("A", 40)]);
        let mut delta = store.apply_optimistic(votes("A"), 1).unwrap();
        store.rollback(&mut delta);
        store.commit(&mut delta, Some(44));
        assert_eq!(delta.status, DeltaStatus::RolledBack);
        assert_eq!(store.value(&votes("A")), 44);
    }

    // ------ merge ------

    #[test]
    fn merge_replaces_value_when_nothing_pending() {
        let mut store = store_with(&[("A", 40)]);
        assert_eq!(store.merge_authoritative(votes("A"), 55), MergeOutcome::Applied);
        assert_eq!(store.value(&votes("A")), 55);
    }

    #[test]
    fn merge_is_deferred_behind_pending_delta_then_applies_normally() {
        let mut store = store_with(&[("X", 10)]);
        let mut delta = store.apply_optimistic(votes("X"), 1).unwrap();

        assert_eq!(store.merge_authoritative(votes("X"), 3), MergeOutcome::Deferred);
        assert_eq!(store.value(&votes("X")), 11);

        store.commit(&mut delta, None);
        assert_eq!(store.value(&votes("X")), 11);

        assert_eq!(store.merge_authoritative(votes("X"), 12), MergeOutcome::Applied);
        assert_eq!(store.value(&votes("X")), 12);
    }

    #[test]
    fn queued_merge_applies_on_rollback() {
        let mut store = store_with(&[("X", 10)]);
        let mut delta = store.apply_optimistic(votes("X"), 1).unwrap();
        store.merge_authoritative(votes("X"), 14);
        store.merge_authoritative(votes("X"), 15);
        store.rollback(&mut delta);
        assert_eq!(store.value(&votes("X")), 15);
    }

    #[test]
    fn authoritative_commit_supersedes_queued_merge() {
        let mut store = store_with(&[("X", 10)]);
        let mut delta = store.apply_optimistic(votes("X"), 1).unwrap();
        store.merge_authoritative(votes("X"), 3);
        store.commit(&mut delta, Some(20));
        assert_eq!(store.value(&votes("X")), 20);
    }

    // ------ seed ------

    #[test]
    fn seed_sets_baseline_unless_pending() {
        let mut store = OptimisticCounterStore::new();
        assert!(store.seed(votes("A"), 7));
        assert!(store.seed(votes("A"), 9));
        assert_eq!(store.value(&votes("A")), 9);

        let mut delta = store.apply_optimistic(votes("A"), 1).unwrap();
        assert!(!store.seed(votes("A"), 50));
        assert_eq!(store.value(&votes("A")), 10);

        // Nothing was queued behind the delta.
        store.rollback(&mut delta);
        assert_eq!(store.value(&votes("A")), 9);
    }

    #[test]
    fn store_split_reads_entity_counters() {
        let mut store = OptimisticCounterStore::new();
        store.seed(CounterRef::new("p", CounterKey::SideA), 3);
        store.seed(CounterRef::new("p", CounterKey::SideB), 1);
        assert_eq!(
            store.split("p", CounterKey::SideA, CounterKey::SideB),
            Split { a: 75, b: 25 }
        );
    }
}
