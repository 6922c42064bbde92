// Periodic refresh of the global aggregate counters.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{AggregateStats, BackendRpc, RpcError};
use crate::counters::{CounterKey, CounterRef, MergeOutcome, OptimisticCounterStore};
use crate::protocol::{Completion, CompletionSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Fetch,
    /// Previous fetch still outstanding.
    Skip,
}

/// Tracks the single outstanding aggregate fetch. The timer itself lives in
/// the event loop, which calls `on_tick` on every interval tick and
/// `on_result` when the spawned fetch reports back.
#[derive(Debug)]
pub struct ReconciliationPoller {
    interval: Duration,
    in_flight: bool,
    skipped: u64,
}

impl ReconciliationPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            in_flight: false,
            skipped: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Ticks skipped because a fetch was already outstanding.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn on_tick(&mut self) -> TickDecision {
        if self.in_flight {
            self.skipped += 1;
            debug!("stats fetch still outstanding; skipping tick");
            return TickDecision::Skip;
        }
        self.in_flight = true;
        TickDecision::Fetch
    }

    /// Start a fetch if the tick allows one.
    pub fn tick(&mut self, backend: &Arc<dyn BackendRpc>, completions: &CompletionSender) {
        if self.on_tick() == TickDecision::Fetch {
            spawn_fetch(Arc::clone(backend), completions.clone());
        }
    }

    /// Merge a finished fetch into the store. Returns the stats that were
    /// merged, or `None` on failure, which is only logged.
    pub fn on_result(
        &mut self,
        result: Result<AggregateStats, RpcError>,
        store: &mut OptimisticCounterStore,
    ) -> Option<AggregateStats> {
        self.in_flight = false;
        let stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                warn!("global stats refresh failed: {e}");
                return None;
            }
        };

        for (key, value) in [
            (CounterKey::SideA, stats.total_votes_a),
            (CounterKey::SideB, stats.total_votes_b),
            (CounterKey::Total, stats.total),
        ] {
            if store.merge_authoritative(CounterRef::global(key), value) == MergeOutcome::Deferred {
                debug!(?key, value, "deferred global merge behind pending vote");
            }
        }
        Some(stats)
    }
}

/// Fetch the aggregate in the background and report it as
/// `Completion::Stats`.
pub fn spawn_fetch(backend: Arc<dyn BackendRpc>, completions: CompletionSender) {
    tokio::spawn(async move {
        let result = backend.fetch_aggregate_stats().await;
        let _ = completions.send(Completion::Stats(result));
    });
}
