// Next-battle selection with a no-immediate-repeat rule.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use crate::backend::{Entity, EntityId};

/// Two entities presented head to head. Equality of matchups ignores
/// which side each entity is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattlePair {
    pub left: EntityId,
    pub right: EntityId,
}

impl BattlePair {
    pub fn new(left: impl Into<EntityId>, right: impl Into<EntityId>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn same_matchup(&self, other: &BattlePair) -> bool {
        (self.left == other.left && self.right == other.right)
            || (self.left == other.right && self.right == other.left)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.left == id || self.right == id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("need at least two distinct entities for a battle, have {available}")]
pub struct InsufficientPoolError {
    pub available: usize,
}

pub struct BattlePairSelector<R: Rng = StdRng> {
    rng: R,
    history: VecDeque<BattlePair>,
    history_len: usize,
    max_redraws: u32,
}

impl BattlePairSelector<StdRng> {
    pub fn new(history_len: usize, max_redraws: u32) -> Self {
        Self::with_rng(StdRng::from_entropy(), history_len, max_redraws)
    }
}

impl<R: Rng> BattlePairSelector<R> {
    /// Selector drawing from the given random source. `history_len` is
    /// raised to at least one.
    pub fn with_rng(rng: R, history_len: usize, max_redraws: u32) -> Self {
        let history_len = history_len.max(1);
        Self {
            rng,
            history: VecDeque::with_capacity(history_len),
            history_len,
            max_redraws,
        }
    }

    /// The most recently selected pair.
    pub fn current(&self) -> Option<&BattlePair> {
        self.history.back()
    }

    /// Recent pairs, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &BattlePair> {
        self.history.iter()
    }

    /// Pick the next pair from `pool`.
    ///
    /// Random draws avoid every remembered pair for up to `max_redraws`
    /// retries. After that the choice falls back to the remembered-free
    /// pairs, then to any pair other than the immediately preceding one,
    /// and finally accepts whatever was drawn. A pool of at least three
    /// distinct entities therefore never repeats the previous matchup.
    /// The new pair is recorded before returning.
    pub fn select_next(&mut self, pool: &[Entity]) -> Result<BattlePair, InsufficientPoolError> {
        let ids = unique_ids(pool);
        if ids.len() < 2 {
            return Err(InsufficientPoolError {
                available: ids.len(),
            });
        }

        let mut pair = self.draw(&ids);
        let mut redraws = 0;
        while self.remembered(&pair) && redraws < self.max_redraws {
            pair = self.draw(&ids);
            redraws += 1;
        }

        if self.remembered(&pair) {
            pair = self.fallback(&ids).unwrap_or(pair);
        }

        debug!(left = %pair.left, right = %pair.right, redraws, "selected battle pair");
        self.record(pair.clone());
        Ok(pair)
    }

    fn draw(&mut self, ids: &[&str]) -> BattlePair {
        let first = self.rng.gen_range(0..ids.len());
        let mut second = self.rng.gen_range(0..ids.len() - 1);
        if second >= first {
            second += 1;
        }
        BattlePair::new(ids[first], ids[second])
    }

    fn remembered(&self, pair: &BattlePair) -> bool {
        self.history.iter().any(|p| p.same_matchup(pair))
    }

    fn fallback(&mut self, ids: &[&str]) -> Option<BattlePair> {
        let all: Vec<BattlePair> = ids
            .iter()
            .enumerate()
            .flat_map(|(i, a)| ids[i + 1..].iter().map(move |b| BattlePair::new(*a, *b)))
            .collect();

        let fresh: Vec<&BattlePair> = all.iter().filter(|p| !self.remembered(p)).collect();
        let candidates = if fresh.is_empty() {
            let previous = self.history.back();
            all.iter()
                .filter(|p| previous.map_or(true, |prev| !prev.same_matchup(p)))
                .collect()
        } else {
            fresh
        };

        if candidates.is_empty() {
            return None;
        }
        let chosen = candidates[self.rng.gen_range(0..candidates.len())].clone();
        if self.rng.gen_bool(0.5) {
            Some(BattlePair::new(chosen.right, chosen.left))
        } else {
            Some(chosen)
        }
    }

    fn record(&mut self, pair: BattlePair) {
        self.history.push_back(pair);
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }
    }
}

/// Pool ids in first-seen order with duplicates removed.
fn unique_ids(pool: &[Entity]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::with_capacity(pool.len());
    for entity in pool {
        if !ids.contains(&entity.id.as_str()) {
            ids.push(entity.id.as_str());
        }
    }
    ids
}
