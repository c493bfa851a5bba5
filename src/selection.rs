//! History-weighted shuffling
//!
//! Picks the next clip or animation variant from a fixed pool. Repeats are
//! allowed but biased against: underplayed and long-unheard items gain
//! weight, very recent ones lose a little, and nothing ever drops to zero.

use std::collections::VecDeque;
use std::fmt::Debug;

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

/// Errors from building or feeding a shuffler
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("selection pool is empty")]
    Empty,

    #[error("item {0} is not part of the pool")]
    UnknownItem(String),
}

/// Age credited to an item that was never picked. Large enough that every
/// unplayed item outweighs any played one, so a pool is exhausted before
/// anything repeats.
const NEVER_PLAYED_AGE: u64 = 1_000_000_000;

/// Tuning knobs of a [`WeightedShuffler`]
#[derive(Debug, Clone, Copy)]
pub struct ShufflerParams {
    /// How many recent picks are penalised; the very last pick is never
    /// drawn again immediately while another item exists
    pub recent_window: usize,
    pub unheard_boost: f64,
    pub age_boost: f64,
    pub recent_penalty: f64,
    pub min_weight: f64,
}

impl Default for ShufflerParams {
    fn default() -> Self {
        Self {
            recent_window: 2,
            unheard_boost: 2.0,
            age_boost: 0.15,
            recent_penalty: 0.10,
            min_weight: 0.05,
        }
    }
}

/// Fixed pool with play history
#[derive(Debug, Clone)]
pub struct WeightedShuffler<T> {
    items: Vec<T>,
    plays: Vec<u32>,
    last_pick: Vec<Option<u64>>,
    recent: VecDeque<usize>,
    picks: u64,
    params: ShufflerParams,
}

impl<T: Clone + PartialEq + Debug> WeightedShuffler<T> {
    pub fn new(items: Vec<T>, params: ShufflerParams) -> Result<Self, SelectionError> {
        if items.is_empty() {
            return Err(SelectionError::Empty);
        }
        let len = items.len();
        Ok(Self {
            items,
            plays: vec![0; len],
            last_pick: vec![None; len],
            recent: VecDeque::with_capacity(params.recent_window),
            picks: 0,
            params,
        })
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Selection weight of the item at `idx` given the history so far
    fn weight(&self, idx: usize) -> f64 {
        let p = &self.params;
        let plays = self.plays[idx];
        let age = match self.last_pick[idx] {
            Some(at) => self.picks.saturating_sub(at),
            None => NEVER_PLAYED_AGE,
        };
        let unheard = if plays == 0 { p.unheard_boost } else { 0.0 };

        let mut w = (1.0 / (1.0 + f64::from(plays))) * (1.0 + unheard) * (1.0 + p.age_boost * age as f64);
        if self.recent.contains(&idx) {
            w *= (1.0 - p.recent_penalty).max(0.0);
        }
        w.max(p.min_weight)
    }

    fn note_pick(&mut self, idx: usize) {
        self.plays[idx] += 1;
        self.last_pick[idx] = Some(self.picks);
        if self.params.recent_window > 0 {
            if self.recent.len() == self.params.recent_window {
                self.recent.pop_front();
            }
            self.recent.push_back(idx);
        }
        self.picks += 1;
    }

    /// Draw one item and record it
    pub fn next(&mut self, rng: &mut impl Rng) -> T {
        let last = self.recent.back().copied();
        let no_repeat = self.items.len() >= 2 && self.params.recent_window >= 1;

        let weights: Vec<f64> = (0..self.items.len())
            .map(|idx| {
                if no_repeat && Some(idx) == last {
                    0.0
                } else {
                    self.weight(idx)
                }
            })
            .collect();

        // Weights are floored above zero, so at least one entry is positive
        let idx = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.random_range(0..self.items.len()),
        };
        self.note_pick(idx);
        self.items[idx].clone()
    }

    /// Record an externally chosen item without drawing
    pub fn observe(&mut self, item: &T) -> Result<(), SelectionError> {
        let idx = self
            .items
            .iter()
            .position(|candidate| candidate == item)
            .ok_or_else(|| SelectionError::UnknownItem(format!("{item:?}")))?;
        self.note_pick(idx);
        Ok(())
    }

    #[cfg(test)]
    fn plays_of(&self, item: &T) -> u32 {
        self.items
            .iter()
            .position(|candidate| candidate == item)
            .map(|idx| self.plays[idx])
            .unwrap_or(0)
    }
}
