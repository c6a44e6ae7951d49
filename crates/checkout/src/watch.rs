//! Watch set of candidate product variants
//!
//! Mutated from two directions: the supervisor merges ids in via bulk
//! command while the owning workflow picks and consumes them. A plain mutex
//! is enough — every touch is a short, synchronous critical section.

use std::sync::Mutex;

use rand::RngExt;

/// Set of variant ids a workflow opportunistically attempts to cart.
#[derive(Debug, Default)]
pub struct WatchSet {
    ids: Mutex<Vec<u64>>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge ids into the set, ignoring duplicates.
    pub fn merge(&self, new_ids: &[u64]) {
        let mut ids = self.ids.lock().expect("watch set lock poisoned");
        for id in new_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
    }

    /// Pick one id at random, leaving it in the set.
    pub fn pick(&self) -> Option<u64> {
        let ids = self.ids.lock().expect("watch set lock poisoned");
        if ids.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..ids.len());
        Some(ids[idx])
    }

    /// Remove an id once it has been carted.
    pub fn consume(&self, id: u64) {
        self.ids
            .lock()
            .expect("watch set lock poisoned")
            .retain(|&v| v != id);
    }

    pub fn len(&self) -> usize {
        self.ids.lock().expect("watch set lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current ids, for health reporting and tests.
    pub fn snapshot(&self) -> Vec<u64> {
        self.ids.lock().expect("watch set lock poisoned").clone()
    }
}
