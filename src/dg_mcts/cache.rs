// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An optional prediction cache keyed by board fingerprint, sharded to
//! keep lock contention low under many concurrent searchers -- the same
//! idiom the teacher's `global_cache` module applies to Go positions.
//! Entries age out by a monotonically advancing generation counter rather
//! than a true LRU, since that is cheap to maintain under a shared lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::tree::PredictionResult;

const NUM_SHARDS: usize = 64;

/// How many generations an entry survives before it is evicted on its
/// shard's next insert.
const MAX_AGE: u64 = 2;

struct Entry {
    result: PredictionResult,
    generation: u64,
}

struct Shard {
    entries: Mutex<HashMap<u64, Entry>>,
}

impl Shard {
    fn new() -> Self {
        Shard { entries: Mutex::new(HashMap::new()) }
    }
}

/// A sharded, generation-evicted cache from board fingerprint to the
/// evaluator's prediction for it.
pub struct PredictionCache {
    shards: Vec<Shard>,
    generation: AtomicU64,
}

impl PredictionCache {
    pub fn new() -> Self {
        PredictionCache { shards: (0..NUM_SHARDS).map(|_| Shard::new()).collect(), generation: AtomicU64::new(0) }
    }

    fn shard_for(&self, fingerprint: u64) -> &Shard {
        // the high bits are the best-mixed bits of an FNV-style hash, so
        // shard on those rather than the low bits.
        let index = (fingerprint >> 58) as usize % NUM_SHARDS;
        &self.shards[index]
    }

    pub fn get(&self, fingerprint: u64) -> Option<PredictionResult> {
        let shard = self.shard_for(fingerprint);
        let entries = shard.entries.lock().expect("cache shard lock poisoned");

        entries.get(&fingerprint).map(|entry| entry.result.clone())
    }

    pub fn insert(&self, fingerprint: u64, result: PredictionResult) {
        let generation = self.generation.load(Ordering::Relaxed);
        let shard = self.shard_for(fingerprint);
        let mut entries = shard.entries.lock().expect("cache shard lock poisoned");

        entries.retain(|_, entry| generation.saturating_sub(entry.generation) < MAX_AGE);
        entries.insert(fingerprint, Entry { result, generation });
    }

    /// Advances the generation counter, making all entries inserted before
    /// the oldest surviving generation eligible for eviction on their
    /// shard's next insert. Intended to be called by the self-play driver
    /// whenever the evaluator is checkpointed, since its predictions are
    /// now stale.
    pub fn advance_generation(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for PredictionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_entry() {
        let cache = PredictionCache::new();
        let result = PredictionResult { policy: vec![0.5, 0.5], value: 0.25 };

        assert!(cache.get(42).is_none());
        cache.insert(42, result.clone());

        let found = cache.get(42).unwrap();
        assert_eq!(found.value, 0.25);
    }

    #[test]
    fn entries_age_out_after_max_generations() {
        let cache = PredictionCache::new();
        cache.insert(7, PredictionResult { policy: vec![1.0], value: 0.0 });

        cache.advance_generation();
        cache.advance_generation();
        cache.advance_generation();

        // inserting anything into the same shard triggers the sweep.
        cache.insert(7 + 64, PredictionResult { policy: vec![1.0], value: 0.0 });

        assert!(cache.get(7).is_none());
    }
}
