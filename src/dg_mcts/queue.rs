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

//! The batched prediction queue (C4), ported from
//! `original_source/generic/prediction_queue.{h,cpp}`. Many search threads
//! call `predict` concurrently; their encoded positions are packed into
//! shared work batches so the evaluator sees full-sized minibatches instead
//! of one-at-a-time calls, without any caller having to know about batching.
//!
//! Two locks are in play, deliberately: `Shared::inner` arbitrates which
//! batch is the current tail (for submitters) or front (for workers), while
//! each `Batch`'s own mutex guards that batch's buffer and `ready` flag.
//! The original collapses both into a single `absl::Mutex` plus
//! `Mutex::Await` predicates; `std::sync::Condvar` has no equivalent
//! arbitrary-predicate wait, so splitting the lock in two is the natural
//! translation rather than polling in a loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use dg_eval::{Evaluator, Prediction};
use dg_game::Game;

use dg_utils::config;

use crate::cache::PredictionCache;
use crate::tree::PredictionResult;

struct BatchState<G: Game> {
    buffer: Vec<f32>,
    boards: Vec<G>,
    predictions: Vec<Prediction>,
    size: usize,
    ready: bool,
    pending_requests: usize,
}

impl<G: Game> BatchState<G> {
    fn new(capacity: usize, feature_size: usize) -> Self {
        BatchState {
            buffer: vec![0.0; capacity * feature_size],
            boards: Vec::with_capacity(capacity),
            predictions: Vec::new(),
            size: 0,
            ready: false,
            pending_requests: 0,
        }
    }

    fn reset(&mut self) {
        self.boards.clear();
        self.predictions.clear();
        self.size = 0;
        self.ready = false;
        self.pending_requests = 0;
    }
}

struct Batch<G: Game> {
    state: Mutex<BatchState<G>>,
    ready_cond: Condvar,
}

impl<G: Game> Batch<G> {
    fn new(capacity: usize, feature_size: usize) -> Self {
        Batch { state: Mutex::new(BatchState::new(capacity, feature_size)), ready_cond: Condvar::new() }
    }
}

struct Inner<G: Game> {
    batches: VecDeque<Arc<Batch<G>>>,
    freelist: Vec<Arc<Batch<G>>>,
    stopped: bool,
    num_working: usize,
}

struct Shared<G: Game> {
    evaluator: Arc<dyn Evaluator>,
    cache: Option<PredictionCache>,
    max_batch_size: usize,
    feature_size: usize,
    inner: Mutex<Inner<G>>,
    has_work: Condvar,
    not_full: Condvar,
    num_batches_served: AtomicU64,
    num_predictions_served: AtomicU64,
}

/// A batched, multi-threaded front for an `Evaluator`. Cloning is cheap and
/// shares the same underlying queue and worker pool (it is a handle, the
/// way the teacher's `Pool` is handed out to each MCTS worker thread).
pub struct PredictionQueue<G: Game> {
    shared: Arc<Shared<G>>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<G: Game> Clone for PredictionQueue<G> {
    fn clone(&self) -> Self {
        PredictionQueue { shared: self.shared.clone(), workers: self.workers.clone() }
    }
}

impl<G: Game> PredictionQueue<G> {
    pub fn new(evaluator: Arc<dyn Evaluator>, use_cache: bool) -> Self {
        assert_eq!(evaluator.feature_size(), G::FEATURE_SIZE, "evaluator built for a different game");
        assert_eq!(evaluator.num_move_indices(), G::NUM_MOVE_INDICES, "evaluator built for a different game");

        let shared = Arc::new(Shared {
            evaluator,
            cache: if use_cache { Some(PredictionCache::new()) } else { None },
            max_batch_size: *config::BATCH_SIZE,
            feature_size: G::FEATURE_SIZE,
            inner: Mutex::new(Inner { batches: VecDeque::new(), freelist: Vec::new(), stopped: false, num_working: 0 }),
            has_work: Condvar::new(),
            not_full: Condvar::new(),
            num_batches_served: AtomicU64::new(0),
            num_predictions_served: AtomicU64::new(0),
        });

        let mut workers = Vec::with_capacity(*config::NUM_PREDICT_WORKERS);
        for _ in 0..*config::NUM_PREDICT_WORKERS {
            let shared = shared.clone();
            workers.push(thread::spawn(move || worker_loop(shared)));
        }

        PredictionQueue { shared, workers: Arc::new(Mutex::new(workers)) }
    }

    pub fn num_predictions_served(&self) -> u64 {
        self.shared.num_predictions_served.load(Ordering::Relaxed)
    }

    pub fn num_batches_served(&self) -> u64 {
        self.shared.num_batches_served.load(Ordering::Relaxed)
    }

    /// Tells the evaluator's cache (if any) that its previous entries are
    /// stale, e.g. because the evaluator was just checkpointed with new
    /// weights.
    pub fn advance_cache_generation(&self) {
        if let Some(cache) = self.shared.cache.as_ref() {
            cache.advance_generation();
        }
    }

    /// Returns predictions for every board in `boards`, in order. Blocks
    /// until all of them have been served, batching across whatever other
    /// calls happen to be in flight on other threads at the same time.
    pub fn predict(&self, boards: &[G]) -> Vec<PredictionResult> {
        let mut results = Vec::with_capacity(boards.len());
        let mut offset = 0;

        while offset < boards.len() {
            let board = &boards[offset];

            if let Some(cached) = self.shared.cache.as_ref().and_then(|cache| cache.get(board.fingerprint())) {
                results.push(cached);
                offset += 1;
                continue;
            }

            let remaining = &boards[offset..];
            let (batch, batch_offset, batch_n) = self.reserve_slots(remaining);

            {
                let mut state = batch.state.lock().expect("batch lock poisoned");
                while !state.ready {
                    state = batch.ready_cond.wait(state).expect("batch lock poisoned");
                }
            }

            {
                let state = batch.state.lock().expect("batch lock poisoned");
                for i in 0..batch_n {
                    let result = disperse(&remaining[i], &state, batch_offset + i);
                    if let Some(cache) = self.shared.cache.as_ref() {
                        cache.insert(remaining[i].fingerprint(), result.clone());
                    }
                    results.push(result);
                }
            }

            self.release(&batch);
            offset += batch_n;
        }

        results
    }

    /// Reserves room for as many of `remaining` as will fit in the current
    /// tail batch (creating one if necessary), writes their encodings into
    /// it, and returns the batch together with the reserved slot range.
    fn reserve_slots(&self, remaining: &[G]) -> (Arc<Batch<G>>, usize, usize) {
        loop {
            let mut inner = self.shared.inner.lock().expect("queue lock poisoned");

            if let Some(tail) = inner.batches.back().cloned() {
                let mut state = tail.state.lock().expect("batch lock poisoned");
                if state.size < self.shared.max_batch_size {
                    let offset = state.size;
                    let n = remaining.len().min(self.shared.max_batch_size - offset);

                    for board in &remaining[..n] {
                        let start = state.boards.len() * self.shared.feature_size;
                        let feature_size = self.shared.feature_size;
                        board.encode(&mut state.buffer[start..start + feature_size]);
                        state.boards.push(board.clone());
                    }
                    state.size += n;
                    state.pending_requests += 1;

                    drop(state);
                    drop(inner);
                    self.shared.has_work.notify_all();
                    return (tail, offset, n);
                }
            }

            if inner.batches.len() >= *config::MAX_PENDING_BATCHES {
                inner = self.shared.not_full.wait(inner).expect("queue lock poisoned");
                drop(inner);
                continue;
            }

            let batch = take_or_create(&mut inner, self.shared.max_batch_size, self.shared.feature_size);
            inner.batches.push_back(batch);
        }
    }

    fn release(&self, batch: &Arc<Batch<G>>) {
        let done = {
            let mut state = batch.state.lock().expect("batch lock poisoned");
            state.pending_requests -= 1;
            state.pending_requests == 0
        };

        if done {
            let mut inner = self.shared.inner.lock().expect("queue lock poisoned");
            if inner.freelist.len() < *config::FREELIST_SIZE {
                batch.state.lock().expect("batch lock poisoned").reset();
                inner.freelist.push(batch.clone());
            }
        }
    }
}

impl<G: Game> Drop for PredictionQueue<G> {
    fn drop(&mut self) {
        // only the last handle tears the workers down; cloned handles share
        // the same `Arc<Mutex<Vec<JoinHandle<_>>>>` and no-op here.
        if Arc::strong_count(&self.shared) == 1 {
            self.shared.inner.lock().expect("queue lock poisoned").stopped = true;
            self.shared.has_work.notify_all();

            let mut workers = self.workers.lock().expect("worker list lock poisoned");
            for worker in workers.drain(..) {
                let _ = worker.join();
            }
        }
    }
}

fn take_or_create<G: Game>(inner: &mut Inner<G>, capacity: usize, feature_size: usize) -> Arc<Batch<G>> {
    if let Some(batch) = inner.freelist.pop() {
        batch
    } else {
        Arc::new(Batch::new(capacity, feature_size))
    }
}

/// Renormalizes a raw dense policy down to the legal moves of `board`,
/// falling back to a uniform distribution when the evaluator placed almost
/// no mass on any legal move -- ported verbatim from `GetPredictions`'s
/// dispersal loop in `prediction_queue.cpp`, quirky `total += 1.0` and all.
fn disperse<G: Game>(board: &G, state: &BatchState<G>, slot: usize) -> PredictionResult {
    let raw = &state.predictions[slot];
    let legal_moves = board.legal_moves();

    let mut policy: Vec<f32> = legal_moves.iter().map(|&mv| raw.policy[board.move_index(mv) as usize]).collect();
    let mut total: f32 = policy.iter().sum();

    if total < 0.1 {
        total += 1.0;
        let uniform = 1.0 / policy.len() as f32;
        for p in policy.iter_mut() {
            *p = uniform;
        }
    }
    for p in policy.iter_mut() {
        *p /= total;
    }

    PredictionResult { policy, value: raw.value }
}

fn worker_loop<G: Game>(shared: Arc<Shared<G>>) {
    loop {
        let is_first_available;
        let batch = {
            let mut inner = shared.inner.lock().expect("queue lock poisoned");
            loop {
                if inner.stopped {
                    return;
                }

                let can_take = if inner.num_working == 0 {
                    !inner.batches.is_empty()
                } else {
                    inner
                        .batches
                        .front()
                        .map(|front| front.state.lock().expect("batch lock poisoned").size == shared.max_batch_size)
                        .unwrap_or(false)
                };

                if can_take {
                    break;
                }
                inner = shared.has_work.wait(inner).expect("queue lock poisoned");
            }

            is_first_available = inner.num_working == 0;
            inner.num_working += 1;
            inner.batches.pop_front().expect("predicate guarantees a front batch")
        };
        let _ = is_first_available;
        shared.not_full.notify_all();

        let (input, batch_size) = {
            let state = batch.state.lock().expect("batch lock poisoned");
            (state.buffer[..state.size * shared.feature_size].to_vec(), state.size)
        };

        let predictions = shared.evaluator.predict(&input, batch_size);

        {
            let mut state = batch.state.lock().expect("batch lock poisoned");
            state.predictions = predictions;
            state.ready = true;
        }
        batch.ready_cond.notify_all();

        shared.inner.lock().expect("queue lock poisoned").num_working -= 1;
        shared.num_batches_served.fetch_add(1, Ordering::Relaxed);
        shared.num_predictions_served.fetch_add(batch_size as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_eval::RandomEvaluator;
    use dg_game::connect_four::Board as ConnectFourBoard;

    #[test]
    fn predictions_cover_every_submitted_board() {
        let evaluator = Arc::new(RandomEvaluator::new(
            ConnectFourBoard::FEATURE_SIZE,
            ConnectFourBoard::NUM_MOVE_INDICES,
        ));
        let queue = PredictionQueue::<ConnectFourBoard>::new(evaluator, false);

        let boards: Vec<_> = (0..5)
            .scan(ConnectFourBoard::initial(), |board, _| {
                let current = board.clone();
                let mv = board.legal_moves()[0];
                *board = board.apply(mv);
                Some(current)
            })
            .collect();

        let results = queue.predict(&boards);
        assert_eq!(results.len(), boards.len());
        for (board, result) in boards.iter().zip(results.iter()) {
            assert_eq!(result.policy.len(), board.legal_moves().len());
            let sum: f32 = result.policy.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn a_single_oversized_call_spans_multiple_batches() {
        let evaluator = Arc::new(RandomEvaluator::new(
            ConnectFourBoard::FEATURE_SIZE,
            ConnectFourBoard::NUM_MOVE_INDICES,
        ));
        let queue = PredictionQueue::<ConnectFourBoard>::new(evaluator, false);

        let boards = vec![ConnectFourBoard::initial(); *config::BATCH_SIZE * 3 + 1];
        let results = queue.predict(&boards);

        assert_eq!(results.len(), boards.len());
        assert!(queue.num_batches_served() >= 3);
    }

    #[test]
    fn repeated_positions_are_served_from_cache() {
        let evaluator = Arc::new(RandomEvaluator::new(
            ConnectFourBoard::FEATURE_SIZE,
            ConnectFourBoard::NUM_MOVE_INDICES,
        ));
        let queue = PredictionQueue::<ConnectFourBoard>::new(evaluator, true);

        let boards = vec![ConnectFourBoard::initial(); 4];
        queue.predict(&boards);
        let served_after_first = queue.num_predictions_served();
        queue.predict(&boards);

        assert_eq!(queue.num_predictions_served(), served_after_first);
    }
}
