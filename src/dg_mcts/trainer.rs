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

//! The shuffling trainer (C6), ported from
//! `original_source/generic/shuffling_trainer.{h,cpp}`: a bounded buffer of
//! finished training samples, drained by a background thread that waits
//! for enough samples to accumulate, then trains on a uniform sample with
//! replacement and paces itself against self-play throughput.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use dg_eval::Evaluator;
use dg_game::Game;
use dg_utils::config;

/// One training example: a position, the MCTS visit distribution at that
/// position (dense over `Game::NUM_MOVE_INDICES`, zero outside the legal
/// moves that were available), and the game's eventual outcome from the
/// position's own side-to-move perspective.
#[derive(Clone, Debug)]
pub struct Sample<G: Game> {
    pub board: G,
    pub policy: Vec<f32>,
    pub value: f32,
}

struct Inner<G: Game> {
    data: VecDeque<Sample<G>>,
    stopped: bool,
}

struct Shared<G: Game> {
    evaluator: Arc<dyn Evaluator>,
    feature_size: usize,
    num_move_indices: usize,
    inner: Mutex<Inner<G>>,
    has_enough: Condvar,
    num_steps: AtomicU64,
}

pub struct ShufflingTrainer<G: Game> {
    shared: Arc<Shared<G>>,
    worker: Option<JoinHandle<()>>,
}

impl<G: Game> ShufflingTrainer<G> {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        assert_eq!(evaluator.feature_size(), G::FEATURE_SIZE, "evaluator built for a different game");
        assert_eq!(evaluator.num_move_indices(), G::NUM_MOVE_INDICES, "evaluator built for a different game");

        let shared = Arc::new(Shared {
            evaluator,
            feature_size: G::FEATURE_SIZE,
            num_move_indices: G::NUM_MOVE_INDICES,
            inner: Mutex::new(Inner { data: VecDeque::new(), stopped: false }),
            has_enough: Condvar::new(),
            num_steps: AtomicU64::new(0),
        });

        let worker = {
            let shared = shared.clone();
            thread::spawn(move || worker_loop(shared))
        };

        ShufflingTrainer { shared, worker: Some(worker) }
    }

    pub fn num_steps(&self) -> u64 {
        self.shared.num_steps.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.shared.inner.lock().expect("trainer lock poisoned").data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes a finished game's samples into the shuffle buffer, dropping
    /// the oldest entries once `MAX_SHUFFLE_SIZE` is exceeded, matching
    /// `ShufflingTrainer::Train`'s bound enforcement.
    pub fn push_all(&self, samples: impl IntoIterator<Item = Sample<G>>) {
        let mut inner = self.shared.inner.lock().expect("trainer lock poisoned");

        for sample in samples {
            inner.data.push_back(sample);
            if inner.data.len() > *config::MAX_SHUFFLE_SIZE {
                inner.data.pop_front();
            }
        }

        if inner.data.len() >= *config::SHUFFLE_SIZE {
            self.shared.has_enough.notify_all();
        }
    }
}

impl<G: Game> Drop for ShufflingTrainer<G> {
    fn drop(&mut self) {
        self.shared.inner.lock().expect("trainer lock poisoned").stopped = true;
        self.shared.has_enough.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop<G: Game>(shared: Arc<Shared<G>>) {
    let mut rng = SmallRng::from_entropy();

    loop {
        {
            let mut inner = shared.inner.lock().expect("trainer lock poisoned");
            while !inner.stopped && inner.data.len() < *config::SHUFFLE_SIZE {
                inner = shared.has_enough.wait(inner).expect("trainer lock poisoned");
            }
            if inner.stopped {
                return;
            }
        }

        let batch_size = *config::TRAIN_BATCH_SIZE;
        let mut boards = vec![0.0f32; batch_size * shared.feature_size];
        let mut policies = vec![0.0f32; batch_size * shared.num_move_indices];
        let mut values = vec![0.0f32; batch_size];

        {
            let inner = shared.inner.lock().expect("trainer lock poisoned");
            for i in 0..batch_size {
                let sample = &inner.data[rng.gen_range(0..inner.data.len())];
                sample.board.encode(&mut boards[i * shared.feature_size..(i + 1) * shared.feature_size]);
                policies[i * shared.num_move_indices..(i + 1) * shared.num_move_indices].copy_from_slice(&sample.policy);
                values[i] = sample.value;
            }
        }

        shared.evaluator.train_step(&boards, &policies, &values, batch_size);
        shared.num_steps.fetch_add(1, Ordering::Relaxed);

        thread::sleep(Duration::from_millis(*config::TRAIN_PACE_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_eval::RandomEvaluator;
    use dg_game::connect_four::Board;

    fn sample(value: f32) -> Sample<Board> {
        Sample { board: Board::initial(), policy: vec![1.0 / 7.0; Board::NUM_MOVE_INDICES], value }
    }

    #[test]
    fn trains_once_enough_samples_have_accumulated() {
        let evaluator = Arc::new(RandomEvaluator::new(Board::FEATURE_SIZE, Board::NUM_MOVE_INDICES));
        let trainer = ShufflingTrainer::new(evaluator);

        let needed = *config::SHUFFLE_SIZE;
        trainer.push_all((0..needed).map(|_| sample(0.0)));

        let mut waited = 0;
        while trainer.num_steps() == 0 && waited < 200 {
            thread::sleep(Duration::from_millis(10));
            waited += 1;
        }

        assert!(trainer.num_steps() > 0);
    }

    #[test]
    fn drops_oldest_samples_past_the_shuffle_bound() {
        let evaluator = Arc::new(RandomEvaluator::new(Board::FEATURE_SIZE, Board::NUM_MOVE_INDICES));
        let trainer = ShufflingTrainer::new(evaluator);

        trainer.push_all((0..(*config::MAX_SHUFFLE_SIZE + 10)).map(|_| sample(0.0)));
        assert_eq!(trainer.len(), *config::MAX_SHUFFLE_SIZE);
    }
}
