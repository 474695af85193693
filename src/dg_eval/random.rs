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

//! A reference `Evaluator` with no neural network at all: uniform policy,
//! zero value, and no-op training/checkpointing. Exists so `dg_mcts` and
//! `dg_tests` can exercise the search, queue, and trainer against a real
//! `Evaluator` implementation without depending on a trained model.

use std::sync::atomic::{AtomicU64, Ordering};

use dg_utils::Error;

use crate::evaluator::{Evaluator, Prediction};

pub struct RandomEvaluator {
    feature_size: usize,
    num_move_indices: usize,
    num_predictions: AtomicU64,
}

impl RandomEvaluator {
    pub fn new(feature_size: usize, num_move_indices: usize) -> Self {
        RandomEvaluator { feature_size, num_move_indices, num_predictions: AtomicU64::new(0) }
    }

    pub fn num_predictions(&self) -> u64 {
        self.num_predictions.load(Ordering::Relaxed)
    }
}

impl Evaluator for RandomEvaluator {
    fn feature_size(&self) -> usize {
        self.feature_size
    }

    fn num_move_indices(&self) -> usize {
        self.num_move_indices
    }

    fn predict(&self, boards: &[f32], batch_size: usize) -> Vec<Prediction> {
        debug_assert_eq!(boards.len(), batch_size * self.feature_size);
        self.num_predictions.fetch_add(batch_size as u64, Ordering::Relaxed);

        let uniform = 1.0 / self.num_move_indices as f32;
        (0..batch_size).map(|_| Prediction::new(vec![uniform; self.num_move_indices], 0.0)).collect()
    }

    fn train_step(&self, _boards: &[f32], _policy_targets: &[f32], _value_targets: &[f32], _batch_size: usize) {
        // No weights to update.
    }

    fn checkpoint(&self, _dir: &str) -> Result<(), Error> {
        Ok(())
    }

    fn restore(&self, _dir: &str) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictions_sum_to_one() {
        let evaluator = RandomEvaluator::new(8, 4);
        let boards = vec![0.0f32; 8];
        let predictions = evaluator.predict(&boards, 1);
        assert_eq!(predictions.len(), 1);
        let sum: f32 = predictions[0].policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tracks_total_predictions_served() {
        let evaluator = RandomEvaluator::new(8, 4);
        let boards = vec![0.0f32; 8 * 3];
        evaluator.predict(&boards, 3);
        assert_eq!(evaluator.num_predictions(), 3);
    }
}
