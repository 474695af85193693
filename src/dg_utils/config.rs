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

//! Global knobs, read once from the environment and cached for the lifetime
//! of the process. Mirrors the teacher's `dg_utils::config`.

use std::env;
use std::str::FromStr;

fn read<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

lazy_static! {
    /// Number of leaf evaluations accumulated into a single evaluator call.
    pub static ref BATCH_SIZE: usize = read("DG_BATCH_SIZE", 64);

    /// Number of concurrent self-play games.
    pub static ref NUM_GAMES: usize = read("DG_NUM_GAMES", 16);

    /// Number of MCTS worker threads serving a single search.
    pub static ref NUM_THREADS: usize = read("DG_NUM_THREADS", 4);

    /// PUCT exploration constant `c`.
    pub static ref PUCT_C: f32 = read("DG_PUCT_C", 1.0);

    /// Move-selection temperature below the exploration ply threshold.
    pub static ref TEMPERATURE: f32 = read("DG_TEMPERATURE", 1.0);

    /// Ply at which move selection switches from sampling to argmax.
    pub static ref TEMPERATURE_PLIES: usize = read("DG_TEMPERATURE_PLIES", 12);

    /// Number of MCTS iterations to run per move.
    pub static ref NUM_ROLLOUT: usize = read("DG_NUM_ROLLOUT", 800);

    /// Number of `start_iteration` calls collected before a prediction batch
    /// is dispatched to the queue.
    pub static ref MINIBATCH_SIZE: usize = read("DG_MINIBATCH_SIZE", 8);

    /// Maximum number of work batches the prediction queue allows in flight.
    pub static ref MAX_PENDING_BATCHES: usize = read("DG_MAX_PENDING_BATCHES", 2);

    /// Maximum number of idle work batches kept on the freelist.
    pub static ref FREELIST_SIZE: usize = read("DG_FREELIST_SIZE", 2);

    /// Number of prediction-queue worker threads.
    pub static ref NUM_PREDICT_WORKERS: usize = read("DG_NUM_PREDICT_WORKERS", 2);

    /// Shuffle buffer size the trainer waits for before it starts training.
    pub static ref SHUFFLE_SIZE: usize = read("DG_SHUFFLE_SIZE", 10_000);

    /// Number of samples the trainer draws from the shuffle buffer per step.
    pub static ref TRAIN_BATCH_SIZE: usize = read("DG_TRAIN_BATCH_SIZE", 256);

    /// Upper bound on the shuffle buffer; oldest samples are dropped beyond this.
    pub static ref MAX_SHUFFLE_SIZE: usize = read("DG_MAX_SHUFFLE_SIZE", 400 * 60 * 4 * 2);

    /// Milliseconds to sleep after each training step, to pace training
    /// against self-play throughput.
    pub static ref TRAIN_PACE_MS: u64 = read("DG_TRAIN_PACE_MS", 50);

    /// Dirichlet noise concentration added to the root prior.
    pub static ref DIRICHLET_ALPHA: f32 = read("DG_DIRICHLET_ALPHA", 0.3);

    /// Fraction of the root prior replaced by dirichlet noise.
    pub static ref DIRICHLET_WEIGHT: f32 = read("DG_DIRICHLET_WEIGHT", 0.25);

    /// Ply below which training samples are randomly thinned out, to
    /// reduce the opening's disproportionate weight in the training set.
    pub static ref DISCARD_PLY_THRESHOLD: usize = read("DG_DISCARD_PLY_THRESHOLD", 10);

    /// Probability of discarding a sample below `DISCARD_PLY_THRESHOLD`.
    pub static ref DISCARD_PROBABILITY: f32 = read("DG_DISCARD_PROBABILITY", 0.5);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_sane_defaults() {
        assert!(*BATCH_SIZE > 0);
        assert!(*NUM_ROLLOUT > 0);
        assert!(*MAX_PENDING_BATCHES > 0);
        assert!(*SHUFFLE_SIZE >= *TRAIN_BATCH_SIZE);
    }
}
