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

//! The `Evaluator` trait, grounded in `original_source/generic/model.h`'s
//! `Model` (`Predict`, `RunTrainStep`, `Checkpoint`) and the teacher's
//! `Predictor` trait (`.predict(&requests, batch_size) -> Vec<Response>`).

use dg_utils::Error;

/// One leaf position's forward-pass output: a move-index-sized policy
/// vector and a scalar value, both as returned from a single batch slot.
#[derive(Clone, Debug)]
pub struct Prediction {
    pub policy: Vec<f32>,
    pub value: f32,
}

impl Prediction {
    pub fn new(policy: Vec<f32>, value: f32) -> Self {
        Prediction { policy, value }
    }
}

/// An opaque collaborator that turns batches of encoded positions into
/// policy/value predictions, and accepts training batches to update its
/// own weights. Implementations may be a real neural network, a
/// hand-written heuristic, or (in tests) a fixed/random response --
/// nothing in `dg_mcts` depends on which.
///
/// Implementations are used behind `Box<dyn Evaluator + Send + Sync>` (as
/// the teacher boxes `Predictor`), since there is exactly one evaluator
/// shared by every search worker and prediction-queue worker thread; the
/// per-node hot loop calls through `dg_mcts`'s own types instead, which
/// remain generic over `Game`.
pub trait Evaluator: Send + Sync {
    /// The number of planes a single encoded position occupies (must
    /// match the `Game::FEATURE_SIZE` of whatever game this evaluator was
    /// built for).
    fn feature_size(&self) -> usize;

    /// The size of the dense policy vector this evaluator emits (must
    /// match `Game::NUM_MOVE_INDICES`).
    fn num_move_indices(&self) -> usize;

    /// Runs a forward pass over `batch_size` positions, each
    /// `feature_size()` floats long, packed consecutively in `boards`.
    /// Returns exactly `batch_size` predictions, in the same order.
    fn predict(&self, boards: &[f32], batch_size: usize) -> Vec<Prediction>;

    /// Runs one gradient step over a training minibatch: `boards` and
    /// `policy_targets` are batch-major flattened tensors, `value_targets`
    /// has one entry per sample.
    fn train_step(&self, boards: &[f32], policy_targets: &[f32], value_targets: &[f32], batch_size: usize);

    /// Writes the evaluator's current weights to `dir` (created if
    /// missing), matching `Model::Checkpoint`.
    fn checkpoint(&self, dir: &str) -> Result<(), Error>;

    /// Loads weights from `dir`, matching `Model::Restore` /
    /// `generic::Model::Open`. Implementations that need to mutate shared
    /// state do so behind their own internal locking, the same way the
    /// teacher's `Model` guards its TensorFlow session with `mu_`.
    fn restore(&self, dir: &str) -> Result<(), Error>;
}
