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

//! The neural evaluator boundary. `Evaluator` is deliberately opaque: the
//! network architecture, training graph, and hardware backend are all
//! outside this crate's concern, same as `dg_nn`/`dg_cuda` sit behind the
//! teacher's `Predictor` trait (`libdg_mcts/lib.rs`'s `full_forward`,
//! `libdg_mcts/pool/pool.rs`'s `Box<dyn Predictor + Sync>`).

mod evaluator;
mod model_collection;
mod random;

pub use self::evaluator::{Evaluator, Prediction};
pub use self::model_collection::ModelCollection;
pub use self::random::RandomEvaluator;
