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

//! The search and training half of the engine: the MCTS tree (C3), the
//! batched prediction queue (C4), the player loop (C5), the shuffling
//! trainer (C6), and the self-play driver (C7) that ties them together.

mod cache;
mod player;
mod queue;
mod self_play;
mod trainer;
mod tree;

pub use self::player::Player;
pub use self::queue::PredictionQueue;
pub use self::self_play::SelfPlay;
pub use self::trainer::{Sample, ShufflingTrainer};
pub use self::tree::{Mcts, PredictionRequest, PredictionResult};
