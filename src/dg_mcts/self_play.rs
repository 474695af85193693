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

//! The self-play driver (C7): runs many games concurrently across a shared
//! prediction queue and shuffling trainer, checkpointing the evaluator
//! after each finished game -- ported from
//! `original_source/c4cc/self_play_trainer.cpp`'s `Trainer::PlayGame`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use dg_eval::Evaluator;
use dg_game::Game;
use dg_utils::config;

use crate::player::Player;
use crate::queue::PredictionQueue;
use crate::trainer::{Sample, ShufflingTrainer};
use crate::tree::Mcts;

/// Ties a prediction queue, a shuffling trainer, and the evaluator they
/// both share into one self-play session. `NUM_THREADS` worker threads
/// each repeatedly play full games, feeding every finished game's samples
/// into the trainer and checkpointing the evaluator when they're done.
pub struct SelfPlay<G: Game> {
    queue: PredictionQueue<G>,
    trainer: ShufflingTrainer<G>,
    evaluator: Arc<dyn Evaluator>,
    checkpoint_dir: String,
    num_games_played: AtomicU64,
}

impl<G: Game> SelfPlay<G> {
    pub fn new(evaluator: Arc<dyn Evaluator>, checkpoint_dir: impl Into<String>, use_cache: bool) -> Self {
        let queue = PredictionQueue::new(evaluator.clone(), use_cache);
        let trainer = ShufflingTrainer::new(evaluator.clone());

        SelfPlay { queue, trainer, evaluator, checkpoint_dir: checkpoint_dir.into(), num_games_played: AtomicU64::new(0) }
    }

    pub fn num_games_played(&self) -> u64 {
        self.num_games_played.load(Ordering::Relaxed)
    }

    pub fn num_train_steps(&self) -> u64 {
        self.trainer.num_steps()
    }

    /// Runs `NUM_THREADS` self-play workers until `should_stop` returns
    /// true (checked between games, not mid-game). Blocks until every
    /// worker has exited.
    pub fn run(&self, should_stop: impl Fn() -> bool + Sync) {
        thread::scope(|scope| {
            for _ in 0..*config::NUM_THREADS {
                scope.spawn(|| self.worker_loop(&should_stop));
            }
        });
    }

    fn worker_loop(&self, should_stop: &(impl Fn() -> bool + Sync)) {
        let mut player = Player::new(self.queue.clone());

        while !should_stop() {
            let samples = self.play_one_game(&mut player);
            self.trainer.push_all(samples);

            if let Err(error) = self.evaluator.checkpoint(&self.checkpoint_dir) {
                eprintln!("self-play: failed to checkpoint evaluator: {}", error);
            } else {
                self.queue.advance_cache_generation();
            }

            self.num_games_played.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Plays one game to completion, running `NUM_ROLLOUT` MCTS iterations
    /// per move, and returns every position visited labelled with its
    /// visit-count policy and the game's eventual outcome from that
    /// position's own side-to-move perspective.
    fn play_one_game(&self, player: &mut Player<G>) -> Vec<Sample<G>> {
        let mut mcts = Mcts::new(G::initial());
        let mut history: Vec<(G, Vec<f32>, usize)> = Vec::new();
        let mut ply = 0;

        loop {
            let board = mcts.current_board().clone();
            if board.is_terminal() {
                break;
            }

            mcts.add_dirichlet_noise();
            player.run_iterations(&mut mcts, *config::NUM_ROLLOUT);

            let prediction = mcts.get_prediction();
            let legal_moves = board.legal_moves();
            let mut dense_policy = vec![0.0f32; G::NUM_MOVE_INDICES];
            for (i, &mv) in legal_moves.iter().enumerate() {
                dense_policy[board.move_index(mv) as usize] = prediction.policy[i];
            }
            history.push((board, dense_policy, ply));

            let mv = player.select_move(&mcts, ply);
            mcts.make_move(mv);
            ply += 1;
        }

        let terminal_board = mcts.current_board().clone();
        let outcome = terminal_board.result().expect("a board that is_terminal() has a result");
        let terminal_turn = terminal_board.side_to_move();

        // Discard half of early positions to keep the opening from
        // dominating the training set, matching `ShufflingTrainer::Train`'s
        // `ply() < 10` thinning. Done here rather than at the trainer's
        // ingestion point because `Game` has no generic ply accessor; the
        // ply is only available while this game is actually being played.
        let mut rng = SmallRng::from_entropy();

        history
            .into_iter()
            .filter(|&(_, _, ply)| ply >= *config::DISCARD_PLY_THRESHOLD || rng.gen::<f32>() >= *config::DISCARD_PROBABILITY)
            .map(|(board, policy, _)| {
                let value = if board.side_to_move() == terminal_turn {
                    outcome.as_value()
                } else {
                    outcome.opposite().as_value()
                };
                Sample { board, policy, value }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use dg_eval::RandomEvaluator;
    use dg_game::connect_four::Board;

    #[test]
    fn plays_complete_games_and_feeds_the_trainer() {
        let evaluator = Arc::new(RandomEvaluator::new(Board::FEATURE_SIZE, Board::NUM_MOVE_INDICES));
        let self_play = SelfPlay::<Board>::new(evaluator, "/tmp/dg-self-play-test", false);
        let mut player = Player::new(self_play.queue.clone());

        let samples = self_play.play_one_game(&mut player);

        assert!(!samples.is_empty());
        for sample in &samples {
            let sum: f32 = sample.policy.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
            assert!(sample.value >= -1.0 && sample.value <= 1.0);
        }
    }

    #[test]
    fn stops_promptly_once_should_stop_flips() {
        let evaluator = Arc::new(RandomEvaluator::new(Board::FEATURE_SIZE, Board::NUM_MOVE_INDICES));
        let self_play = SelfPlay::<Board>::new(evaluator, "/tmp/dg-self-play-test-2", false);

        let stopped = AtomicBool::new(false);
        self_play.run(|| stopped.load(Ordering::Relaxed) || {
            stopped.store(true, Ordering::Relaxed);
            false
        });

        assert!(self_play.num_games_played() >= 1);
    }
}
