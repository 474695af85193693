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

//! The player loop (C5): runs a fixed number of MCTS iterations in
//! minibatches against a shared prediction queue, then picks a move from
//! the resulting visit distribution. Ported from
//! `original_source/c4cc/mcts_player.cpp`'s `RunIterations`/`GetMove`.

use ordered_float::OrderedFloat;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use dg_game::Game;
use dg_utils::config;

use crate::queue::PredictionQueue;
use crate::tree::{Mcts, PredictionRequest};

pub struct Player<G: Game> {
    queue: PredictionQueue<G>,
    rng: SmallRng,
    hard: bool,
}

impl<G: Game> Player<G> {
    pub fn new(queue: PredictionQueue<G>) -> Self {
        Player { queue, rng: SmallRng::from_entropy(), hard: false }
    }

    /// When `hard` is set, `select_move` always plays the most-visited
    /// move regardless of ply, matching `MCTSPlayer`'s `hard_` flag used
    /// for evaluation matches rather than self-play.
    pub fn with_hard_move_selection(mut self, hard: bool) -> Self {
        self.hard = hard;
        self
    }

    /// Runs `num_rollout` MCTS iterations against `mcts`, collecting
    /// `start_iteration` requests into minibatches of
    /// `dg_utils::config::MINIBATCH_SIZE` and flushing each minibatch
    /// through the prediction queue in one call.
    pub fn run_iterations(&self, mcts: &mut Mcts<G>, num_rollout: usize) {
        let minibatch_size = *config::MINIBATCH_SIZE;
        let mut pending: Vec<PredictionRequest<G>> = Vec::with_capacity(minibatch_size);

        for _ in 0..num_rollout {
            if let Some(request) = mcts.start_iteration() {
                pending.push(request);
            }
            if pending.len() >= minibatch_size {
                self.flush(mcts, &mut pending);
            }
        }
        if !pending.is_empty() {
            self.flush(mcts, &mut pending);
        }
    }

    fn flush(&self, mcts: &mut Mcts<G>, pending: &mut Vec<PredictionRequest<G>>) {
        let boards: Vec<G> = pending.iter().map(|request| request.board().clone()).collect();
        let predictions = self.queue.predict(&boards);

        for (request, prediction) in pending.drain(..).zip(predictions.into_iter()) {
            mcts.finish_iteration(request, &prediction);
        }
    }

    /// Picks a move from the root's visit distribution. Below
    /// `TEMPERATURE_PLIES`, always samples proportionally to visit count
    /// (encouraging opening diversity); above it, plays the most-visited
    /// move the large majority of the time but still occasionally samples,
    /// exactly as `GetMove`'s `ply > 11 && r > 0.05` branch does.
    pub fn select_move(&mut self, mcts: &Mcts<G>, ply: usize) -> G::Move {
        let board = mcts.current_board().clone();
        let legal_moves = board.legal_moves();
        let prediction = mcts.get_prediction();

        let use_argmax = self.hard || (ply > *config::TEMPERATURE_PLIES && self.rng.gen::<f32>() > 0.05);

        let index = if use_argmax {
            (0..legal_moves.len())
                .max_by_key(|&i| OrderedFloat(prediction.policy[i]))
                .expect("legal_moves is non-empty at a non-terminal position")
        } else {
            weighted_sample(&mut self.rng, &prediction.policy)
        };

        legal_moves[index]
    }
}

fn weighted_sample(rng: &mut SmallRng, policy: &[f32]) -> usize {
    let total: f32 = policy.iter().sum();
    let mut r = rng.gen::<f32>() * total;

    for (i, &p) in policy.iter().enumerate() {
        if r < p {
            return i;
        }
        r -= p;
    }
    policy.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use dg_eval::RandomEvaluator;
    use dg_game::connect_four::Board;

    fn new_queue() -> PredictionQueue<Board> {
        let evaluator = Arc::new(RandomEvaluator::new(Board::FEATURE_SIZE, Board::NUM_MOVE_INDICES));
        PredictionQueue::new(evaluator, false)
    }

    #[test]
    fn plays_a_legal_move_from_the_root() {
        let queue = new_queue();
        let mut player = Player::new(queue);
        let mut mcts = Mcts::new(Board::initial());

        player.run_iterations(&mut mcts, 16);
        let mv = player.select_move(&mcts, 0);

        assert!(Board::initial().legal_moves().contains(&mv));
    }

    #[test]
    fn hard_selection_always_plays_the_most_visited_move() {
        let queue = new_queue();
        let mut player = Player::new(queue).with_hard_move_selection(true);
        let mut mcts = Mcts::new(Board::initial());

        player.run_iterations(&mut mcts, 32);
        let prediction = mcts.get_prediction();
        let legal_moves = Board::initial().legal_moves();
        let best = (0..legal_moves.len()).max_by_key(|&i| OrderedFloat(prediction.policy[i])).unwrap();

        let mv = player.select_move(&mcts, 0);
        assert_eq!(mv, legal_moves[best]);
    }
}
