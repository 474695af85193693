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

//! End-to-end tests spanning the tree, queue, and trainer together, as
//! opposed to the unit tests each of those modules already carries for
//! itself in isolation.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use dg_eval::RandomEvaluator;
use dg_game::connect_four::Board;
use dg_game::Game;
use dg_mcts::{Mcts, Player, PredictionQueue, Sample, ShufflingTrainer};
use dg_utils::config;

fn new_queue() -> PredictionQueue<Board> {
    let evaluator = Arc::new(RandomEvaluator::new(Board::FEATURE_SIZE, Board::NUM_MOVE_INDICES));
    PredictionQueue::new(evaluator, false)
}

/// Warm-starting a search from a child of an already-searched root must not
/// throw away the work already invested in that subtree: the post-move
/// iteration count includes both the visits the child already accumulated
/// as part of the parent search and the fresh rollout budget spent on it.
#[test]
fn warm_starting_a_child_search_reuses_its_prior_visits() {
    let queue = new_queue();
    let player = Player::new(queue);
    let mut mcts = Mcts::new(Board::initial());

    player.run_iterations(&mut mcts, 400);

    let prediction = mcts.get_prediction();
    let legal_moves = Board::initial().legal_moves();
    let best = (0..legal_moves.len())
        .max_by(|&a, &b| prediction.policy[a].partial_cmp(&prediction.policy[b]).unwrap())
        .unwrap();
    let mv = legal_moves[best];

    mcts.make_move(mv);
    let reused = mcts.num_iterations();
    assert!(reused > 0, "the chosen child should already carry visits from the parent search");

    player.run_iterations(&mut mcts, 400);
    assert!(mcts.num_iterations() >= reused + 400);
}

/// Many threads hammering the same queue concurrently must each still get
/// back a well-formed prediction for exactly the boards they submitted.
#[test]
fn queue_round_trip_holds_under_concurrent_submitters() {
    let queue = new_queue();
    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));

    thread::scope(|scope| {
        for t in 0..num_threads {
            let queue = queue.clone();
            let barrier = barrier.clone();

            scope.spawn(move || {
                let boards: Vec<_> = (0..(t + 1))
                    .scan(Board::initial(), |board, _| {
                        let current = board.clone();
                        let mv = board.legal_moves()[0];
                        *board = board.apply(mv);
                        Some(current)
                    })
                    .collect();

                barrier.wait();
                let results = queue.predict(&boards);

                assert_eq!(results.len(), boards.len());
                for (board, result) in boards.iter().zip(results.iter()) {
                    assert_eq!(result.policy.len(), board.legal_moves().len());
                    let sum: f32 = result.policy.iter().sum();
                    assert!((sum - 1.0).abs() < 1e-5);
                    assert_eq!(result.value, 0.0, "RandomEvaluator always predicts a value of zero");
                }
            });
        }
    });
}

/// The trainer must not start training until the shuffle buffer has
/// actually filled to `SHUFFLE_SIZE`, and must have started by the time it
/// holds that many samples.
#[test]
fn trainer_withholds_training_until_the_buffer_is_full() {
    let evaluator = Arc::new(RandomEvaluator::new(Board::FEATURE_SIZE, Board::NUM_MOVE_INDICES));
    let trainer = ShufflingTrainer::new(evaluator);

    let below_threshold = *config::SHUFFLE_SIZE - 1;
    let sample = || Sample { board: Board::initial(), policy: vec![1.0 / 7.0; 7], value: 0.0 };

    trainer.push_all((0..below_threshold).map(|_| sample()));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(trainer.num_steps(), 0, "must not train below the shuffle threshold");

    trainer.push_all(std::iter::once(sample()));

    let mut waited = 0;
    while trainer.num_steps() == 0 && waited < 200 {
        thread::sleep(Duration::from_millis(10));
        waited += 1;
    }
    assert!(trainer.num_steps() > 0, "must train once the shuffle threshold is reached");
}
