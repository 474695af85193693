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

//! The driver binary. Recognizes three invocation modes -- `play`,
//! `self-play-train`, and `evaluate` -- dispatched over whichever game was
//! named on the command-line. There is no real argument parser here, the
//! same as the teacher's `main.rs` reads its own mode straight off `env::args()`;
//! a full CLI surface (flags, help text, human-vs-engine play) is out of
//! scope, this just has to recognize the three modes.

use std::env;
use std::process;
use std::sync::Arc;

use dg_eval::{ModelCollection, RandomEvaluator};
use dg_game::{chess, connect_four, Game, Outcome};
use dg_mcts::{Mcts, Player, PredictionQueue, SelfPlay};
use dg_utils::config;

fn main() {
    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(String::as_str);
    let game = args.get(2).map(String::as_str).unwrap_or("connect-four");

    match mode {
        Some("play") => dispatch(game, play_one_game::<connect_four::Board>, play_one_game::<chess::Board>),
        Some("self-play-train") => dispatch(game, self_play_train::<connect_four::Board>, self_play_train::<chess::Board>),
        Some("evaluate") => dispatch(game, evaluate::<connect_four::Board>, evaluate::<chess::Board>),
        _ => {
            eprintln!("usage: dream_go <play|self-play-train|evaluate> [connect-four|chess]");
            process::exit(1);
        },
    }
}

fn dispatch(game: &str, connect_four: fn(), chess: fn()) {
    match game {
        "chess" => chess(),
        "connect-four" => connect_four(),
        other => {
            eprintln!("unknown game `{}`, expected `connect-four` or `chess`", other);
            process::exit(1);
        },
    }
}

/// `play`: one engine-vs-engine game at a fixed rollout budget per move,
/// printed move by move. Human input is out of scope.
fn play_one_game<G: Game>() {
    let evaluator = Arc::new(RandomEvaluator::new(G::FEATURE_SIZE, G::NUM_MOVE_INDICES));
    let queue = PredictionQueue::<G>::new(evaluator, false);
    let mut player = Player::new(queue).with_hard_move_selection(true);
    let mut mcts = Mcts::new(G::initial());
    let mut ply = 0;

    loop {
        let board = mcts.current_board().clone();
        if board.is_terminal() {
            match board.result() {
                Some(Outcome::Draw) | None => println!("game over after {} plies: draw", ply),
                Some(outcome) => println!("game over after {} plies: {} for the side to move", ply, outcome),
            }
            break;
        }

        player.run_iterations(&mut mcts, *config::NUM_ROLLOUT);
        let mv = player.select_move(&mcts, ply);
        mcts.make_move(mv);
        ply += 1;
    }
}

/// `self-play-train`: the endless self-play-and-train loop, logging
/// periodic throughput. Runs until the process is killed.
fn self_play_train<G: Game>() {
    let collection = ModelCollection::new("checkpoints");
    let evaluator = Arc::new(RandomEvaluator::new(G::FEATURE_SIZE, G::NUM_MOVE_INDICES));

    match collection.require_current_checkpoint_dir() {
        Ok(dir) => match evaluator.restore(&dir.display().to_string()) {
            Ok(()) => println!("self-play: resumed from {}", dir.display()),
            Err(error) => eprintln!("self-play: failed to restore {}: {}", dir.display(), error),
        },
        Err(error) => println!("self-play: {}, starting from scratch", error),
    }

    let checkpoint_dir = collection.current_checkpoint_dir().display().to_string();
    let self_play = SelfPlay::<G>::new(evaluator, checkpoint_dir, true);

    self_play.run(|| {
        let games = self_play.num_games_played();
        if games > 0 && games % 10 == 0 {
            println!("self-play: {} games played, {} train steps", games, self_play.num_train_steps());
        }
        false
    });
}

/// `evaluate`: plays a fixed number of games between two independently
/// initialized evaluators, alternating who moves first, and reports the
/// challenger's win rate. Promotion is a policy decision layered on top of
/// this number and is out of scope here -- this only measures it.
fn evaluate<G: Game>() {
    let challenger_eval = Arc::new(RandomEvaluator::new(G::FEATURE_SIZE, G::NUM_MOVE_INDICES));
    let incumbent_eval = Arc::new(RandomEvaluator::new(G::FEATURE_SIZE, G::NUM_MOVE_INDICES));

    let collection = ModelCollection::new("checkpoints");
    match collection.require_current_checkpoint_dir() {
        Ok(dir) => match incumbent_eval.restore(&dir.display().to_string()) {
            Ok(()) => println!("evaluate: incumbent restored from {}", dir.display()),
            Err(error) => eprintln!("evaluate: failed to restore incumbent from {}: {}", dir.display(), error),
        },
        Err(error) => println!("evaluate: {}, incumbent starts from scratch", error),
    }

    let challenger_queue = PredictionQueue::<G>::new(challenger_eval, false);
    let incumbent_queue = PredictionQueue::<G>::new(incumbent_eval, false);

    let num_games = *config::NUM_GAMES;
    let mut challenger_wins = 0u32;
    let mut incumbent_wins = 0u32;
    let mut draws = 0u32;

    for game_index in 0..num_games {
        let challenger_plays_first = game_index % 2 == 0;
        let mut first = Player::new(if challenger_plays_first { challenger_queue.clone() } else { incumbent_queue.clone() })
            .with_hard_move_selection(true);
        let mut second = Player::new(if challenger_plays_first { incumbent_queue.clone() } else { challenger_queue.clone() })
            .with_hard_move_selection(true);

        let mut mcts = Mcts::new(G::initial());
        let mut ply = 0;

        loop {
            let board = mcts.current_board().clone();
            if board.is_terminal() {
                break;
            }

            let player = if ply % 2 == 0 { &mut first } else { &mut second };
            player.run_iterations(&mut mcts, *config::NUM_ROLLOUT);
            let mv = player.select_move(&mcts, ply);
            mcts.make_move(mv);
            ply += 1;
        }

        // the side to move at a terminal position can only have lost or
        // drawn -- whoever just moved into that terminal position is the
        // one who might have won, never the side still "to move".
        match mcts.current_board().result() {
            Some(Outcome::Draw) | None => draws += 1,
            Some(Outcome::Loss) => {
                let loser_played_first = ply % 2 == 0;
                let challenger_lost = loser_played_first == challenger_plays_first;
                if challenger_lost {
                    incumbent_wins += 1;
                } else {
                    challenger_wins += 1;
                }
            },
            Some(Outcome::Win) => unreachable!("result() never reports a win for the side to move"),
        }
    }

    let win_rate = challenger_wins as f64 / num_games as f64;
    println!(
        "evaluate: challenger {} - {} incumbent, {} draws (challenger win rate {:.3})",
        challenger_wins, incumbent_wins, draws, win_rate
    );
}
