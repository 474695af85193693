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

//! PUCT tree search, ported from `original_source/generic/mcts.cpp`'s
//! `MCTS` class: a tree owned exclusively by a single player thread, split
//! into `start_iteration`/`finish_iteration` so leaf evaluations can be
//! batched by a prediction queue instead of computed inline.

use dg_game::{Game, Side};
use dg_utils::config;
use ordered_float::OrderedFloat;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Dirichlet, Distribution};

/// The damping factor applied to non-terminal value backups. Fixed at
/// `1.0` (no damping) in the source; kept as a named constant rather than
/// inlined, per the open question it resolves.
const UNCERTAINTY: f32 = 1.0;

/// A small uniform jitter added to PUCT scores so ties between actions
/// that have never been visited are broken randomly instead of by
/// array order.
const TIE_BREAK_NOISE: f64 = 0.001;

/// One child edge of a `State`: the move, its prior, and the running
/// totals `start_iteration`/`finish_iteration` maintain.
struct Action<G: Game> {
    mv: G::Move,
    prior: f32,
    num_virtual: i32,
    num_taken: u32,
    total_value: f64,
    child: Option<Box<State<G>>>,
}

impl<G: Game> Action<G> {
    fn new(mv: G::Move, prior: f32) -> Self {
        Action { mv, prior, num_virtual: 0, num_taken: 0, total_value: 0.0, child: None }
    }

    fn add_result(&mut self, v: f64) {
        self.num_taken += 1;
        self.total_value += v;
    }
}

/// A node in the tree: a board and one `Action` per legal move. Terminal
/// nodes carry no actions.
struct State<G: Game> {
    board: G,
    is_terminal: bool,
    actions: Vec<Action<G>>,
}

impl<G: Game> State<G> {
    /// A fresh root (or re-rooted position never visited before): every
    /// legal move gets an equal prior, so the search explores all of them
    /// at least once even before any prediction is available.
    fn uniform(board: G) -> Self {
        if board.is_terminal() {
            return State { board, is_terminal: true, actions: Vec::new() };
        }

        let legal = board.legal_moves();
        let prior = 1.0 / legal.len() as f32;
        let actions = legal.into_iter().map(|mv| Action::new(mv, prior)).collect();

        State { board, is_terminal: false, actions }
    }

    /// A terminal node attached the instant a successor turns out to be
    /// over, so later visits to the same edge do not need to recompute
    /// `apply` to rediscover that fact.
    fn terminal(board: G) -> Self {
        debug_assert!(board.is_terminal());

        State { board, is_terminal: true, actions: Vec::new() }
    }

    /// A freshly expanded leaf, with one action per legal move and its
    /// prior taken from the evaluator's policy (already restricted to the
    /// legal moves, in `board.legal_moves()` order, by the prediction
    /// queue).
    fn from_prediction(board: G, policy: &[f32]) -> Self {
        let legal = board.legal_moves();
        debug_assert_eq!(legal.len(), policy.len());

        let actions = legal.into_iter().zip(policy.iter().copied()).map(|(mv, p)| Action::new(mv, p)).collect();

        State { board, is_terminal: false, actions }
    }
}

/// A leaf evaluation in flight: the board to evaluate, and the path of
/// action indices from the root that led to it. The path is carried by
/// the request (not kept in the tree) so that `finish_iteration` can
/// find and credit the exact edges it incremented, even if other
/// iterations have since been started.
pub struct PredictionRequest<G: Game> {
    board: G,
    path: Vec<usize>,
}

impl<G: Game> PredictionRequest<G> {
    pub fn board(&self) -> &G {
        &self.board
    }
}

/// A policy/value pair over *legal* moves only, in `board.legal_moves()`
/// order -- the result of dispersing a batched evaluator prediction (or
/// the root's current search statistics from `Mcts::get_prediction`).
#[derive(Clone, Debug)]
pub struct PredictionResult {
    pub policy: Vec<f32>,
    pub value: f32,
}

enum LeafOutcome<G: Game> {
    Terminal { board: G, value: f32 },
    NeedsPrediction { board: G },
}

fn pick_action_index<G: Game>(rng: &mut SmallRng, state: &State<G>) -> usize {
    let num_sum: i64 = state.actions.iter().map(|a| a.num_taken as i64 + a.num_virtual as i64).sum();
    let num_sum_sqrt = (num_sum as f64).sqrt();
    let c = *config::PUCT_C as f64;

    (0..state.actions.len())
        .max_by_key(|&i| {
            let a = &state.actions[i];
            let score = if num_sum == 0 {
                a.prior as f64
            } else {
                let num = a.num_taken as i64 + a.num_virtual as i64;
                // virtual losses are counted against the mean, same as a played loss.
                let mean_value = if num == 0 { 0.0 } else { (a.total_value - a.num_virtual as f64) / num as f64 };

                mean_value + c * a.prior as f64 * num_sum_sqrt / (1.0 + num as f64)
            };

            OrderedFloat(score + rng.gen_range(0.0..TIE_BREAK_NOISE))
        })
        .expect("a non-terminal state always has at least one action")
}

fn find_leaf<G: Game>(state: &mut State<G>, rng: &mut SmallRng, path: &mut Vec<usize>) -> LeafOutcome<G> {
    let idx = pick_action_index(rng, state);
    path.push(idx);

    let parent_board = state.board.clone();
    let action = &mut state.actions[idx];

    match action.child.as_mut() {
        Some(child) if child.is_terminal => {
            let value = child.board.result().expect("terminal child must carry a result").as_value();
            LeafOutcome::Terminal { board: child.board.clone(), value }
        },
        Some(child) => find_leaf(child, rng, path),
        None => {
            let successor = parent_board.apply(action.mv);

            if successor.is_terminal() {
                let value = successor.result().expect("terminal successor must carry a result").as_value();
                action.child = Some(Box::new(State::terminal(successor.clone())));

                LeafOutcome::Terminal { board: successor, value }
            } else {
                LeafOutcome::NeedsPrediction { board: successor }
            }
        },
    }
}

fn add_virtual_loss<G: Game>(state: &mut State<G>, path: &[usize]) {
    let action = &mut state.actions[path[0]];
    action.num_virtual += 1;

    if path.len() > 1 {
        add_virtual_loss(action.child.as_mut().expect("a live path must have an attached child"), &path[1..]);
    }
}

fn backprop_terminal<G: Game>(state: &mut State<G>, path: &[usize], terminal_turn: Side, value: f32) {
    let action = &mut state.actions[path[0]];
    let mul = if state.board.side_to_move() == terminal_turn { 1.0 } else { -1.0 };
    action.add_result((mul * value) as f64);

    if path.len() > 1 {
        backprop_terminal(
            action.child.as_mut().expect("a terminal backprop path must have an attached child"),
            &path[1..],
            terminal_turn,
            value,
        );
    }
}

fn finish_at<G: Game>(state: &mut State<G>, path: &[usize], leaf_board: &G, leaf_turn: Side, policy: &[f32], value: f32) {
    let mul = if state.board.side_to_move() == leaf_turn { 1.0 } else { -1.0 };
    let action = &mut state.actions[path[0]];
    action.num_virtual -= 1;
    action.add_result((mul * value) as f64);

    if path.len() > 1 {
        let child = action.child.as_mut().expect("finish_iteration path must have an attached child");
        finish_at(child, &path[1..], leaf_board, leaf_turn, policy, value);
    } else if action.child.is_none() {
        // Only the first of possibly several in-flight requests for this
        // same leaf actually builds the child; later ones just credit it.
        action.child = Some(Box::new(State::from_prediction(leaf_board.clone(), policy)));
    }
}

/// A PUCT search tree rooted at a single board, owned exclusively by one
/// caller -- no internal locking, matching the single-player-thread
/// ownership model the prediction queue and shuffling trainer assume.
pub struct Mcts<G: Game> {
    root: State<G>,
    rng: SmallRng,
}

impl<G: Game> Mcts<G> {
    pub fn new(board: G) -> Self {
        Mcts { root: State::uniform(board), rng: SmallRng::from_entropy() }
    }

    pub fn current_board(&self) -> &G {
        &self.root.board
    }

    /// Replaces the current tree with a fresh, unvisited root at `board`.
    pub fn set_board(&mut self, board: G) {
        self.root = State::uniform(board);
    }

    /// Mixes Dirichlet noise into the root's priors, `DIRICHLET_WEIGHT` part
    /// noise to `1 - DIRICHLET_WEIGHT` part the evaluator's own prior --
    /// the standard self-play exploration device, applied fresh at every
    /// real move so self-play games do not collapse onto the same lines.
    /// Has no effect on a root with a single legal move.
    pub fn add_dirichlet_noise(&mut self) {
        let num_actions = self.root.actions.len();
        if num_actions < 2 {
            return;
        }

        let alpha = *config::DIRICHLET_ALPHA as f64;
        let weight = *config::DIRICHLET_WEIGHT;
        let dirichlet = Dirichlet::new_with_size(alpha, num_actions).expect("DIRICHLET_ALPHA must be positive");
        let noise = dirichlet.sample(&mut self.rng);

        for (action, &eta) in self.root.actions.iter_mut().zip(noise.iter()) {
            action.prior = (1.0 - weight) * action.prior + weight * eta as f32;
        }
    }

    /// The number of iterations completed at the root so far.
    pub fn num_iterations(&self) -> u32 {
        self.root.actions.iter().map(|a| a.num_taken).sum()
    }

    /// Finds a new leaf to evaluate. Returns `None` if the path led to an
    /// (already-known or newly-discovered) terminal node -- in that case
    /// the value has already been backed up and no further call is
    /// needed for this iteration.
    pub fn start_iteration(&mut self) -> Option<PredictionRequest<G>> {
        assert!(!self.root.is_terminal, "start_iteration called on a terminal root");

        let mut path = Vec::new();

        match find_leaf(&mut self.root, &mut self.rng, &mut path) {
            LeafOutcome::Terminal { board, value } => {
                backprop_terminal(&mut self.root, &path, board.side_to_move(), value);
                None
            },
            LeafOutcome::NeedsPrediction { board } => {
                add_virtual_loss(&mut self.root, &path);
                Some(PredictionRequest { board, path })
            },
        }
    }

    /// Completes an iteration previously started with `start_iteration`,
    /// attaching the new leaf (if no other in-flight request beat it to
    /// the punch) and crediting every edge on the path.
    pub fn finish_iteration(&mut self, request: PredictionRequest<G>, prediction: &PredictionResult) {
        let PredictionRequest { board, path } = request;
        let leaf_turn = board.side_to_move();
        let value = prediction.value * UNCERTAINTY;

        finish_at(&mut self.root, &path, &board, leaf_turn, &prediction.policy, value);
    }

    /// The root's current search statistics: the empirical visit
    /// distribution as the policy, and the visit-weighted mean value.
    /// Must not be called while any iteration is outstanding.
    pub fn get_prediction(&self) -> PredictionResult {
        debug_assert!(self.root.actions.iter().all(|a| a.num_virtual == 0), "get_prediction called with iterations outstanding");

        let sum_n: u32 = self.root.actions.iter().map(|a| a.num_taken).sum();
        assert!(sum_n > 0, "get_prediction called before any iteration completed");

        let inv_sum = 1.0 / sum_n as f32;
        let policy = self.root.actions.iter().map(|a| a.num_taken as f32 * inv_sum).collect();
        let value = self.root.actions.iter().map(|a| a.total_value as f32 * inv_sum).sum();

        PredictionResult { policy, value }
    }

    /// Advances the root to the child reached by playing `mv`, reusing
    /// its subtree if one was already grown; otherwise starts a fresh
    /// root. Siblings of the chosen action are dropped.
    pub fn make_move(&mut self, mv: G::Move) {
        let idx = self.root.actions.iter().position(|a| a.mv == mv).expect("mv must be legal in the current position");
        let action = &mut self.root.actions[idx];

        self.root = match action.child.take() {
            Some(child) => *child,
            None => State::uniform(self.root.board.apply(mv)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_game::connect_four::Board;

    fn uniform_prediction(board: &Board) -> PredictionResult {
        let legal = board.legal_moves();
        let policy = vec![1.0 / legal.len() as f32; legal.len()];
        PredictionResult { policy, value: 0.0 }
    }

    fn run_iterations(mcts: &mut Mcts<Board>, n: usize) {
        for _ in 0..n {
            if let Some(request) = mcts.start_iteration() {
                let prediction = uniform_prediction(request.board());
                mcts.finish_iteration(request, &prediction);
            }
        }
    }

    #[test]
    fn visit_counts_sum_to_iteration_count() {
        let mut mcts = Mcts::new(Board::initial());
        run_iterations(&mut mcts, 200);

        assert_eq!(mcts.num_iterations(), 200);
        assert!(mcts.root.actions.iter().all(|a| a.num_virtual == 0));
    }

    #[test]
    fn dirichlet_noise_perturbs_priors_but_keeps_them_normalized() {
        let mut mcts = Mcts::new(Board::initial());
        let before: Vec<f32> = mcts.root.actions.iter().map(|a| a.prior).collect();

        mcts.add_dirichlet_noise();

        let after: Vec<f32> = mcts.root.actions.iter().map(|a| a.prior).collect();
        assert_ne!(before, after);

        let total: f32 = after.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn rerooting_preserves_the_chosen_subtree() {
        let mut mcts = Mcts::new(Board::initial());
        run_iterations(&mut mcts, 100);

        let mv = mcts.root.actions[0].mv;
        let visits_before = mcts.root.actions[0].num_taken;

        mcts.make_move(mv);

        let reused_visits: u32 = mcts.root.actions.iter().map(|a| a.num_taken).sum();
        assert_eq!(reused_visits, visits_before);
    }

    #[test]
    fn no_virtual_loss_left_after_interleaved_iterations() {
        let mut mcts = Mcts::new(Board::initial());
        let mut pending = Vec::new();

        for _ in 0..20 {
            if let Some(request) = mcts.start_iteration() {
                pending.push(request);
            }
        }
        for request in pending {
            let prediction = uniform_prediction(request.board());
            mcts.finish_iteration(request, &prediction);
        }

        assert!(mcts.root.actions.iter().all(|a| a.num_virtual == 0));
    }

    #[test]
    fn mate_in_one_concentrates_visits_on_the_winning_move() {
        use dg_game::chess;

        let board = chess::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mut mcts = Mcts::new(board);

        for _ in 0..400 {
            if let Some(request) = mcts.start_iteration() {
                let legal = request.board().legal_moves();
                let policy = vec![1.0 / legal.len() as f32; legal.len()];
                mcts.finish_iteration(request, &PredictionResult { policy, value: 0.0 });
            }
        }

        let prediction = mcts.get_prediction();
        let legal_moves = mcts.current_board().legal_moves();
        let mate_index = legal_moves.iter().position(|&mv| format!("{}", mv) == "a1a8").unwrap();

        let best_index = (0..prediction.policy.len()).max_by(|&a, &b| prediction.policy[a].partial_cmp(&prediction.policy[b]).unwrap()).unwrap();
        let total: f32 = prediction.policy.iter().sum();

        assert_eq!(best_index, mate_index);
        assert!((total - 1.0).abs() < 1e-6);
    }
}
