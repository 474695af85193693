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

use std::fmt;

/// Which of the two players is to move. Games with more than two colors
/// are out of scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}

/// The result of a terminal position, from the perspective of the side to
/// move *at that terminal position* (the side that finds itself unable to
/// move further, or the side for whom the game has otherwise concluded).
///
/// This fixes the `+1 = win for side to move`, `-1 = loss`, `0 = draw`
/// convention called out in the Design Notes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// The numeric training target, `{-1, 0, +1}`.
    pub fn as_value(self) -> f32 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => -1.0,
            Outcome::Draw => 0.0,
        }
    }

    pub fn opposite(self) -> Outcome {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Outcome::Win => write!(fmt, "win"),
            Outcome::Loss => write!(fmt, "loss"),
            Outcome::Draw => write!(fmt, "draw"),
        }
    }
}

/// The game-abstraction contract (C1). The MCTS tree, the prediction queue,
/// and the shuffling trainer depend on nothing else.
///
/// Implementations are plain values: `apply` returns a successor rather
/// than mutating in place, so the MCTS tree can hold many boards
/// simultaneously without any aliasing concerns.
pub trait Game: Clone + Send + Sync + 'static {
    /// A single legal move. Small and `Copy` so it can be stored densely in
    /// the MCTS tree's action array.
    type Move: Copy + Clone + Eq + Send + Sync + 'static;

    /// The size of the dense move-index space (`NUM_MOVE_INDICES`).
    const NUM_MOVE_INDICES: usize;

    /// The number of planes `encode` writes per position (for callers
    /// sizing tensors).
    const FEATURE_SIZE: usize;

    /// The starting position of the game.
    fn initial() -> Self;

    /// The side whose turn it is to move.
    fn side_to_move(&self) -> Side;

    /// All legal moves from this position, in a deterministic order.
    fn legal_moves(&self) -> Vec<Self::Move>;

    /// The successor position after playing `mv`. `mv` must be a member of
    /// `self.legal_moves()` -- passing an illegal move is a programming
    /// error and implementations may panic.
    fn apply(&self, mv: Self::Move) -> Self;

    /// Whether the game has concluded at this position.
    fn is_terminal(&self) -> bool;

    /// The outcome of the game, from the perspective of the side to move at
    /// this (terminal) position. Only meaningful when `is_terminal()`.
    fn result(&self) -> Option<Outcome>;

    /// A 64-bit hash of the position (placement, side to move, and any rule
    /// state) suitable for transposition/repetition/cache keys. Equal
    /// fingerprints must imply equivalent positions for move generation;
    /// collisions are tolerated in caches but must be avoided in exact
    /// repetition bookkeeping by keeping the board alongside the key.
    fn fingerprint(&self) -> u64;

    /// The dense index of `mv`, bounded by `NUM_MOVE_INDICES`. Bijective
    /// over the legal move set and stable across runs.
    fn move_index(&self, mv: Self::Move) -> u32;

    /// Writes this position's tensor encoding into `buffer[0..FEATURE_SIZE]`,
    /// canonicalized so that the side to move always sees itself as the
    /// first player (flip perspective when the second side is to move).
    fn encode(&self, buffer: &mut [f32]);
}
