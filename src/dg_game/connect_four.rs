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

//! The trivial game in the pair: a 7x6 Connect-Four board, grounded in
//! `original_source/c4cc/board.h`.

use crate::game::{Game, Outcome, Side};

pub const WIDTH: usize = 7;
pub const HEIGHT: usize = 6;

/// Columns are explored center-out, matching the `[3,2,4,1,5,0,6]` order in
/// the testable-properties section: children near the center are
/// statistically the strongest, so the prior exploration order should
/// favor them.
const COLUMN_ORDER: [u8; WIDTH] = [3, 2, 4, 1, 5, 0, 6];

/// A column index in `0..WIDTH`.
pub type Move = u8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Cell {
    Empty,
    First,
    Second,
}

#[derive(Clone, Debug)]
pub struct Board {
    // column-major, bottom-to-top; `cells[c][r]`.
    cells: [[Cell; HEIGHT]; WIDTH],
    heights: [u8; WIDTH],
    side_to_move: Side,
    winner: Option<Side>,
    num_moves: u32,
}

impl Board {
    fn cell_of(&self, side: Side) -> Cell {
        match side {
            Side::First => Cell::First,
            Side::Second => Cell::Second,
        }
    }

    fn is_full(&self) -> bool {
        self.heights.iter().all(|&h| h as usize == HEIGHT)
    }

    /// Checks whether dropping at `(col, row)` for `side` completed a
    /// four-in-a-row through that point.
    fn check_win_through(&self, col: usize, row: usize, side: Side) -> bool {
        const DIRS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];
        let mine = self.cell_of(side);

        for &(dc, dr) in &DIRS {
            let mut count = 1;
            count += self.run_length(col, row, dc, dr, mine);
            count += self.run_length(col, row, -dc, -dr, mine);
            if count >= 4 {
                return true;
            }
        }
        false
    }

    fn run_length(&self, col: usize, row: usize, dc: i32, dr: i32, mine: Cell) -> u32 {
        let mut count = 0;
        let mut c = col as i32 + dc;
        let mut r = row as i32 + dr;

        while c >= 0 && c < WIDTH as i32 && r >= 0 && r < HEIGHT as i32 {
            if self.cells[c as usize][r as usize] != mine {
                break;
            }
            count += 1;
            c += dc;
            r += dr;
        }
        count
    }
}

impl Game for Board {
    type Move = Move;

    const NUM_MOVE_INDICES: usize = WIDTH;
    const FEATURE_SIZE: usize = 3 * WIDTH * HEIGHT;

    fn initial() -> Self {
        Self {
            cells: [[Cell::Empty; HEIGHT]; WIDTH],
            heights: [0; WIDTH],
            side_to_move: Side::First,
            winner: None,
            num_moves: 0,
        }
    }

    fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    fn legal_moves(&self) -> Vec<Move> {
        if self.winner.is_some() {
            return Vec::new();
        }

        COLUMN_ORDER
            .iter()
            .copied()
            .filter(|&c| (self.heights[c as usize] as usize) < HEIGHT)
            .collect()
    }

    fn apply(&self, mv: Move) -> Self {
        let col = mv as usize;
        assert!(col < WIDTH, "column {} out of range", col);

        let mut next = self.clone();
        let row = next.heights[col] as usize;
        assert!(row < HEIGHT, "column {} is full", col);

        next.cells[col][row] = next.cell_of(self.side_to_move);
        next.heights[col] += 1;
        next.num_moves += 1;

        if next.check_win_through(col, row, self.side_to_move) {
            next.winner = Some(self.side_to_move);
        }
        next.side_to_move = self.side_to_move.opposite();
        next
    }

    fn is_terminal(&self) -> bool {
        self.winner.is_some() || self.is_full()
    }

    fn result(&self) -> Option<Outcome> {
        match self.winner {
            // The winner made the last move, so the side to move *now* has lost.
            Some(winner) if winner != self.side_to_move => Some(Outcome::Loss),
            Some(_) => unreachable!("side to move cannot be the stored winner"),
            None if self.is_full() => Some(Outcome::Draw),
            None => None,
        }
    }

    fn fingerprint(&self) -> u64 {
        // FNV-1a over the packed board state; adequate for a 7x6 board with
        // 3 states per cell (3^42 < 2^67, so we mix in side-to-move too).
        let mut hash: u64 = 0xcbf29ce484222325;
        let mut mix = |byte: u8| {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        };

        for col in 0..WIDTH {
            for row in 0..HEIGHT {
                let tag = match self.cells[col][row] {
                    Cell::Empty => 0u8,
                    Cell::First => 1u8,
                    Cell::Second => 2u8,
                };
                mix(tag);
            }
        }
        mix(if self.side_to_move == Side::First { 0 } else { 1 });
        hash
    }

    fn move_index(&self, mv: Move) -> u32 {
        mv as u32
    }

    fn encode(&self, buffer: &mut [f32]) {
        assert_eq!(buffer.len(), Self::FEATURE_SIZE);
        for v in buffer.iter_mut() {
            *v = 0.0;
        }

        let (mine, theirs) = (self.cell_of(self.side_to_move), self.cell_of(self.side_to_move.opposite()));
        let plane = |c: usize, r: usize| c * HEIGHT + r;

        for col in 0..WIDTH {
            for row in 0..HEIGHT {
                let cell = self.cells[col][row];
                if cell == mine {
                    buffer[plane(col, row)] = 1.0;
                } else if cell == theirs {
                    buffer[WIDTH * HEIGHT + plane(col, row)] = 1.0;
                }
            }
        }

        // constant color plane, matching the teacher's "filled with ones if
        // we are black" global-property convention from `go/features.rs`.
        if self.side_to_move == Side::Second {
            for v in buffer[2 * WIDTH * HEIGHT..].iter_mut() {
                *v = 1.0;
            }
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Game::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_legal_moves_are_center_out() {
        let board = Board::initial();
        assert_eq!(board.legal_moves(), vec![3, 2, 4, 1, 5, 0, 6]);
    }

    #[test]
    fn column_fills_up() {
        let mut board = Board::initial();
        for mv in [3u8, 2, 3, 2, 3, 2] {
            board = board.apply(mv);
        }
        assert!(!board.legal_moves().contains(&3));
    }

    #[test]
    fn horizontal_win_is_detected() {
        let mut board = Board::initial();
        // First plays columns 0,1,2,3 on the bottom row; Second plays elsewhere.
        for (first, second) in [(0u8, 4u8), (1, 5), (2, 4)] {
            board = board.apply(first);
            board = board.apply(second);
        }
        assert!(!board.is_terminal());
        board = board.apply(3);
        assert!(board.is_terminal());
        assert_eq!(board.result(), Some(Outcome::Loss));
    }

    #[test]
    fn fingerprint_changes_with_moves() {
        let board = Board::initial();
        let fp0 = board.fingerprint();
        let board = board.apply(3);
        assert_ne!(fp0, board.fingerprint());
    }

    #[test]
    fn side_to_move_alternates() {
        let board = Board::initial();
        assert_eq!(board.side_to_move(), Side::First);
        let board = board.apply(3);
        assert_eq!(board.side_to_move(), Side::Second);
    }
}
