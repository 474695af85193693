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

//! Move <-> dense-index mapping, ported from `original_source/chess/tensors.cpp`'s
//! `EncodeMove`: a plain `64 * from + to` index for every move that isn't
//! an underpromotion, with 9 extra planes (3 target directions x 3
//! non-queen promotion pieces) appended after the first 4096 for those.
//! Moves are expressed from the mover's own point of view, so black's
//! squares are flipped vertically before indexing -- matching the
//! side-to-move-canonical board encoding.

use crate::chess::types::{square_file, square_rank, Color, Move, Piece};

pub const NUM_MOVE_INDICES: usize = 73 * 64;

fn flipped_square(sq: i8) -> i8 {
    let r = square_rank(sq);
    let f = square_file(sq);
    (7 - r) * 8 + f
}

pub fn move_index(turn: Color, mv: Move) -> u32 {
    let (from, to) = if turn == Color::Black {
        (flipped_square(mv.from), flipped_square(mv.to))
    } else {
        (mv.from, mv.to)
    };

    match mv.promotion {
        None | Some(Piece::Queen) => (64 * from as i32 + to as i32) as u32,
        Some(piece) => {
            let direction_base = if to == from + 8 {
                64
            } else if to == from + 7 {
                67
            } else if to == from + 9 {
                70
            } else {
                unreachable!("underpromotion target {} not one step ahead of {}", to, from)
            };
            let piece_offset = match piece {
                Piece::Rook => 0,
                Piece::Bishop => 1,
                Piece::Knight => 2,
                Piece::Queen => unreachable!("queen promotions use the plain from/to index"),
                _ => unreachable!("invalid promotion piece"),
            };
            (64 * (direction_base + piece_offset) + to as i32) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::types::{make_square, MoveType};

    #[test]
    fn plain_move_is_from_times_64_plus_to() {
        let mv = Move::new(make_square(1, 4), make_square(3, 4), MoveType::Regular, false);
        assert_eq!(move_index(Color::White, mv), 64 * 12 + 28);
    }

    #[test]
    fn black_moves_flip_vertically() {
        let mv = Move::new(make_square(6, 4), make_square(4, 4), MoveType::Regular, false);
        let white_equivalent = Move::new(make_square(1, 4), make_square(3, 4), MoveType::Regular, false);
        assert_eq!(move_index(Color::Black, mv), move_index(Color::White, white_equivalent));
    }

    #[test]
    fn underpromotions_land_past_the_plain_range() {
        let mv = Move::promotion(make_square(6, 0), make_square(7, 0), Piece::Knight, false);
        assert!(move_index(Color::White, mv) >= 64 * 64);
    }

    #[test]
    fn queen_promotion_uses_plain_index() {
        let mv = Move::promotion(make_square(6, 0), make_square(7, 0), Piece::Queen, false);
        assert_eq!(move_index(Color::White, mv), 64 * 48 + 56);
    }
}
