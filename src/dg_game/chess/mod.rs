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

//! Bitboard chess (C2): magic-bitboard sliding attacks, a from-scratch
//! legal move generator, FEN support, and the `Game` implementation tying
//! them together for use by the MCTS tree.

mod bitboard;
mod board;
mod encode;
mod fen;
mod magic;
mod movegen;
mod types;

pub use self::board::{PositionState as Board, FEATURE_SIZE};
pub use self::encode::NUM_MOVE_INDICES;
pub use self::fen::{parse as from_fen, to_fen};
pub use self::types::{Color, Move, MoveType, Piece, Square};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;

    #[test]
    fn initial_position_has_twenty_legal_moves() {
        let board = Board::initial();
        assert_eq!(board.legal_moves().len(), 20);
    }

    #[test]
    fn opening_move_flips_side_to_move() {
        let board = Board::initial();
        let mv = board.legal_moves()[0];
        let next = board.apply(mv);
        assert_ne!(board.side_to_move(), next.side_to_move());
    }

    #[test]
    fn mate_in_one_is_found_and_applied() {
        let board = from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let moves = board.legal_moves();
        let mate_move = moves
            .iter()
            .copied()
            .find(|m| m.to_string() == "a1a8")
            .expect("a1a8 should be a legal rook move");

        let after = board.apply(mate_move);
        assert!(after.is_terminal());
        assert_eq!(after.result(), Some(crate::game::Outcome::Loss));
    }

    #[test]
    fn castling_through_an_attacked_square_is_illegal() {
        // White king on e1 wants to castle queenside, but d1 is attacked by
        // the black queen on e2 -- c1/b1/d1 must all be unattacked except
        // that b1/a1 itself may be (the rook, not the king, passes through).
        let board = from_fen("r3k2r/8/8/8/8/8/4q3/R3K2R w KQkq - 0 1").unwrap();
        let moves = board.legal_moves();
        assert!(!moves.iter().any(|m| m.to_string() == "e1c1"));
    }

    #[test]
    fn lone_king_in_check_can_only_move_the_king() {
        // Black rook on e2 checks the white king on e1 along the e-file
        // with no other white piece able to block or capture it.
        let board = from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
        let moves = board.legal_moves();
        assert!(moves.iter().all(|m| m.from == 4));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = Board::initial();
        let b = Board::initial();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = a.apply(a.legal_moves()[0]);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn encode_matches_feature_size() {
        let board = Board::initial();
        let mut buffer = vec![0.0f32; Board::FEATURE_SIZE];
        board.encode(&mut buffer);
        // Each side has 16 pieces set across its six planes.
        let white_plane_sum: f32 = buffer[0..6 * 64].iter().sum();
        assert_eq!(white_plane_sum as u32, 16);
    }
}
