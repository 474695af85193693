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

//! The chess position, grounded in `original_source/chess/board.h` and
//! `board-inl.cpp`'s `Board(const Board&, const Move&)` constructor:
//! twelve piece bitboards, an en-passant square, and castling rights
//! encoded as a bitmask of the rook home squares that still carry them.

use crate::chess::bitboard::{bit_is_set, one_hot, rank_mask};
use crate::chess::movegen::{self, NoMovesReason};
use crate::chess::types::{square_rank, Color, Move, MoveType, Piece, Square, ALL_PIECES, NUM_PIECES};

/// The squares whose bitboard bit is set in `castling_rights` whenever
/// that corner still has both its king and its rook untouched.
pub const A1: Square = 0;
pub const H1: Square = 7;
pub const A8: Square = 56;
pub const H8: Square = 63;
pub const C1: Square = 2;
pub const G1: Square = 6;
pub const C8: Square = 58;
pub const G8: Square = 62;

/// 12 piece planes (6 per side), plus an en-passant plane and a
/// castling-rights plane, each a full 8x8 board -- the layout `encode`
/// writes into.
pub const FEATURE_SIZE: usize = (2 * NUM_PIECES + 2) * 64;

/// A chess position, with enough history (en-passant target, castling
/// rights, halfmove clock) to generate legal moves and apply further
/// ones, but no full move history -- repetition detection is left to
/// callers that track `fingerprint()` over a game.
#[derive(Clone, Debug)]
pub struct PositionState {
    bitboards: [[u64; NUM_PIECES]; 2],
    en_passant: u64,
    castling_rights: u64,
    half_move_count: u32,
    no_progress_count: u32,
}

impl PositionState {
    pub fn turn(&self) -> Color {
        if self.half_move_count % 2 == 0 {
            Color::White
        } else {
            Color::Black
        }
    }

    pub fn bitboard(&self, color: Color, piece: Piece) -> u64 {
        self.bitboards[color as usize][piece as usize]
    }

    pub fn occupancy(&self) -> u64 {
        self.color_occupancy(Color::White) | self.color_occupancy(Color::Black)
    }

    pub fn color_occupancy(&self, color: Color) -> u64 {
        self.bitboards[color as usize].iter().fold(0, |acc, &bb| acc | bb)
    }

    pub fn en_passant(&self) -> u64 {
        self.en_passant
    }

    pub fn castling_rights(&self) -> u64 {
        self.castling_rights
    }

    pub fn no_progress_count(&self) -> u32 {
        self.no_progress_count
    }

    pub fn half_move_count(&self) -> u32 {
        self.half_move_count
    }

    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        let mask = one_hot(sq);
        for &color in &[Color::White, Color::Black] {
            for &piece in &ALL_PIECES {
                if self.bitboards[color as usize][piece as usize] & mask != 0 {
                    return Some((color, piece));
                }
            }
        }
        None
    }

    pub fn initial() -> Self {
        let mut bitboards = [[0u64; NUM_PIECES]; 2];
        let back_rank = [
            Piece::Rook,
            Piece::Knight,
            Piece::Bishop,
            Piece::Queen,
            Piece::King,
            Piece::Bishop,
            Piece::Knight,
            Piece::Rook,
        ];

        for (file, &piece) in back_rank.iter().enumerate() {
            bitboards[Color::White as usize][piece as usize] |= one_hot(file as Square);
            bitboards[Color::Black as usize][piece as usize] |= one_hot(56 + file as Square);
            bitboards[Color::White as usize][Piece::Pawn as usize] |= one_hot(8 + file as Square);
            bitboards[Color::Black as usize][Piece::Pawn as usize] |= one_hot(48 + file as Square);
        }

        PositionState {
            bitboards,
            en_passant: 0,
            castling_rights: one_hot(A1) | one_hot(H1) | one_hot(A8) | one_hot(H8),
            half_move_count: 0,
            no_progress_count: 0,
        }
    }

    /// Classifies `m` the way `Board::GetMoveType` does: a capture or pawn
    /// move is `Regular` (resets the no-progress counter), everything else
    /// reversible. This only inspects board state, never `m.is_capture`,
    /// so it agrees with the move generator's own classification even for
    /// externally constructed moves (e.g. from a UCI string).
    fn classify(&self, m: &Move) -> MoveType {
        if m.kind == MoveType::Castling || m.kind == MoveType::EnPassant || m.kind == MoveType::Promotion {
            return m.kind;
        }
        let turn = self.turn();
        let is_pawn = bit_is_set(self.bitboard(turn, Piece::Pawn), m.from);
        let is_capture = bit_is_set(self.color_occupancy(turn.other()), m.to);
        if is_pawn || is_capture {
            MoveType::Regular
        } else {
            MoveType::Reversible
        }
    }

    /// Applies `m`, returning the resulting position. Does not itself
    /// validate legality -- callers are expected to only pass moves
    /// returned by [`PositionState::legal_moves`].
    pub fn apply(&self, m: Move) -> Self {
        let mut next = self.clone();
        let from_o = one_hot(m.from);
        let to_o = one_hot(m.to);
        let turn = self.turn();
        let opp = turn.other();

        next.en_passant = 0;
        match self.classify(&m) {
            MoveType::Reversible => {
                next.no_progress_count += 1;
                for &piece in &ALL_PIECES {
                    if next.bitboards[turn as usize][piece as usize] & from_o != 0 {
                        next.bitboards[turn as usize][piece as usize] ^= from_o | to_o;
                    }
                }
                next.update_castling_rights(turn, from_o, to_o);
            }
            MoveType::Regular => {
                next.no_progress_count = 0;
                if self.bitboard(turn, Piece::Pawn) & from_o != 0 {
                    if m.to - m.from == 16 {
                        next.en_passant = one_hot(m.to - 8);
                    } else if m.from - m.to == 16 {
                        next.en_passant = one_hot(m.to + 8);
                    }
                }
                for &piece in &ALL_PIECES {
                    if next.bitboards[turn as usize][piece as usize] & from_o != 0 {
                        next.bitboards[turn as usize][piece as usize] ^= from_o | to_o;
                    }
                }
                for &piece in &ALL_PIECES {
                    next.bitboards[opp as usize][piece as usize] &= !to_o;
                }
                next.update_castling_rights(turn, from_o, to_o);
            }
            MoveType::Castling => {
                next.no_progress_count += 1;
                next.castling_rights &= !rank_mask(if turn == Color::White { 0 } else { 7 });
                match m.to {
                    C1 => {
                        next.bitboards[Color::White as usize][Piece::King as usize] = one_hot(C1);
                        next.bitboards[Color::White as usize][Piece::Rook as usize] ^= one_hot(A1) | one_hot(3);
                    }
                    G1 => {
                        next.bitboards[Color::White as usize][Piece::King as usize] = one_hot(G1);
                        next.bitboards[Color::White as usize][Piece::Rook as usize] ^= one_hot(H1) | one_hot(5);
                    }
                    C8 => {
                        next.bitboards[Color::Black as usize][Piece::King as usize] = one_hot(C8);
                        next.bitboards[Color::Black as usize][Piece::Rook as usize] ^= one_hot(A8) | one_hot(59);
                    }
                    G8 => {
                        next.bitboards[Color::Black as usize][Piece::King as usize] = one_hot(G8);
                        next.bitboards[Color::Black as usize][Piece::Rook as usize] ^= one_hot(H8) | one_hot(61);
                    }
                    _ => panic!("bad castling move {}", m),
                }
            }
            MoveType::Promotion => {
                next.no_progress_count = 0;
                next.bitboards[turn as usize][Piece::Pawn as usize] &= !from_o;
                next.bitboards[turn as usize][m.promotion.expect("promotion move without piece") as usize] |= to_o;
                for &piece in &ALL_PIECES {
                    next.bitboards[opp as usize][piece as usize] &= !to_o;
                }
                next.castling_rights &= !to_o;
            }
            MoveType::EnPassant => {
                next.bitboards[turn as usize][Piece::Pawn as usize] ^= from_o | to_o;
                let captured = crate::chess::types::make_square(square_rank(m.from), crate::chess::types::square_file(m.to));
                next.bitboards[opp as usize][Piece::Pawn as usize] &= !one_hot(captured);
            }
        }

        next.half_move_count += 1;
        next
    }

    fn update_castling_rights(&mut self, turn: Color, from_o: u64, to_o: u64) {
        self.castling_rights &= !from_o;
        self.castling_rights &= !to_o;
        if self.bitboards[Color::White as usize][Piece::King as usize] & to_o != 0 {
            self.castling_rights &= !rank_mask(0);
        } else if self.bitboards[Color::Black as usize][Piece::King as usize] & to_o != 0 {
            self.castling_rights &= !rank_mask(7);
        }
        let _ = turn;
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        movegen::legal_moves(self)
    }

    pub fn is_in_check(&self) -> bool {
        movegen::MoveGenerator::new(self).is_in_check()
    }

    pub fn is_terminal(&self) -> bool {
        self.no_progress_count >= 100 || self.legal_moves().is_empty()
    }

    /// `None` while the game continues, otherwise the outcome from the
    /// perspective of the side to move in *this* position. Checkmate and
    /// stalemate are checked before the fifty-move rule: a reversible move
    /// that happens to deliver checkmate on exactly the 50th such move pair
    /// must still be scored as a loss for the mated side, not a draw.
    pub fn result(&self) -> Option<crate::game::Outcome> {
        if !self.legal_moves().is_empty() {
            return if self.no_progress_count >= 100 { Some(crate::game::Outcome::Draw) } else { None };
        }
        match movegen::classify_no_moves(self) {
            NoMovesReason::Checkmate => Some(crate::game::Outcome::Loss),
            NoMovesReason::Stalemate => Some(crate::game::Outcome::Draw),
        }
    }

    /// A Zobrist-style hash built by mixing each occupied square's
    /// (square, color, piece) identity together with side to move,
    /// castling rights, and en-passant file -- everything that affects
    /// which moves are legal from this position.
    pub fn fingerprint(&self) -> u64 {
        let mut hash: u64 = 0xcbf29ce484222325;
        let mut mix = |x: u64| {
            hash ^= x;
            hash = hash.wrapping_mul(0x100000001b3);
        };

        for &color in &[Color::White, Color::Black] {
            for &piece in &ALL_PIECES {
                let mut bb = self.bitboards[color as usize][piece as usize];
                while bb != 0 {
                    let sq = crate::chess::bitboard::first_bit(bb);
                    bb &= bb - 1;
                    mix((sq as u64) << 4 | (color as u64) << 3 | (piece as u64));
                }
            }
        }
        mix(self.castling_rights);
        mix(self.en_passant);
        mix(self.turn() as u64);
        hash
    }

    /// Writes 14 planes of 64 squares each: the mover's six piece
    /// bitboards, the opponent's six, the en-passant square, and the
    /// castling-rights squares -- each vertically flipped when black is
    /// to move, so the side to move always sees itself moving "up the
    /// board".
    pub fn encode(&self, buffer: &mut [f32]) {
        debug_assert_eq!(buffer.len(), FEATURE_SIZE);
        for v in buffer.iter_mut() {
            *v = 0.0;
        }

        let turn = self.turn();
        let opp = turn.other();
        let plane_size = 64;

        for (i, &piece) in ALL_PIECES.iter().enumerate() {
            write_plane(&mut buffer[i * plane_size..(i + 1) * plane_size], self.bitboard(turn, piece), turn);
        }
        for (i, &piece) in ALL_PIECES.iter().enumerate() {
            let offset = (NUM_PIECES + i) * plane_size;
            write_plane(&mut buffer[offset..offset + plane_size], self.bitboard(opp, piece), turn);
        }

        let ep_offset = 2 * NUM_PIECES * plane_size;
        write_plane(&mut buffer[ep_offset..ep_offset + plane_size], self.en_passant, turn);
        let castling_offset = ep_offset + plane_size;
        write_plane(&mut buffer[castling_offset..castling_offset + plane_size], self.castling_rights, turn);
    }

    pub fn from_parts(
        bitboards: [[u64; NUM_PIECES]; 2],
        en_passant: u64,
        castling_rights: u64,
        half_move_count: u32,
        no_progress_count: u32,
    ) -> Self {
        PositionState { bitboards, en_passant, castling_rights, half_move_count, no_progress_count }
    }
}

/// Writes `bb`'s squares into `plane`, flipped vertically when `turn` is
/// black so that the encoded board is always from the mover's own point
/// of view -- the side-to-move-canonical convention used throughout.
fn write_plane(plane: &mut [f32], bb: u64, turn: Color) {
    for sq in crate::chess::bitboard::BitRange::new(bb) {
        let idx = if turn == Color::White { sq } else { 63 - sq };
        plane[idx as usize] = 1.0;
    }
}

impl Default for PositionState {
    fn default() -> Self {
        Self::initial()
    }
}

impl crate::game::Game for PositionState {
    type Move = Move;

    const NUM_MOVE_INDICES: usize = super::encode::NUM_MOVE_INDICES;
    const FEATURE_SIZE: usize = FEATURE_SIZE;

    fn initial() -> Self {
        PositionState::initial()
    }

    fn side_to_move(&self) -> crate::game::Side {
        match self.turn() {
            Color::White => crate::game::Side::First,
            Color::Black => crate::game::Side::Second,
        }
    }

    fn legal_moves(&self) -> Vec<Move> {
        PositionState::legal_moves(self)
    }

    fn apply(&self, mv: Move) -> Self {
        PositionState::apply(self, mv)
    }

    fn is_terminal(&self) -> bool {
        PositionState::is_terminal(self)
    }

    fn result(&self) -> Option<crate::game::Outcome> {
        PositionState::result(self)
    }

    fn fingerprint(&self) -> u64 {
        PositionState::fingerprint(self)
    }

    fn move_index(&self, mv: Move) -> u32 {
        super::encode::move_index(self.turn(), mv)
    }

    fn encode(&self, buffer: &mut [f32]) {
        PositionState::encode(self, buffer)
    }
}
