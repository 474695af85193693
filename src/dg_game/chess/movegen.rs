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

//! Legal move enumeration, ported field-for-field from
//! `original_source/chess/movegen.h`'s `MoveGenerator`: compute king-danger,
//! check, and pin masks up front, then emit moves piece class by piece
//! class, intersected with those masks, rather than generating
//! pseudo-legal moves and filtering them after the fact.

use crate::chess::bitboard::{bit_is_set, one_hot, pop_count, rank_mask, file_mask, BitRange, ALL_BITS};
use crate::chess::board::PositionState;
use crate::chess::magic::TABLES;
use crate::chess::types::{make_square, square_file, square_rank, Color, Move, MoveType, Piece, Square, PROMO_PIECES};

pub struct MoveGenerator<'a> {
    pos: &'a PositionState,
    turn: Color,
    opp: Color,
    occ: u64,
    my_pieces: u64,
    opp_pieces: u64,
    king_sq: Square,
    king_danger: u64,
    in_check: bool,
    /// Squares a piece may capture on, or move to in order to block, while
    /// in check. `ALL_BITS` when not in check.
    check_ok: u64,
    soft_pinned: u64,
    moves: Vec<Move>,
}

impl<'a> MoveGenerator<'a> {
    pub fn new(pos: &'a PositionState) -> Self {
        let turn = pos.turn();
        let opp = turn.other();
        let occ = pos.occupancy();
        let my_pieces = pos.color_occupancy(turn);
        let opp_pieces = occ ^ my_pieces;
        let king_sq = crate::chess::bitboard::first_bit(pos.bitboard(turn, Piece::King));

        let mut gen = MoveGenerator {
            pos,
            turn,
            opp,
            occ,
            my_pieces,
            opp_pieces,
            king_sq,
            king_danger: 0,
            in_check: false,
            check_ok: ALL_BITS,
            soft_pinned: 0,
            moves: Vec::with_capacity(48),
        };

        gen.king_danger = gen.compute_king_danger();
        if bit_is_set(gen.king_danger, king_sq) {
            gen.in_check = true;
            let (capture_mask, push_mask) = gen.compute_check();
            gen.check_ok = capture_mask | push_mask;
        } else {
            gen.in_check = false;
            gen.check_ok = ALL_BITS;
        }
        gen.soft_pinned = gen.compute_pinned_pieces();

        gen
    }

    pub fn is_in_check(&self) -> bool {
        self.in_check
    }

    pub fn generate(mut self) -> Vec<Move> {
        let pawns = self.pos.bitboard(self.turn, Piece::Pawn);
        let knights = self.pos.bitboard(self.turn, Piece::Knight);
        let bishops = self.pos.bitboard(self.turn, Piece::Bishop) | self.pos.bitboard(self.turn, Piece::Queen);
        let rooks = self.pos.bitboard(self.turn, Piece::Rook) | self.pos.bitboard(self.turn, Piece::Queen);
        let king = self.pos.bitboard(self.turn, Piece::King);

        self.pawn_moves(pawns);
        self.knight_moves(knights);
        self.slider_moves(bishops, |sq, occ| TABLES.bishop_moves(sq, occ));
        self.slider_moves(rooks, |sq, occ| TABLES.rook_moves(sq, occ));
        self.king_moves(king);
        if !self.in_check {
            self.castling_moves();
        }

        self.moves
    }

    fn output(&mut self, mv: Move) {
        self.moves.push(mv);
    }

    fn is_pinned(&self, from: Square, to: Square) -> bool {
        bit_is_set(self.soft_pinned, from) && !TABLES.same_direction(self.king_sq, from, to)
    }

    fn pawn_moves(&mut self, pawns: u64) {
        let promotion_mask = if self.turn == Color::White { rank_mask(6) } else { rank_mask(1) };

        self.simple_pawn_moves(pawns & !promotion_mask, false);
        if pawns & promotion_mask != 0 {
            self.simple_pawn_moves(pawns & promotion_mask, true);
        }
        self.en_passant_moves(pawns);
    }

    fn simple_pawn_moves(&mut self, pawns: u64, promoting: bool) {
        let dr: i8 = if self.turn == Color::White { 8 } else { -8 };
        let impossible_push_squares = self.occ | !self.check_ok;
        let blocked = if self.turn == Color::White { impossible_push_squares >> 8 } else { impossible_push_squares << 8 };

        let mut emit_push = |gen: &mut Self, from: Square, to: Square| {
            if promoting {
                for &piece in &PROMO_PIECES {
                    gen.output(Move::promotion(from, to, piece, false));
                }
            } else {
                gen.output(Move::new(from, to, MoveType::Regular, false));
            }
        };

        for sq in BitRange::new(pawns & !blocked & !self.soft_pinned) {
            emit_push(self, sq, sq + dr);
        }
        for sq in BitRange::new(pawns & !blocked & self.soft_pinned) {
            let to = sq + dr;
            if TABLES.same_direction(self.king_sq, sq, to) {
                emit_push(self, sq, to);
            }
        }

        if !promoting {
            let double_blocked = if self.turn == Color::White {
                (self.occ >> 8) | (impossible_push_squares >> 16)
            } else {
                (self.occ << 8) | (impossible_push_squares << 16)
            };
            let double_mask = rank_mask(if self.turn == Color::White { 1 } else { 6 });

            for sq in BitRange::new(pawns & double_mask & !double_blocked & !self.soft_pinned) {
                self.output(Move::new(sq, sq + dr * 2, MoveType::Regular, false));
            }
            for sq in BitRange::new(pawns & double_mask & !double_blocked & self.soft_pinned) {
                let to = sq + dr * 2;
                if TABLES.same_direction(self.king_sq, sq, to) {
                    self.output(Move::new(sq, to, MoveType::Regular, false));
                }
            }
        }

        let left_mask = !file_mask(0);
        let right_mask = !file_mask(7);
        let capturable = self.opp_pieces & self.check_ok;

        let left_capture_dr: i8 = if self.turn == Color::White { 7 } else { -9 };
        let possible_left = if self.turn == Color::White { capturable >> 7 } else { capturable << 9 };
        for from in BitRange::new(pawns & left_mask & possible_left) {
            let to = from + left_capture_dr;
            if !self.is_pinned(from, to) {
                if promoting {
                    for &piece in &PROMO_PIECES {
                        self.output(Move::promotion(from, to, piece, true));
                    }
                } else {
                    self.output(Move::new(from, to, MoveType::Regular, true));
                }
            }
        }

        let right_capture_dr: i8 = if self.turn == Color::White { 9 } else { -7 };
        let possible_right = if self.turn == Color::White { capturable >> 9 } else { capturable << 7 };
        for from in BitRange::new(pawns & right_mask & possible_right) {
            let to = from + right_capture_dr;
            if !self.is_pinned(from, to) {
                if promoting {
                    for &piece in &PROMO_PIECES {
                        self.output(Move::promotion(from, to, piece, true));
                    }
                } else {
                    self.output(Move::new(from, to, MoveType::Regular, true));
                }
            }
        }
    }

    fn en_passant_moves(&mut self, pawns: u64) {
        let ep = self.pos.en_passant();
        if ep == 0 {
            return;
        }
        let to = crate::chess::bitboard::first_bit(ep);
        let to_rank = square_rank(to);
        let to_file = square_file(to);
        let dr: i8 = if self.turn == Color::White { -1 } else { 1 };

        let mut captures = 0u64;
        if to_file != 0 {
            captures |= one_hot(make_square(to_rank + dr, to_file - 1));
        }
        if to_file != 7 {
            captures |= one_hot(make_square(to_rank + dr, to_file + 1));
        }

        for from in BitRange::new(captures & pawns) {
            if self.is_pinned(from, to) {
                continue;
            }

            let other_pawn = if self.turn == Color::White { ep >> 8 } else { ep << 8 };

            if square_rank(self.king_sq) == square_rank(from) {
                let removed = one_hot(from) | other_pawn;
                let king_rook_moves = TABLES.rook_moves(self.king_sq, self.occ ^ removed) & rank_mask(square_rank(self.king_sq));
                let opp_rooks = self.pos.bitboard(self.opp, Piece::Rook) | self.pos.bitboard(self.opp, Piece::Queen);
                if king_rook_moves & opp_rooks != 0 {
                    continue;
                }
            }

            if (other_pawn & self.check_ok) == 0 && (ep & self.check_ok) == 0 {
                continue;
            }

            self.output(Move::new(from, to, MoveType::EnPassant, true));
        }
    }

    fn knight_moves(&mut self, knights: u64) {
        for from in BitRange::new(knights & !self.soft_pinned) {
            let targets = TABLES.knight_moves(from) & !self.my_pieces & self.check_ok;
            for to in BitRange::new(targets) {
                let is_capture = bit_is_set(self.opp_pieces, to);
                self.output(Move::new(from, to, if is_capture { MoveType::Regular } else { MoveType::Reversible }, is_capture));
            }
        }
    }

    fn slider_moves(&mut self, pieces: u64, mask_func: impl Fn(Square, u64) -> u64) {
        for from in BitRange::new(pieces & !self.soft_pinned) {
            let targets = mask_func(from, self.occ) & !self.my_pieces & self.check_ok;
            for to in BitRange::new(targets) {
                let is_capture = bit_is_set(self.opp_pieces, to);
                self.output(Move::new(from, to, if is_capture { MoveType::Regular } else { MoveType::Reversible }, is_capture));
            }
        }
        for from in BitRange::new(pieces & self.soft_pinned) {
            let targets = mask_func(from, self.occ) & !self.my_pieces & self.check_ok;
            for to in BitRange::new(targets) {
                if TABLES.same_direction(self.king_sq, from, to) {
                    let is_capture = bit_is_set(self.opp_pieces, to);
                    self.output(Move::new(from, to, if is_capture { MoveType::Regular } else { MoveType::Reversible }, is_capture));
                }
            }
        }
    }

    fn king_moves(&mut self, king: u64) {
        debug_assert_eq!(pop_count(king), 1);
        let from = crate::chess::bitboard::first_bit(king);
        let targets = TABLES.king_moves(from) & !self.my_pieces & !self.king_danger;
        for to in BitRange::new(targets) {
            let is_capture = bit_is_set(self.opp_pieces, to);
            self.output(Move::new(from, to, if is_capture { MoveType::Regular } else { MoveType::Reversible }, is_capture));
        }
    }

    fn castling_moves(&mut self) {
        let king_rank = if self.turn == Color::White { 0 } else { 7 };
        let king_square = make_square(king_rank, 4);
        let long_castle = make_square(king_rank, 0);
        let short_castle = make_square(king_rank, 7);
        let long_mask = one_hot(make_square(king_rank, 1)) | one_hot(make_square(king_rank, 2)) | one_hot(make_square(king_rank, 3));
        let short_mask = one_hot(make_square(king_rank, 5)) | one_hot(make_square(king_rank, 6));

        // b1/b8 may be attacked -- the king never crosses them.
        let castle_occ = self.occ | (self.king_danger & !(one_hot(1) | one_hot(57)));
        let rights = self.pos.castling_rights();

        if (rights & one_hot(long_castle)) != 0 && (castle_occ & long_mask) == 0 {
            self.output(Move::new(king_square, make_square(king_rank, 2), MoveType::Castling, false));
        }
        if (rights & one_hot(short_castle)) != 0 && (castle_occ & short_mask) == 0 {
            self.output(Move::new(king_square, make_square(king_rank, 6), MoveType::Castling, false));
        }
    }

    fn compute_king_danger(&self) -> u64 {
        // Remove our king so sliding attackers see through it -- otherwise
        // the king could "hide behind itself" when stepping back along a
        // checking ray.
        let occ = self.occ ^ one_hot(self.king_sq);
        let mut danger = 0u64;

        let opp_pawns = self.pos.bitboard(self.opp, Piece::Pawn);
        let left_mask = !file_mask(0);
        let right_mask = !file_mask(7);
        danger |= if self.turn == Color::White { (opp_pawns & left_mask) >> 9 } else { (opp_pawns & left_mask) << 7 };
        danger |= if self.turn == Color::White { (opp_pawns & right_mask) >> 7 } else { (opp_pawns & right_mask) << 9 };

        for sq in BitRange::new(self.pos.bitboard(self.opp, Piece::Knight)) {
            danger |= TABLES.knight_moves(sq);
        }
        for sq in BitRange::new(self.pos.bitboard(self.opp, Piece::Bishop) | self.pos.bitboard(self.opp, Piece::Queen)) {
            danger |= TABLES.bishop_moves(sq, occ);
        }
        for sq in BitRange::new(self.pos.bitboard(self.opp, Piece::Rook) | self.pos.bitboard(self.opp, Piece::Queen)) {
            danger |= TABLES.rook_moves(sq, occ);
        }
        danger |= TABLES.king_moves(crate::chess::bitboard::first_bit(self.pos.bitboard(self.opp, Piece::King)));

        danger
    }

    /// Returns `(capture_mask, push_mask)` -- the squares a non-king piece
    /// may land on while the side to move is in check.
    fn compute_check(&self) -> (u64, u64) {
        let r = square_rank(self.king_sq);
        let f = square_file(self.king_sq);
        let mut threats = 0u64;
        let mut slider_threats = 0u64;

        let dr: i8 = if self.turn == Color::White { 1 } else { -1 };
        let mut pawn_mask = 0u64;
        if (0..8).contains(&(r + dr)) && (0..8).contains(&(f - 1)) {
            pawn_mask |= one_hot(make_square(r + dr, f - 1));
        }
        if (0..8).contains(&(r + dr)) && (0..8).contains(&(f + 1)) {
            pawn_mask |= one_hot(make_square(r + dr, f + 1));
        }
        threats |= pawn_mask & self.pos.bitboard(self.opp, Piece::Pawn);

        threats |= TABLES.knight_moves(self.king_sq) & self.pos.bitboard(self.opp, Piece::Knight);
        slider_threats |= TABLES.bishop_moves(self.king_sq, self.occ)
            & (self.pos.bitboard(self.opp, Piece::Bishop) | self.pos.bitboard(self.opp, Piece::Queen));
        slider_threats |= TABLES.rook_moves(self.king_sq, self.occ)
            & (self.pos.bitboard(self.opp, Piece::Rook) | self.pos.bitboard(self.opp, Piece::Queen));
        threats |= slider_threats;

        if threats == 0 {
            return (ALL_BITS, ALL_BITS);
        }
        if pop_count(threats) > 1 {
            return (0, 0);
        }
        let capture_mask = threats;
        let push_mask = if slider_threats == 0 {
            0
        } else {
            TABLES.push_mask(self.king_sq, crate::chess::bitboard::first_bit(threats))
        };
        (capture_mask, push_mask)
    }

    fn compute_pinned_pieces(&self) -> u64 {
        let mut pinned = 0u64;

        let king_bishop_mask = TABLES.bishop_moves(self.king_sq, self.occ);
        let possible_bishops = (self.pos.bitboard(self.opp, Piece::Bishop) | self.pos.bitboard(self.opp, Piece::Queen))
            & TABLES.bishop_moves(self.king_sq, 0);
        for sq in BitRange::new(possible_bishops) {
            pinned |= TABLES.bishop_moves(sq, self.occ) & king_bishop_mask;
        }

        let king_rook_mask = TABLES.rook_moves(self.king_sq, self.occ);
        let possible_rooks = (self.pos.bitboard(self.opp, Piece::Rook) | self.pos.bitboard(self.opp, Piece::Queen))
            & TABLES.rook_moves(self.king_sq, 0);
        for sq in BitRange::new(possible_rooks) {
            pinned |= TABLES.rook_moves(sq, self.occ) & king_rook_mask;
        }

        pinned
    }
}

/// Outcome of enumerating moves for the side to move, when no moves exist.
pub enum NoMovesReason {
    Checkmate,
    Stalemate,
}

pub fn legal_moves(pos: &PositionState) -> Vec<Move> {
    MoveGenerator::new(pos).generate()
}

pub fn classify_no_moves(pos: &PositionState) -> NoMovesReason {
    if MoveGenerator::new(pos).is_in_check() {
        NoMovesReason::Checkmate
    } else {
        NoMovesReason::Stalemate
    }
}
