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

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    White = 0,
    Black = 1,
}

impl Color {
    pub fn other(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Piece {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

pub const NUM_PIECES: usize = 6;
pub const ALL_PIECES: [Piece; NUM_PIECES] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
    Piece::King,
];

/// The four pieces a pawn may promote to, queen first since it is by far
/// the most common.
pub const PROMO_PIECES: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

pub fn piece_char(piece: Piece, color: Color) -> char {
    let letters = match color {
        Color::White => ['P', 'N', 'B', 'R', 'Q', 'K'],
        Color::Black => ['p', 'n', 'b', 'r', 'q', 'k'],
    };
    letters[piece as usize]
}

/// A square index `0..64`, `a1 == 0`, `h1 == 7`, `a8 == 56`, `h8 == 63`.
pub type Square = i8;

pub fn make_square(rank: i8, file: i8) -> Square {
    rank * 8 + file
}

pub fn square_rank(sq: Square) -> i8 {
    sq / 8
}

pub fn square_file(sq: Square) -> i8 {
    sq % 8
}

pub fn square_on_board(rank: i8, file: i8) -> bool {
    (0..8).contains(&rank) && (0..8).contains(&file)
}

pub fn square_name(sq: Square) -> String {
    let file = (b'a' + square_file(sq) as u8) as char;
    let rank = (b'1' + square_rank(sq) as u8) as char;
    format!("{}{}", file, rank)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MoveType {
    /// A non-capture move of a non-pawn piece: resets neither the 50-move
    /// clock, nor does it move a pawn.
    Reversible,
    /// A capture, or any pawn move (pawn moves and captures both reset the
    /// 50-move clock).
    Regular,
    Promotion,
    Castling,
    EnPassant,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
    pub kind: MoveType,
    pub is_capture: bool,
}

impl Move {
    pub fn new(from: Square, to: Square, kind: MoveType, is_capture: bool) -> Self {
        Self { from, to, promotion: None, kind, is_capture }
    }

    pub fn promotion(from: Square, to: Square, piece: Piece, is_capture: bool) -> Self {
        Self { from, to, promotion: Some(piece), kind: MoveType::Promotion, is_capture }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}{}", square_name(self.from), square_name(self.to))?;
        if let Some(piece) = self.promotion {
            write!(fmt, "{}", piece_char(piece, Color::Black))?;
        }
        Ok(())
    }
}
