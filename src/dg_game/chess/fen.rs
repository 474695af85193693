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

//! FEN parsing and serialization, ported from the `Board(string_view fen)`
//! constructor and `Board::ToFEN` in `original_source/chess/board-inl.cpp`.
//! Distilled out of the original spec, but kept since every other example
//! position in this crate's tests is most naturally expressed as a FEN
//! string.

use dg_utils::Error;

use crate::chess::bitboard::one_hot;
use crate::chess::board::{self, PositionState};
use crate::chess::types::{make_square, piece_char, square_name, Color, Piece, NUM_PIECES};

pub fn parse(fen: &str) -> Result<PositionState, Error> {
    let parts: Vec<&str> = fen.split(' ').collect();
    if parts.len() != 6 {
        return Err(Error::InvalidFen(fen.to_string()));
    }

    let mut bitboards = [[0u64; NUM_PIECES]; 2];
    let mut rank = 7i8;
    let mut file = 0i8;

    for c in parts[0].chars() {
        if c == '/' {
            if file != 8 {
                return Err(Error::InvalidFen(fen.to_string()));
            }
            file = 0;
            rank -= 1;
        } else if c.is_ascii_digit() {
            file += c.to_digit(10).unwrap() as i8;
        } else {
            let color = if c.is_uppercase() { Color::White } else { Color::Black };
            let piece = match c.to_ascii_lowercase() {
                'p' => Piece::Pawn,
                'n' => Piece::Knight,
                'b' => Piece::Bishop,
                'r' => Piece::Rook,
                'q' => Piece::Queen,
                'k' => Piece::King,
                _ => return Err(Error::InvalidFen(fen.to_string())),
            };
            if !(0..8).contains(&rank) || !(0..8).contains(&file) {
                return Err(Error::InvalidFen(fen.to_string()));
            }
            bitboards[color as usize][piece as usize] |= one_hot(make_square(rank, file));
            file += 1;
        }
    }

    let half_move_count: u32 = match parts[1] {
        "w" => 0,
        "b" => 1,
        _ => return Err(Error::InvalidFen(fen.to_string())),
    };

    let mut castling_rights = 0u64;
    if parts[2] != "-" {
        for c in parts[2].chars() {
            castling_rights |= match c {
                'K' => one_hot(board::H1),
                'Q' => one_hot(board::A1),
                'k' => one_hot(board::H8),
                'q' => one_hot(board::A8),
                _ => return Err(Error::InvalidFen(fen.to_string())),
            };
        }
    }

    let en_passant = if parts[3] == "-" {
        0
    } else {
        let sq = parse_square(parts[3]).ok_or_else(|| Error::InvalidFen(fen.to_string()))?;
        one_hot(sq)
    };

    let no_progress_count: u32 = parts[4].parse().map_err(|_| Error::InvalidFen(fen.to_string()))?;
    let fullmove: u32 = parts[5].parse().map_err(|_| Error::InvalidFen(fen.to_string()))?;
    let half_move_count = half_move_count + 2 * fullmove.saturating_sub(1);

    Ok(PositionState::from_parts(bitboards, en_passant, castling_rights, half_move_count, no_progress_count))
}

fn parse_square(s: &str) -> Option<i8> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = (bytes[0] as i8) - (b'a' as i8);
    let rank = (bytes[1] as i8) - (b'1' as i8);
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some(make_square(rank, file))
    } else {
        None
    }
}

pub fn to_fen(pos: &PositionState) -> String {
    let mut fen = String::new();

    for rank in (0..8i8).rev() {
        let mut empty_run = 0;
        for file in 0..8i8 {
            let sq = make_square(rank, file);
            match pos.piece_at(sq) {
                Some((color, piece)) => {
                    if empty_run != 0 {
                        fen.push((b'0' + empty_run) as char);
                        empty_run = 0;
                    }
                    fen.push(piece_char(piece, color));
                }
                None => empty_run += 1,
            }
        }
        if empty_run != 0 {
            fen.push((b'0' + empty_run) as char);
        }
        if rank != 0 {
            fen.push('/');
        }
    }

    fen.push(' ');
    fen.push(if pos.turn() == Color::White { 'w' } else { 'b' });
    fen.push(' ');

    let mut any_castle = false;
    if pos.castling_rights() & one_hot(board::H1) != 0 {
        fen.push('K');
        any_castle = true;
    }
    if pos.castling_rights() & one_hot(board::A1) != 0 {
        fen.push('Q');
        any_castle = true;
    }
    if pos.castling_rights() & one_hot(board::H8) != 0 {
        fen.push('k');
        any_castle = true;
    }
    if pos.castling_rights() & one_hot(board::A8) != 0 {
        fen.push('q');
        any_castle = true;
    }
    if !any_castle {
        fen.push('-');
    }
    fen.push(' ');

    if pos.en_passant() == 0 {
        fen.push('-');
    } else {
        let sq = crate::chess::bitboard::first_bit(pos.en_passant());
        fen.push_str(&square_name(sq));
    }

    fen.push(' ');
    fen.push_str(&pos.no_progress_count().to_string());
    fen.push(' ');
    let fullmove = pos.half_move_count() / 2 + 1;
    fen.push_str(&fullmove.to_string());

    fen
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn startpos_round_trips() {
        let pos = parse(STARTPOS).unwrap();
        assert_eq!(to_fen(&pos), STARTPOS);
    }

    #[test]
    fn kiwipete_has_expected_piece_count() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let pos = parse(fen).unwrap();
        assert_eq!(pos.occupancy().count_ones(), 32);
    }

    #[test]
    fn en_passant_square_parses() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2";
        let pos = parse(fen).unwrap();
        assert_eq!(pos.en_passant().count_ones(), 1);
    }

    #[test]
    fn malformed_fen_is_rejected() {
        assert!(parse("not a fen").is_err());
    }
}
