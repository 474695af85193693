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

//! Move-count perft tests against known-good node counts. The deeper
//! depths visit tens or hundreds of millions of positions and are marked
//! `#[ignore]`; run them explicitly with `cargo test -- --ignored` when
//! validating a change to the move generator.

use dg_game::{chess, Game};

fn perft(board: &chess::Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = board.legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }

    moves.iter().map(|&mv| perft(&board.apply(mv), depth - 1)).sum()
}

#[test]
fn perft_from_start_position_shallow() {
    let board = chess::Board::initial();

    assert_eq!(perft(&board, 1), 20);
    assert_eq!(perft(&board, 2), 400);
    assert_eq!(perft(&board, 3), 8_902);
    assert_eq!(perft(&board, 4), 197_281);
}

#[test]
#[ignore = "visits ~5M and ~119M nodes"]
fn perft_from_start_position_deep() {
    let board = chess::Board::initial();

    assert_eq!(perft(&board, 5), 4_865_609);
    assert_eq!(perft(&board, 6), 119_060_324);
}

#[test]
fn perft_from_kiwipete_shallow() {
    let board = chess::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap();

    assert_eq!(perft(&board, 1), 48);
    assert_eq!(perft(&board, 2), 2_039);
    assert_eq!(perft(&board, 3), 97_862);
}

#[test]
#[ignore = "visits ~4M and ~194M nodes"]
fn perft_from_kiwipete_deep() {
    let board = chess::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap();

    assert_eq!(perft(&board, 4), 4_085_603);
    assert_eq!(perft(&board, 5), 193_690_690);
}

#[test]
#[ignore = "visits ~11M nodes"]
fn perft_from_third_position_at_depth_six() {
    let board = chess::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();

    assert_eq!(perft(&board, 6), 11_030_083);
}

#[test]
fn side_to_move_flips_on_every_apply() {
    let board = chess::Board::initial();
    for &mv in &board.legal_moves() {
        let next = board.apply(mv);
        assert_ne!(board.side_to_move(), next.side_to_move());
    }
}

#[test]
fn is_in_check_detects_an_attacked_king() {
    let checked = chess::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
    assert!(checked.is_in_check());

    let quiet = chess::Board::initial();
    assert!(!quiet.is_in_check());
}
