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

//! Precomputed attack tables: knight/king step masks, magic-bitboard tables
//! for bishops and rooks, and the ray/push masks used by check and pin
//! resolution. Everything here is read-only after the first access, built
//! behind a `lazy_static` one-shot guard (the Design Notes' "initialize on
//! first use ... store as immutable process-global data").
//!
//! The magic-number search follows `original_source/chess/magic.cpp`:
//! AND-fold three random `u64`s together to bias towards fewer set bits,
//! then retry until the resulting multiplier produces no collisions over
//! the subsets of the square's relevant-occupancy mask.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chess::bitboard::{bit_is_set, one_hot, pop_count, ALL_BITS};
use crate::chess::types::{make_square, square_file, square_rank, Square};

const KNIGHT_DELTAS: [(i8, i8); 8] =
    [(2, 1), (2, -1), (-2, 1), (-2, -1), (1, 2), (1, -2), (-1, 2), (-1, -2)];
const KING_DELTAS: [(i8, i8); 8] =
    [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn step_mask(sq: Square, deltas: &[(i8, i8); 8]) -> u64 {
    let mut mask = 0u64;
    let rank = square_rank(sq);
    let file = square_file(sq);

    for &(dr, df) in deltas {
        let (r, f) = (rank + dr, file + df);
        if (0..8).contains(&r) && (0..8).contains(&f) {
            mask |= one_hot(make_square(r, f));
        }
    }
    mask
}

/// Sliding attacks from `sq` given occupancy `occ`, along `dirs`. Stops
/// (inclusive) at the first occupied square in each direction.
fn slider_attacks(sq: Square, occ: u64, dirs: &[(i8, i8); 4]) -> u64 {
    let mut mask = 0u64;
    let rank = square_rank(sq);
    let file = square_file(sq);

    for &(dr, df) in dirs {
        let (mut r, mut f) = (rank + dr, file + df);
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let to = make_square(r, f);
            mask |= one_hot(to);
            if bit_is_set(occ, to) {
                break;
            }
            r += dr;
            f += df;
        }
    }
    mask
}

/// The relevant-occupancy mask for a slider on `sq`: every square the
/// piece could slide across, excluding the edge of the board (the edge
/// square is always either occupied by the board boundary or irrelevant to
/// blocking, per the standard magic-bitboard trick).
fn relevant_occupancy(sq: Square, dirs: &[(i8, i8); 4]) -> u64 {
    let mut mask = 0u64;
    let rank = square_rank(sq);
    let file = square_file(sq);

    for &(dr, df) in dirs {
        let (mut r, mut f) = (rank + dr, file + df);
        while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
            mask |= one_hot(make_square(r, f));
            r += dr;
            f += df;
        }
    }
    mask
}

fn subsets_of(mask: u64) -> Vec<u64> {
    let bits: Vec<Square> = (0..64).filter(|&sq| bit_is_set(mask, sq)).collect();
    let n = bits.len();
    let mut out = Vec::with_capacity(1 << n);

    for x in 0..(1u64 << n) {
        let mut subset = 0u64;
        for (i, &sq) in bits.iter().enumerate() {
            if bit_is_set(x, i as Square) {
                subset |= one_hot(sq);
            }
        }
        out.push(subset);
    }
    out
}

struct SliderMagic {
    relevant_occ: u64,
    multiplier: u64,
    shift: u32,
    table: Vec<u64>,
}

impl SliderMagic {
    fn attacks(&self, occ: u64) -> u64 {
        let index = ((occ & self.relevant_occ).wrapping_mul(self.multiplier)) >> self.shift;
        self.table[index as usize]
    }
}

fn generate_magic(sq: Square, dirs: &[(i8, i8); 4], rng: &mut StdRng) -> SliderMagic {
    let relevant_occ = relevant_occupancy(sq, dirs);
    let subsets = subsets_of(relevant_occ);
    let attacks: Vec<u64> = subsets.iter().map(|&occ| slider_attacks(sq, occ, dirs)).collect();
    let bits = pop_count(relevant_occ);
    let shift = 64 - bits;
    let size = 1usize << bits;

    loop {
        // AND-fold three random u64s together to bias the candidate towards
        // fewer set bits -- empirically easier to find collision-free.
        let multiplier: u64 = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
        let mut table = vec![ALL_BITS; size];
        let mut ok = true;

        for (i, &occ) in subsets.iter().enumerate() {
            let index = (occ.wrapping_mul(multiplier) >> shift) as usize;
            if table[index] != ALL_BITS && table[index] != attacks[i] {
                ok = false;
                break;
            }
            table[index] = attacks[i];
        }

        if ok {
            return SliderMagic { relevant_occ, multiplier, shift, table };
        }
    }
}

/// Push mask between two squares on the same rank, file, or diagonal: the
/// squares strictly between them, exclusive. Zero if `from`/`to` are not
/// aligned.
fn compute_push_mask(from: Square, to: Square) -> u64 {
    if from == to {
        return 0;
    }
    let (mut f, mut t) = (from, to);
    if f > t {
        std::mem::swap(&mut f, &mut t);
    }
    let (fr, ff) = (square_rank(f), square_file(f));
    let (tr, tf) = (square_rank(t), square_file(t));
    let dr = tr - fr;
    let df = tf - ff;
    let mut mask = 0u64;

    if dr == 0 {
        for file in (ff + 1)..tf {
            mask |= one_hot(make_square(fr, file));
        }
    } else if df == 0 {
        for rank in (fr + 1)..tr {
            mask |= one_hot(make_square(rank, ff));
        }
    } else if dr.abs() == df.abs() {
        let (sr, sf) = (dr.signum(), df.signum());
        let (mut rank, mut file) = (fr + sr, ff + sf);
        while rank != tr {
            mask |= one_hot(make_square(rank, file));
            rank += sr;
            file += sf;
        }
    }
    mask
}

/// The full ray through `from` and `to` (both endpoints' board edges
/// included), used by the "same direction" pin test.
fn compute_ray_mask(from: Square, to: Square) -> u64 {
    if from == to {
        return 0;
    }
    let (fr, ff) = (square_rank(from), square_file(from));
    let (tr, tf) = (square_rank(to), square_file(to));
    let dr = tr - fr;
    let df = tf - ff;
    let mut mask = 0u64;

    if dr == 0 {
        let d = df.signum();
        let mut file = ff;
        while (0..8).contains(&file) {
            mask |= one_hot(make_square(fr, file));
            file += d;
        }
    } else if df == 0 {
        let d = dr.signum();
        let mut rank = fr;
        while (0..8).contains(&rank) {
            mask |= one_hot(make_square(rank, ff));
            rank += d;
        }
    } else if dr.abs() == df.abs() {
        let (sr, sf) = (dr.signum(), df.signum());
        let (mut rank, mut file) = (fr, ff);
        while (0..8).contains(&rank) && (0..8).contains(&file) {
            mask |= one_hot(make_square(rank, file));
            rank += sr;
            file += sf;
        }
    }
    mask
}

pub struct AttackTables {
    knight: [u64; 64],
    king: [u64; 64],
    bishop: Vec<SliderMagic>,
    rook: Vec<SliderMagic>,
    push_mask: Vec<u64>,
    ray_mask: Vec<u64>,
}

impl AttackTables {
    fn build() -> Self {
        // Fixed seed: the tables only need to be *collision-free*, not
        // minimal, and a stable seed keeps them identical across runs
        // (the Design Notes only require move indices to be stable; a
        // fixed seed also makes debugging reproducible).
        let mut rng = StdRng::seed_from_u64(0x5EED_C0FF_EE15_1234);

        let mut knight = [0u64; 64];
        let mut king = [0u64; 64];
        let mut bishop = Vec::with_capacity(64);
        let mut rook = Vec::with_capacity(64);
        let mut push_mask = vec![0u64; 64 * 64];
        let mut ray_mask = vec![0u64; 64 * 64];

        for sq in 0..64i8 {
            knight[sq as usize] = step_mask(sq, &KNIGHT_DELTAS);
            king[sq as usize] = step_mask(sq, &KING_DELTAS);
            bishop.push(generate_magic(sq, &BISHOP_DIRS, &mut rng));
            rook.push(generate_magic(sq, &ROOK_DIRS, &mut rng));
        }

        for from in 0..64i8 {
            for to in 0..64i8 {
                push_mask[(from * 64 + to) as usize] = compute_push_mask(from, to);
                ray_mask[(from * 64 + to) as usize] = compute_ray_mask(from, to);
            }
        }

        AttackTables { knight, king, bishop, rook, push_mask, ray_mask }
    }

    pub fn knight_moves(&self, sq: Square) -> u64 {
        self.knight[sq as usize]
    }

    pub fn king_moves(&self, sq: Square) -> u64 {
        self.king[sq as usize]
    }

    pub fn bishop_moves(&self, sq: Square, occ: u64) -> u64 {
        self.bishop[sq as usize].attacks(occ)
    }

    pub fn rook_moves(&self, sq: Square, occ: u64) -> u64 {
        self.rook[sq as usize].attacks(occ)
    }

    pub fn push_mask(&self, from: Square, to: Square) -> u64 {
        self.push_mask[(from * 64 + to) as usize]
    }

    /// Whether `from`, `via`, and `to` are collinear and `via` lies between
    /// (or equal to) `from` along the ray towards `to` -- used to decide if
    /// a pinned piece's move stays on the pin line.
    pub fn same_direction(&self, king_sq: Square, from: Square, to: Square) -> bool {
        let ray = self.ray_mask[(king_sq * 64 + from) as usize];
        ray != 0 && bit_is_set(ray, to)
    }
}

lazy_static! {
    pub static ref TABLES: AttackTables = AttackTables::build();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knight_from_corner_has_two_moves() {
        assert_eq!(pop_count(TABLES.knight_moves(0)), 2);
    }

    #[test]
    fn king_from_corner_has_three_moves() {
        assert_eq!(pop_count(TABLES.king_moves(0)), 3);
    }

    #[test]
    fn rook_on_empty_board_sees_whole_rank_and_file() {
        // a1 = square 0.
        let attacks = TABLES.rook_moves(0, 0);
        assert_eq!(pop_count(attacks), 14);
    }

    #[test]
    fn bishop_on_empty_board_center_sees_full_diagonals() {
        // d4 = square 27 (rank 3, file 3).
        let attacks = TABLES.bishop_moves(27, 0);
        assert_eq!(pop_count(attacks), 13);
    }

    #[test]
    fn rook_attacks_stop_at_blocker() {
        // a1 rook blocked by a piece on a4 (square 24).
        let occ = one_hot(24);
        let attacks = TABLES.rook_moves(0, occ);
        assert!(bit_is_set(attacks, 24));
        assert!(!bit_is_set(attacks, 32)); // a5, beyond the blocker
    }

    #[test]
    fn push_mask_between_rook_endpoints() {
        // a1 (0) to a4 (24): b2/b3 squares a2(8), a3(16) are between.
        let mask = TABLES.push_mask(0, 24);
        assert!(bit_is_set(mask, 8));
        assert!(bit_is_set(mask, 16));
        assert!(!bit_is_set(mask, 0));
        assert!(!bit_is_set(mask, 24));
    }

    #[test]
    fn same_direction_detects_pin_line() {
        // King on a1 (0), pinned piece on a2 (8) can move to a3 (16) but not b2 (9).
        assert!(TABLES.same_direction(0, 8, 16));
        assert!(!TABLES.same_direction(0, 8, 9));
    }
}
