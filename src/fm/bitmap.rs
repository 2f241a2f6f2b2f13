// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The FM bit matrix: `num_bitmaps` rows of 128 bits each.
//!
//! Each inserted digest updates exactly one row, chosen from its high
//! 64 bits, by setting the bit whose position from the most-significant
//! end mirrors the position of the digest's least-significant set bit.
//! Bit `k` from the MSB end is therefore set with probability `2^-(k+1)`
//! regardless of which value caused it. Bits are only ever set, never
//! cleared, which is what makes wordwise OR the correct merge combinator.

use crate::fm::BITMAP_BITS;

/// Two 64-bit words per row; bit position 0 is the most-significant bit
/// of the first word.
const WORDS_PER_ROW: usize = (BITMAP_BITS / 64) as usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BitmapArray {
    num_bitmaps: u16,
    words: Box<[u64]>,
}

impl BitmapArray {
    /// Create an all-zero matrix of `num_bitmaps` rows.
    pub fn new(num_bitmaps: u16) -> Self {
        Self {
            num_bitmaps,
            words: vec![0u64; num_bitmaps as usize * WORDS_PER_ROW].into_boxed_slice(),
        }
    }

    /// Reconstruct a matrix from serialized words. The caller has already
    /// validated `words.len() == num_bitmaps * WORDS_PER_ROW`.
    pub fn from_words(num_bitmaps: u16, words: Box<[u64]>) -> Self {
        debug_assert_eq!(words.len(), num_bitmaps as usize * WORDS_PER_ROW);
        Self { num_bitmaps, words }
    }

    pub fn num_bitmaps(&self) -> u16 {
        self.num_bitmaps
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Apply the FM insertion algorithm for one 128-bit digest.
    ///
    /// Idempotent per digest: re-inserting sets a bit that is already set.
    pub fn insert(&mut self, digest: (u64, u64)) {
        let (lo, hi) = digest;

        // One bitmap per value, a la Flajolet's pseudocode: choose the row
        // from the high-order 64 bits of the digest.
        let row = (hi % self.num_bitmaps as u64) as usize;

        // Position of the least-significant set bit across the full digest.
        // An all-zero digest is pinned to the last position so the bit
        // arithmetic below stays in range.
        let rmost = if lo != 0 {
            lo.trailing_zeros()
        } else if hi != 0 {
            64 + hi.trailing_zeros()
        } else {
            BITMAP_BITS as u32 - 1
        };

        // Set the bit at `rmost` counting from the most-significant end,
        // so bit k from the MSB end fires with probability 2^-(k+1).
        let word = row * WORDS_PER_ROW + (rmost / 64) as usize;
        self.words[word] |= 1u64 << (63 - (rmost % 64));
    }

    /// Number of consecutive set bits from the most-significant end of row
    /// `row` (Flajolet-Martin's R for that trial). A row with no zero bit
    /// yields the full width.
    pub fn run_length(&self, row: usize) -> u32 {
        let base = row * WORDS_PER_ROW;
        let mut run = 0;
        for word in &self.words[base..base + WORDS_PER_ROW] {
            let ones = word.leading_ones();
            run += ones;
            if ones < 64 {
                break;
            }
        }
        run
    }

    /// Sum of run lengths across all rows (S in the estimation formula).
    pub fn run_length_sum(&self) -> u64 {
        (0..self.num_bitmaps as usize)
            .map(|row| self.run_length(row) as u64)
            .sum()
    }

    /// Wordwise OR of another matrix into this one. The caller guarantees
    /// both matrices have the same shape.
    pub fn or_assign(&mut self, other: &BitmapArray) {
        debug_assert_eq!(self.num_bitmaps, other.num_bitmaps);
        for (dst, src) in self.words.iter_mut().zip(other.words.iter()) {
            *dst |= *src;
        }
    }
}
