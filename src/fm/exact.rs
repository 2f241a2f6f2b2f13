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

//! Sorted, deduplicated storage for the exact counting mode.
//!
//! Values live back-to-back in a byte arena; a directory of
//! (offset, length) entries kept in lexicographic order of the referenced
//! bytes provides binary-search membership. While a sketch is in exact
//! mode the directory length is the exact distinct count.

/// Marker returned when the directory is full and an absent value arrives.
/// The caller reacts by promoting to bitmap mode; this never surfaces to
/// users of the sketch.
pub(crate) struct CapacityExceeded;

/// Initial arena guess: 8 bytes per stored value. The arena grows
/// dynamically if the guess was too low.
const INITIAL_BYTES_PER_VALUE: usize = 8;

#[derive(Debug)]
pub(crate) struct ExactStore {
    /// (offset, length) into `arena`, ordered by the referenced bytes.
    dir: Vec<(u32, u32)>,
    arena: Vec<u8>,
    capacity: u32,
}

impl ExactStore {
    /// Create an empty store that accepts up to `capacity` distinct values.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            dir: Vec::with_capacity(capacity as usize),
            arena: Vec::with_capacity(capacity as usize * INITIAL_BYTES_PER_VALUE),
            capacity,
        }
    }

    /// Insert `value` if absent, keeping the directory sorted.
    ///
    /// Returns `Ok(true)` on insertion, `Ok(false)` for a duplicate (a
    /// duplicate is a no-op even when the store is full), and
    /// `Err(CapacityExceeded)` when an absent value arrives with the
    /// directory at capacity.
    pub fn try_insert(&mut self, value: &[u8]) -> Result<bool, CapacityExceeded> {
        match self.search(value) {
            Ok(_) => Ok(false),
            Err(pos) => {
                if self.dir.len() >= self.capacity as usize {
                    return Err(CapacityExceeded);
                }
                self.grow_arena(value.len());
                let offset = self.arena.len() as u32;
                self.arena.extend_from_slice(value);
                self.dir.insert(pos, (offset, value.len() as u32));
                Ok(true)
            }
        }
    }

    /// Number of distinct values stored. Exact by construction.
    pub fn len(&self) -> usize {
        self.dir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dir.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Iterate stored values in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.dir.iter().map(|&(off, len)| self.entry(off, len))
    }

    fn search(&self, value: &[u8]) -> Result<usize, usize> {
        self.dir
            .binary_search_by(|&(off, len)| self.entry(off, len).cmp(value))
    }

    fn entry(&self, offset: u32, len: u32) -> &[u8] {
        &self.arena[offset as usize..(offset + len) as usize]
    }

    /// Ensure the arena can hold `additional` more bytes, at least doubling
    /// when it cannot. Stored bytes are carried over wholesale by the
    /// reallocation; directory offsets stay valid because values never move
    /// within the arena.
    fn grow_arena(&mut self, additional: usize) {
        let needed = self.arena.len() + additional;
        if needed > self.arena.capacity() {
            let target = (self.arena.capacity() * 2 + additional).max(needed);
            self.arena.reserve_exact(target - self.arena.len());
        }
    }
}
