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

//! Hashing for sketch updates.
//!
//! The FM insertion algorithm needs a fast, uniformly distributed 128-bit
//! digest of each canonical value. MurmurHash3 x64/128 provides that; only
//! its statistical uniformity is relied on, not any cryptographic property.

/// The seed 9001 used in the sketch update methods is a prime number that was chosen very early
/// on in experimental testing.
///
/// Choosing a seed is somewhat arbitrary, and the author cannot prove that this particular seed
/// is somehow superior to other seeds.
///
/// In order to merge two sketches it is critical that the same hash function and seed are
/// identical for both sketches, otherwise the assumed 1:1 relationship between the original
/// source key value and the hashed bit string would be violated. Once you have developed a
/// history of stored sketches you are stuck with it.
pub(crate) const DEFAULT_UPDATE_SEED: u64 = 9001;

/// Compute the 128-bit digest of a canonical byte string as `(lo, hi)` halves.
///
/// `mur3` seeds are 32-bit; the 64-bit sketch seed is folded down so that
/// equal seeds always produce equal digests across workers.
pub(crate) fn digest128(bytes: &[u8], seed: u64) -> (u64, u64) {
    mur3::murmurhash3_x64_128(bytes, fold_seed(seed))
}

/// Computes the 16-bit seed hash from the given long seed.
///
/// Stored in serialized sketches and compared on deserialization and merge
/// so that states hashed under different seeds are never combined.
pub(crate) fn compute_seed_hash(seed: u64) -> u16 {
    let (lo, _) = mur3::murmurhash3_x64_128(&seed.to_le_bytes(), 0);
    let seed_hash = (lo & 0xffff) as u16;
    // Zero is reserved to mean "no seed hash present".
    if seed_hash == 0 { 1 } else { seed_hash }
}

fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}
