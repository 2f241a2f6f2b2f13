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

//! The FM sketch and its exact-to-probabilistic transition.

use crate::fm::EXACT_THRESHOLD;
use crate::fm::NUM_BITMAPS;
use crate::fm::bitmap::BitmapArray;
use crate::fm::estimator;
use crate::fm::exact::ExactStore;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::digest128;

/// Current storage mode. Exact mode holds every distinct value seen so
/// far; Sketch mode holds only the FM bit matrix. The transition is
/// one-way: once a sketch leaves Exact mode it never returns.
#[derive(Debug)]
pub(crate) enum Mode {
    Exact(ExactStore),
    Sketch(BitmapArray),
}

/// A Flajolet-Martin distinct-count sketch.
///
/// Counts exactly while fewer than `exact_capacity` distinct values have
/// been observed, then promotes to a fixed-size probabilistic bit matrix.
/// Updates take the canonical byte representation of a value; equal
/// logical values must map to identical bytes across all workers whose
/// sketches will be merged.
///
/// # Examples
///
/// ```
/// # use fmsketch::fm::FmSketch;
/// let mut sketch = FmSketch::builder().build();
/// for word in ["a", "b", "c", "b"] {
///     sketch.update(word);
/// }
/// assert_eq!(sketch.estimate(), 3);
/// assert!(!sketch.is_estimation_mode());
/// ```
#[derive(Debug)]
pub struct FmSketch {
    num_bitmaps: u16,
    exact_capacity: u32,
    seed: u64,
    mode: Mode,
}

impl FmSketch {
    /// Create a new builder for FmSketch
    ///
    /// # Examples
    ///
    /// ```
    /// # use fmsketch::fm::FmSketch;
    /// let sketch = FmSketch::builder().num_bitmaps(64).build();
    /// assert_eq!(sketch.num_bitmaps(), 64);
    /// ```
    pub fn builder() -> FmSketchBuilder {
        FmSketchBuilder::default()
    }

    /// Observe one value, given by its canonical byte representation.
    ///
    /// Duplicates are no-ops in effect: in exact mode they are detected
    /// and skipped, in sketch mode they set an already-set bit. Observing
    /// a new distinct value while the exact store is full triggers the
    /// one-way promotion to sketch mode.
    pub fn update(&mut self, value: impl AsRef<[u8]>) {
        let value = value.as_ref();
        match &mut self.mode {
            Mode::Exact(store) => {
                if store.try_insert(value).is_ok() {
                    return;
                }
            }
            Mode::Sketch(bitmaps) => {
                bitmaps.insert(digest128(value, self.seed));
                return;
            }
        }
        self.promote_and_insert(value);
    }

    /// Return the distinct-count estimate.
    ///
    /// Exact while in exact mode (including 0 for an untouched sketch);
    /// probabilistic after promotion, see the [module docs](crate::fm) for
    /// the expected error.
    pub fn estimate(&self) -> u64 {
        match &self.mode {
            Mode::Exact(store) => store.len() as u64,
            Mode::Sketch(bitmaps) => estimator::estimate(bitmaps),
        }
    }

    /// True if no value was ever observed.
    pub fn is_empty(&self) -> bool {
        match &self.mode {
            Mode::Exact(store) => store.is_empty(),
            Mode::Sketch(_) => false,
        }
    }

    /// True once the sketch has promoted to probabilistic counting.
    pub fn is_estimation_mode(&self) -> bool {
        matches!(self.mode, Mode::Sketch(_))
    }

    /// Number of values retained in exact mode, `None` after promotion.
    pub fn num_retained(&self) -> Option<usize> {
        match &self.mode {
            Mode::Exact(store) => Some(store.len()),
            Mode::Sketch(_) => None,
        }
    }

    /// Number of bitmap trials this sketch is configured with.
    pub fn num_bitmaps(&self) -> u16 {
        self.num_bitmaps
    }

    /// Distinct-value capacity of the exact mode.
    pub fn exact_capacity(&self) -> u32 {
        self.exact_capacity
    }

    /// Hash seed. Sketches merge only with sketches built under the same seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Replay every stored value into a fresh bit matrix, insert the value
    /// that overflowed the store, and switch mode. Replay order is
    /// irrelevant: bit-setting is commutative and idempotent.
    fn promote_and_insert(&mut self, value: &[u8]) {
        let mut bitmaps = BitmapArray::new(self.num_bitmaps);
        if let Mode::Exact(store) = &self.mode {
            for stored in store.iter() {
                bitmaps.insert(digest128(stored, self.seed));
            }
        }
        bitmaps.insert(digest128(value, self.seed));
        self.mode = Mode::Sketch(bitmaps);
    }

    pub(crate) fn mode(&self) -> &Mode {
        &self.mode
    }

    pub(crate) fn into_parts(self) -> (u16, u32, u64, Mode) {
        (self.num_bitmaps, self.exact_capacity, self.seed, self.mode)
    }

    pub(crate) fn from_parts(num_bitmaps: u16, exact_capacity: u32, seed: u64, mode: Mode) -> Self {
        Self {
            num_bitmaps,
            exact_capacity,
            seed,
            mode,
        }
    }
}

impl Default for FmSketch {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for FmSketch
#[derive(Debug)]
pub struct FmSketchBuilder {
    num_bitmaps: u16,
    exact_capacity: u32,
    seed: u64,
}

impl Default for FmSketchBuilder {
    fn default() -> Self {
        Self {
            num_bitmaps: NUM_BITMAPS,
            exact_capacity: EXACT_THRESHOLD,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl FmSketchBuilder {
    /// Set the number of bitmap trials.
    ///
    /// More bitmaps lower the estimation error (relative standard error
    /// is about `0.78 / sqrt(num_bitmaps)`) at 16 bytes per bitmap.
    ///
    /// # Panics
    ///
    /// If `num_bitmaps` is zero.
    pub fn num_bitmaps(mut self, num_bitmaps: u16) -> Self {
        assert!(num_bitmaps > 0, "num_bitmaps must be positive");
        self.num_bitmaps = num_bitmaps;
        self
    }

    /// Set the distinct-value count at which the sketch promotes from
    /// exact tracking to FM bitmaps.
    ///
    /// # Panics
    ///
    /// If `exact_capacity` is zero.
    pub fn exact_capacity(mut self, exact_capacity: u32) -> Self {
        assert!(exact_capacity > 0, "exact_capacity must be positive");
        self.exact_capacity = exact_capacity;
        self
    }

    /// Set hash seed.
    ///
    /// All sketches that will ever be merged together must share a seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the FmSketch.
    pub fn build(self) -> FmSketch {
        FmSketch {
            num_bitmaps: self.num_bitmaps,
            exact_capacity: self.exact_capacity,
            seed: self.seed,
            mode: Mode::Exact(ExactStore::with_capacity(self.exact_capacity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sketch() {
        let sketch = FmSketch::builder().build();
        assert!(sketch.is_empty());
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.estimate(), 0);
        assert_eq!(sketch.num_retained(), Some(0));
    }

    #[test]
    fn test_exact_counting_with_duplicates() {
        let mut sketch = FmSketch::builder().build();
        for _ in 0..3 {
            sketch.update("apple");
            sketch.update("banana");
            sketch.update("cherry");
        }
        assert_eq!(sketch.estimate(), 3);
        assert!(!sketch.is_estimation_mode());
    }

    #[test]
    fn test_promotion_on_next_distinct_value() {
        let mut sketch = FmSketch::builder().exact_capacity(4).build();
        for i in 0..4u32 {
            sketch.update(i.to_le_bytes());
        }
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.estimate(), 4);

        sketch.update(4u32.to_le_bytes());
        assert!(sketch.is_estimation_mode());
        assert_eq!(sketch.num_retained(), None);
    }

    #[test]
    fn test_duplicate_at_capacity_does_not_promote() {
        let mut sketch = FmSketch::builder().exact_capacity(4).build();
        for i in 0..4u32 {
            sketch.update(i.to_le_bytes());
        }
        sketch.update(0u32.to_le_bytes());
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.estimate(), 4);
    }

    #[test]
    fn test_promotion_is_order_independent() {
        // The replay path and the stream order must not affect the
        // resulting bit matrix.
        let mut forward = FmSketch::builder().exact_capacity(8).build();
        let mut reverse = FmSketch::builder().exact_capacity(8).build();
        for i in 0..9u32 {
            forward.update(i.to_le_bytes());
        }
        for i in (0..9u32).rev() {
            reverse.update(i.to_le_bytes());
        }
        assert!(forward.is_estimation_mode());
        assert!(reverse.is_estimation_mode());
        match (forward.mode(), reverse.mode()) {
            (Mode::Sketch(a), Mode::Sketch(b)) => assert!(a == b),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_default_configuration() {
        let sketch = FmSketch::default();
        assert_eq!(sketch.num_bitmaps(), 256);
        assert_eq!(sketch.exact_capacity(), 12288);
        assert_eq!(sketch.seed(), 9001);
    }
}
