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

//! Merging of independently built partial sketches.
//!
//! Partitioned accumulation builds one sketch per partition; this module
//! folds those partials back into one state. Merging is commutative and
//! associative in effect, so partials can be reduced in any order and
//! grouping (linear fold or tree).
//!
//! Merging two bitmap-mode sketches is a wordwise OR: bits are only ever
//! set, so the union of two partitions is exactly the union of their set
//! bits. Exact-mode operands either fold into the larger exact store, or,
//! when their combined counts no longer fit, are replayed through FM
//! insertion. That replay path trades the exact count for an estimate,
//! which is the accepted cost of exceeding exact tracking capacity during
//! a merge.

use crate::error::Error;
use crate::fm::FmSketch;
use crate::fm::bitmap::BitmapArray;
use crate::fm::exact::ExactStore;
use crate::fm::sketch::Mode;
use crate::hash::digest128;

impl FmSketch {
    /// Merge two sketches into one, consuming both.
    ///
    /// An empty operand acts as the identity. Operands hashed under
    /// different seeds or configured with different bitmap counts cannot
    /// be combined and fail with
    /// [`ErrorKind::IncompatibleSketchShape`](crate::error::ErrorKind).
    ///
    /// # Examples
    ///
    /// ```
    /// # use fmsketch::fm::FmSketch;
    /// let mut left = FmSketch::builder().build();
    /// let mut right = FmSketch::builder().build();
    /// left.update("apple");
    /// right.update("banana");
    /// right.update("apple");
    /// let merged = left.merge(right).unwrap();
    /// assert_eq!(merged.estimate(), 2);
    /// ```
    pub fn merge(self, other: FmSketch) -> Result<FmSketch, Error> {
        // An untouched operand is the identity, no compatibility demands.
        if other.is_empty() {
            return Ok(self);
        }
        if self.is_empty() {
            return Ok(other);
        }
        ensure_compatible(&self, &other)?;

        let (num_bitmaps, lhs_capacity, seed, lhs_mode) = self.into_parts();
        let (_, rhs_capacity, _, rhs_mode) = other.into_parts();

        let merged = match (lhs_mode, rhs_mode) {
            (Mode::Sketch(mut lhs), Mode::Sketch(rhs)) => {
                lhs.or_assign(&rhs);
                FmSketch::from_parts(num_bitmaps, lhs_capacity, seed, Mode::Sketch(lhs))
            }
            (Mode::Exact(lhs), Mode::Exact(rhs)) => {
                let (primary, secondary, capacity) = if lhs.len() >= rhs.len() {
                    (lhs, rhs, lhs_capacity)
                } else {
                    (rhs, lhs, rhs_capacity)
                };
                merge_exact(num_bitmaps, capacity, seed, primary, secondary)
            }
            (Mode::Sketch(mut bitmaps), Mode::Exact(store))
            | (Mode::Exact(store), Mode::Sketch(mut bitmaps)) => {
                replay(&mut bitmaps, &store, seed);
                FmSketch::from_parts(num_bitmaps, lhs_capacity, seed, Mode::Sketch(bitmaps))
            }
        };
        Ok(merged)
    }
}

/// Merge two exact stores, the smaller into the larger. Falls back to
/// replaying both through FM insertion when the combined counts no longer
/// fit the primary's capacity.
fn merge_exact(
    num_bitmaps: u16,
    capacity: u32,
    seed: u64,
    mut primary: ExactStore,
    secondary: ExactStore,
) -> FmSketch {
    if primary.len() + secondary.len() <= primary.capacity() as usize {
        for value in secondary.iter() {
            // Cannot overflow: the fit check reserved room for every value.
            let _ = primary.try_insert(value);
        }
        FmSketch::from_parts(num_bitmaps, capacity, seed, Mode::Exact(primary))
    } else {
        let mut bitmaps = BitmapArray::new(num_bitmaps);
        replay(&mut bitmaps, &primary, seed);
        replay(&mut bitmaps, &secondary, seed);
        FmSketch::from_parts(num_bitmaps, capacity, seed, Mode::Sketch(bitmaps))
    }
}

fn replay(bitmaps: &mut BitmapArray, store: &ExactStore, seed: u64) {
    for value in store.iter() {
        bitmaps.insert(digest128(value, seed));
    }
}

fn ensure_compatible(lhs: &FmSketch, rhs: &FmSketch) -> Result<(), Error> {
    if lhs.num_bitmaps() != rhs.num_bitmaps() {
        return Err(
            Error::shape_mismatch("sketches configured with different bitmap counts")
                .with_context("lhs_bitmaps", lhs.num_bitmaps())
                .with_context("rhs_bitmaps", rhs.num_bitmaps()),
        );
    }
    if lhs.seed() != rhs.seed() {
        return Err(Error::shape_mismatch("sketches hashed under different seeds")
            .with_context("lhs_seed", lhs.seed())
            .with_context("rhs_seed", rhs.seed()));
    }
    Ok(())
}

/// Folds any number of partial sketches into one.
///
/// The union keeps an internal sketch that accumulates the merge of all
/// inputs, the usual reduction surface for distributed aggregation: each
/// worker serializes its partial, the coordinator deserializes and feeds
/// them here in any order.
///
/// # Examples
///
/// ```
/// # use fmsketch::fm::{FmSketch, FmUnion};
/// let mut partial_a = FmSketch::builder().build();
/// let mut partial_b = FmSketch::builder().build();
/// partial_a.update("apple");
/// partial_b.update("banana");
///
/// let mut union = FmUnion::new();
/// union.update(partial_a).unwrap();
/// union.update(partial_b).unwrap();
/// assert_eq!(union.result().estimate(), 2);
/// ```
#[derive(Default)]
pub struct FmUnion {
    gadget: Option<FmSketch>,
}

impl FmUnion {
    /// Create an empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another partial sketch into the union.
    ///
    /// # Errors
    ///
    /// Fails with `IncompatibleSketchShape` when the input does not match
    /// the configuration of previously folded sketches; the union state is
    /// left unchanged in that case.
    pub fn update(&mut self, sketch: FmSketch) -> Result<(), Error> {
        if let Some(gadget) = &self.gadget
            && !gadget.is_empty()
            && !sketch.is_empty()
        {
            ensure_compatible(gadget, &sketch)?;
        }
        self.gadget = Some(match self.gadget.take() {
            Some(gadget) => gadget.merge(sketch)?,
            None => sketch,
        });
        Ok(())
    }

    /// Observe a single value directly, as if through a partial sketch
    /// with the default configuration.
    pub fn update_value(&mut self, value: impl AsRef<[u8]>) {
        self.gadget
            .get_or_insert_with(FmSketch::default)
            .update(value);
    }

    /// Current estimate of the union.
    pub fn estimate(&self) -> u64 {
        self.gadget.as_ref().map_or(0, FmSketch::estimate)
    }

    /// Consume the union and return the folded sketch.
    pub fn result(self) -> FmSketch {
        self.gadget.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sketch_of(range: std::ops::Range<u32>, capacity: u32) -> FmSketch {
        let mut sketch = FmSketch::builder().exact_capacity(capacity).build();
        for i in range {
            sketch.update(i.to_le_bytes());
        }
        sketch
    }

    #[test]
    fn test_merge_identity() {
        let empty = FmSketch::builder().build();
        let sketch = sketch_of(0..100, 1000);
        let merged = empty.merge(sketch).unwrap();
        assert_eq!(merged.estimate(), 100);

        let empty = FmSketch::builder().build();
        let merged = merged.merge(empty).unwrap();
        assert_eq!(merged.estimate(), 100);
    }

    #[test]
    fn test_merge_exact_exact_fits() {
        let a = sketch_of(0..60, 200);
        let b = sketch_of(40..100, 200);
        let merged = a.merge(b).unwrap();
        assert!(!merged.is_estimation_mode());
        assert_eq!(merged.estimate(), 100);
    }

    #[test]
    fn test_merge_exact_exact_overflows_to_sketch() {
        let a = sketch_of(0..80, 100);
        let b = sketch_of(80..160, 100);
        let merged = a.merge(b).unwrap();
        assert!(merged.is_estimation_mode());
    }

    #[test]
    fn test_merge_shape_mismatch() {
        let a = sketch_of(0..10, 100);
        let mut b = FmSketch::builder().num_bitmaps(64).exact_capacity(100).build();
        b.update("x");
        let err = a.merge(b).unwrap_err();
        assert_eq!(
            err.kind(),
            crate::error::ErrorKind::IncompatibleSketchShape
        );
    }

    #[test]
    fn test_merge_seed_mismatch() {
        let a = sketch_of(0..10, 100);
        let mut b = FmSketch::builder().seed(7).exact_capacity(100).build();
        b.update("x");
        let err = a.merge(b).unwrap_err();
        assert_eq!(
            err.kind(),
            crate::error::ErrorKind::IncompatibleSketchShape
        );
    }

    #[test]
    fn test_union_folds_partials() {
        let mut union = FmUnion::new();
        union.update(sketch_of(0..30, 500)).unwrap();
        union.update(sketch_of(20..60, 500)).unwrap();
        union.update(FmSketch::builder().build()).unwrap();
        assert_eq!(union.estimate(), 60);
        assert_eq!(union.result().estimate(), 60);
    }

    #[test]
    fn test_union_keeps_state_on_mismatch() {
        let mut union = FmUnion::new();
        union.update(sketch_of(0..30, 500)).unwrap();
        let mut odd = FmSketch::builder().num_bitmaps(16).build();
        odd.update("x");
        assert!(union.update(odd).is_err());
        assert_eq!(union.estimate(), 30);
    }

    #[test]
    fn test_empty_union() {
        let union = FmUnion::new();
        assert_eq!(union.estimate(), 0);
        assert!(union.result().is_empty());
    }
}
