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

//! Flajolet-Martin sketch for distinct-count estimation.
//!
//! # Overview
//!
//! The FM sketch is based on the idea of a bitmap whose bits are turned on
//! by hashes of values in the domain, arranged so that moving left to right
//! the expected number of domain values that can turn on a bit decreases
//! exponentially. After hashing all values this way, the location of the
//! first 0 from the left of the bitmap is correlated with the number of
//! distinct values. The estimate is smoothed across [`NUM_BITMAPS`]
//! independent bitmap trials.
//!
//! The FM technique works poorly on small inputs, so the sketch explicitly
//! stores the first [`EXACT_THRESHOLD`] distinct serialized values in a
//! sorted in-memory structure and answers exactly from it. The moment one
//! more distinct value arrives, the stored values are replayed through the
//! FM insertion algorithm and the sketch irreversibly switches to
//! probabilistic mode.
//!
//! # Accuracy
//!
//! Below the threshold the count is exact. Above it the estimate is
//! probabilistic with relative standard error of roughly
//! `0.78 / sqrt(NUM_BITMAPS)` (about 4.9% at the default 256 bitmaps).
//! Deviations within a few standard errors are expected behavior, not a
//! defect.
//!
//! # Merging partial states
//!
//! Sketches built independently over partitions of a stream combine through
//! [`FmSketch::merge`] or [`FmUnion`], in any order and grouping. Merging
//! is the only correct way to combine partials; concatenating streams into
//! one sketch or adding estimates is not.
//!
//! # Usage
//!
//! ```rust
//! # use fmsketch::fm::FmSketch;
//! let mut sketch = FmSketch::builder().build();
//! sketch.update("apple");
//! sketch.update("banana");
//! sketch.update("apple");
//! assert_eq!(sketch.estimate(), 2);
//! ```

mod bitmap;
mod estimator;
mod exact;
mod serialization;
mod sketch;
mod union;

pub use sketch::FmSketch;
pub use sketch::FmSketchBuilder;
pub use union::FmUnion;

/// Number of independent bitmap trials (default). Each inserted value
/// updates exactly one bitmap, per the original FM design.
pub const NUM_BITMAPS: u16 = 256;

/// Bit width of each bitmap. Equals the digest width and is not
/// configurable: bit `k` from the most-significant end is set with
/// probability `2^-(k+1)`.
pub const BITMAP_BITS: u16 = 128;

/// Distinct-value count at which the sketch promotes from exact tracking
/// to FM bitmaps (default). Empirically, FM estimates fall below ~1% error
/// around 12k distinct values.
pub const EXACT_THRESHOLD: u32 = 1024 * 12;

/// Flajolet-Martin's empirical bias-correction constant.
pub(crate) const PHI: f64 = 0.77351;
