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

//! Update and estimation tests for FmSketch

use fmsketch::fm::EXACT_THRESHOLD;
use fmsketch::fm::FmSketch;
use googletest::assert_that;
use googletest::prelude::near;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

// Three standard errors at the default 256 bitmaps (RSE about 4.9%).
const RELATIVE_ERROR_FOR_256_BITMAPS: f64 = 0.15;

#[test]
fn test_empty() {
    let sketch = FmSketch::builder().build();
    assert!(sketch.is_empty());
    assert!(!sketch.is_estimation_mode());
    assert_eq!(sketch.estimate(), 0);
    assert_eq!(sketch.num_retained(), Some(0));
}

#[test]
fn test_few_values() {
    let mut sketch = FmSketch::builder().build();
    for value in ["a", "b", "c"] {
        sketch.update(value);
    }
    assert_eq!(sketch.estimate(), 3);
    assert_eq!(sketch.num_retained(), Some(3));
}

#[test]
fn test_exact_below_threshold_with_duplicates() {
    let mut sketch = FmSketch::builder().build();
    for round in 0..3 {
        for i in 0..2000u64 {
            sketch.update(i.to_le_bytes());
        }
        assert_eq!(sketch.estimate(), 2000, "round {round}");
    }
    assert!(!sketch.is_estimation_mode());
}

#[test]
fn test_promotion_boundary() {
    let mut sketch = FmSketch::builder().exact_capacity(1000).build();
    for i in 0..1000u64 {
        sketch.update(i.to_le_bytes());
    }
    assert!(!sketch.is_estimation_mode());
    assert_eq!(sketch.estimate(), 1000);

    // Duplicates at the boundary never promote.
    for i in 0..1000u64 {
        sketch.update(i.to_le_bytes());
    }
    assert!(!sketch.is_estimation_mode());

    // One more distinct value does.
    sketch.update(1000u64.to_le_bytes());
    assert!(sketch.is_estimation_mode());
    assert_eq!(sketch.num_retained(), None);
}

#[test]
fn test_estimate_after_default_promotion() {
    const N: u64 = EXACT_THRESHOLD as u64 + 1;

    let mut sketch = FmSketch::builder().build();
    for i in 0..N {
        sketch.update(i.to_le_bytes());
    }
    assert!(sketch.is_estimation_mode());
    assert_that!(
        sketch.estimate() as f64,
        near(N as f64, RELATIVE_ERROR_FOR_256_BITMAPS * N as f64)
    );
}

#[test]
fn test_sketch_mode_updates_are_idempotent() {
    let mut sketch = FmSketch::builder().exact_capacity(4).build();
    for i in 0..20u64 {
        sketch.update(i.to_le_bytes());
    }
    assert!(sketch.is_estimation_mode());
    let before = sketch.serialize();

    for i in 0..20u64 {
        sketch.update(i.to_le_bytes());
    }
    assert_eq!(sketch.serialize(), before);
}

#[test]
fn test_estimate_within_error_band() {
    const N: usize = 30000;
    const TRIALS: u64 = 5;

    let mut total = 0.0;
    for trial in 0..TRIALS {
        let mut rng = StdRng::seed_from_u64(trial);
        let mut sketch = FmSketch::builder().build();
        for _ in 0..N {
            // Collisions among random u64 values at this scale are
            // negligible against the estimator's own error.
            sketch.update(rng.r#gen::<u64>().to_le_bytes());
        }
        assert!(sketch.is_estimation_mode());
        let estimate = sketch.estimate() as f64;
        // Four standard errors per trial.
        assert_that!(estimate, near(N as f64, 0.2 * N as f64));
        total += estimate;
    }
    // The mean across trials should land tighter than any single trial.
    assert_that!(total / TRIALS as f64, near(N as f64, 0.1 * N as f64));
}

#[test]
fn test_estimate_grows_with_stream() {
    let mut sketch = FmSketch::builder().exact_capacity(10).build();
    let mut last = 0;
    for chunk in 1..=4u64 {
        for i in (chunk - 1) * 20000..chunk * 20000 {
            sketch.update(i.to_le_bytes());
        }
        let estimate = sketch.estimate();
        assert!(estimate > last, "estimate must grow: {estimate} vs {last}");
        last = estimate;
    }
}
