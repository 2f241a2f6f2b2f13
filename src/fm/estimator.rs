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

//! Flajolet-Martin estimation from a bit matrix.

use crate::fm::PHI;
use crate::fm::bitmap::BitmapArray;

/// Estimate the distinct count encoded in `bitmaps`.
///
/// Sums the leading-ones run length over all bitmap trials and applies the
/// FM magic formula `ceil((m / phi) * 2^(S / m))`. The result is a biased
/// but corrected estimator; the expected relative standard error is about
/// `0.78 / sqrt(m)` for `m` bitmaps.
pub(crate) fn estimate(bitmaps: &BitmapArray) -> u64 {
    let m = bitmaps.num_bitmaps() as f64;
    let s = bitmaps.run_length_sum() as f64;
    ((m / PHI) * (s / m).exp2()).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fm::NUM_BITMAPS;

    #[test]
    fn test_zero_matrix_floor() {
        // With no runs at all the formula bottoms out at m / phi.
        let bitmaps = BitmapArray::new(NUM_BITMAPS);
        assert_eq!(estimate(&bitmaps), (256.0f64 / PHI).ceil() as u64);
    }

    #[test]
    fn test_estimate_doubles_per_mean_run_bit() {
        // Adding one to every row's run length doubles the estimate.
        let mut bitmaps = BitmapArray::new(4);
        assert_eq!(estimate(&bitmaps), (4.0 / PHI).ceil() as u64);
        for row in 0..4u64 {
            // A digest with rmost = 0 routed to each row sets its MSB.
            bitmaps.insert((1, row));
        }
        assert_eq!(estimate(&bitmaps), (4.0 / PHI * 2.0).ceil() as u64);
    }
}
