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

//! A Flajolet-Martin distinct-count sketch with an exact small-stream mode.
//!
//! The sketch answers "how many distinct values has this stream seen" in
//! fixed space. Small streams are counted exactly; past a threshold the
//! sketch promotes to a probabilistic bit matrix whose estimate carries a
//! known relative error. Partial sketches built over stream partitions
//! merge losslessly with respect to the bit matrix, which makes the sketch
//! suitable for distributed aggregation.
//!
//! See the [`fm`] module for the algorithm and the API.
//!
//! ```rust
//! use fmsketch::fm::FmSketch;
//!
//! let mut sketch = FmSketch::builder().build();
//! for value in ["apple", "banana", "apple", "cherry"] {
//!     sketch.update(value);
//! }
//! assert_eq!(sketch.estimate(), 3);
//!
//! let bytes = sketch.serialize();
//! let restored = FmSketch::deserialize(&bytes).unwrap();
//! assert_eq!(restored.estimate(), 3);
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod error;
pub mod fm;

mod codec;
mod hash;
