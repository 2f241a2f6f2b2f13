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

//! Wire format for persisted FM sketches.
//!
//! A flat little-endian blob with an 8-byte preamble followed by a payload
//! whose layout depends on the mode byte:
//!
//! ```text
//! byte 0    : preamble byte count (8)
//! byte 1    : serial version (1)
//! byte 2    : family id (21)
//! byte 3    : mode (0 = exact, 1 = sketch)
//! byte 4    : flags (bit 0 = empty)
//! byte 5    : unused
//! bytes 6-7 : seed hash
//!
//! exact payload:
//!   u32 exact_capacity, u16 num_bitmaps, u16 pad, u32 num_values,
//!   then per value: u32 length + bytes, in sorted order
//!
//! sketch payload:
//!   u32 exact_capacity, u16 num_bitmaps, u16 bitmap width (128),
//!   then num_bitmaps rows of two u64 words
//! ```
//!
//! The seed itself is never stored; a 16-bit hash of it is, and
//! deserialization rejects a blob whose seed hash does not match the seed
//! the caller expects to use.

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::fm::BITMAP_BITS;
use crate::fm::FmSketch;
use crate::fm::bitmap::BitmapArray;
use crate::fm::exact::ExactStore;
use crate::fm::sketch::Mode;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;

const PREAMBLE_BYTES: u8 = 8;
const SERIAL_VERSION: u8 = 1;
const FAMILY_FM: u8 = 21;

const MODE_EXACT: u8 = 0;
const MODE_SKETCH: u8 = 1;

const FLAG_EMPTY: u8 = 1;

impl FmSketch {
    /// Serialize the sketch into a byte vector.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fmsketch::fm::FmSketch;
    /// let mut sketch = FmSketch::builder().build();
    /// sketch.update("apple");
    /// let bytes = sketch.serialize();
    /// let restored = FmSketch::deserialize(&bytes).unwrap();
    /// assert_eq!(restored.estimate(), 1);
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let payload_size = match self.mode() {
            Mode::Exact(store) => 12 + store.iter().map(|v| 4 + v.len()).sum::<usize>(),
            Mode::Sketch(bitmaps) => 8 + bitmaps.words().len() * 8,
        };
        let mut bytes = SketchBytes::with_capacity(PREAMBLE_BYTES as usize + payload_size);

        bytes.write_u8(PREAMBLE_BYTES);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(FAMILY_FM);
        bytes.write_u8(match self.mode() {
            Mode::Exact(_) => MODE_EXACT,
            Mode::Sketch(_) => MODE_SKETCH,
        });
        bytes.write_u8(if self.is_empty() { FLAG_EMPTY } else { 0 });
        bytes.write_u8(0);
        bytes.write_u16_le(compute_seed_hash(self.seed()));

        bytes.write_u32_le(self.exact_capacity());
        bytes.write_u16_le(self.num_bitmaps());
        match self.mode() {
            Mode::Exact(store) => {
                bytes.write_u16_le(0);
                bytes.write_u32_le(store.len() as u32);
                for value in store.iter() {
                    bytes.write_u32_le(value.len() as u32);
                    bytes.write(value);
                }
            }
            Mode::Sketch(bitmaps) => {
                bytes.write_u16_le(BITMAP_BITS);
                for word in bitmaps.words() {
                    bytes.write_u64_le(*word);
                }
            }
        }
        bytes.into_bytes()
    }

    /// Deserialize a sketch hashed under the default update seed.
    pub fn deserialize(bytes: &[u8]) -> Result<FmSketch, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize a sketch, verifying it was hashed under `seed`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::MalformedState`](crate::error::ErrorKind)
    /// when the blob is truncated, carries an unknown family, version, or
    /// mode tag, stores exact values out of order, declares a bitmap width
    /// other than 128, or was produced under a different seed.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<FmSketch, Error> {
        let mut slice = SketchSlice::new(bytes);

        let preamble_bytes = slice
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble").set_source(e))?;
        if preamble_bytes != PREAMBLE_BYTES {
            return Err(Error::malformed(format!(
                "unexpected preamble byte count: expected {PREAMBLE_BYTES}, got {preamble_bytes}"
            )));
        }
        let serial_version = slice
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble").set_source(e))?;
        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }
        let family = slice
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble").set_source(e))?;
        if family != FAMILY_FM {
            return Err(Error::invalid_family(FAMILY_FM, family, "FM"));
        }
        let mode = slice
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble").set_source(e))?;
        let flags = slice
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble").set_source(e))?;
        let _unused = slice
            .read_u8()
            .map_err(|e| Error::insufficient_data("preamble").set_source(e))?;
        let seed_hash = slice
            .read_u16_le()
            .map_err(|e| Error::insufficient_data("preamble").set_source(e))?;
        let expected_hash = compute_seed_hash(seed);
        if seed_hash != expected_hash {
            return Err(Error::malformed("seed hash mismatch")
                .with_context("expected", expected_hash)
                .with_context("actual", seed_hash));
        }

        let exact_capacity = slice
            .read_u32_le()
            .map_err(|e| Error::insufficient_data("payload header").set_source(e))?;
        let num_bitmaps = slice
            .read_u16_le()
            .map_err(|e| Error::insufficient_data("payload header").set_source(e))?;
        if exact_capacity == 0 || num_bitmaps == 0 {
            return Err(Error::malformed("zero-sized sketch configuration")
                .with_context("exact_capacity", exact_capacity)
                .with_context("num_bitmaps", num_bitmaps));
        }

        let mode = match mode {
            MODE_EXACT => {
                let store = read_exact_payload(&mut slice, exact_capacity, flags)?;
                Mode::Exact(store)
            }
            MODE_SKETCH => {
                if flags & FLAG_EMPTY != 0 {
                    return Err(Error::malformed("sketch mode cannot be empty"));
                }
                let bitmaps = read_sketch_payload(&mut slice, num_bitmaps)?;
                Mode::Sketch(bitmaps)
            }
            _ => {
                return Err(Error::malformed(format!("unknown mode tag: {mode}")));
            }
        };

        Ok(FmSketch::from_parts(num_bitmaps, exact_capacity, seed, mode))
    }
}

fn read_exact_payload(
    slice: &mut SketchSlice<'_>,
    exact_capacity: u32,
    flags: u8,
) -> Result<ExactStore, Error> {
    let _pad = slice
        .read_u16_le()
        .map_err(|e| Error::insufficient_data("payload header").set_source(e))?;
    let num_values = slice
        .read_u32_le()
        .map_err(|e| Error::insufficient_data("payload header").set_source(e))?;
    if flags & FLAG_EMPTY != 0 && num_values != 0 {
        return Err(Error::malformed("empty flag set on a non-empty store")
            .with_context("num_values", num_values));
    }

    let mut store = ExactStore::with_capacity(exact_capacity);
    let mut prev: Option<Vec<u8>> = None;
    for _ in 0..num_values {
        let len = slice
            .read_u32_le()
            .map_err(|e| Error::insufficient_data("value length").set_source(e))?
            as usize;
        if len > slice.remaining() {
            return Err(Error::insufficient_data("value bytes")
                .with_context("declared_len", len)
                .with_context("remaining", slice.remaining()));
        }
        let mut value = vec![0u8; len];
        slice
            .read_exact(&mut value)
            .map_err(|e| Error::insufficient_data("value bytes").set_source(e))?;
        if let Some(prev) = &prev
            && prev.as_slice() >= value.as_slice()
        {
            return Err(Error::malformed(
                "exact values out of order or duplicated",
            ));
        }
        if store.try_insert(&value).is_err() {
            return Err(Error::malformed("more values than exact capacity")
                .with_context("exact_capacity", exact_capacity)
                .with_context("num_values", num_values));
        }
        prev = Some(value);
    }
    Ok(store)
}

fn read_sketch_payload(
    slice: &mut SketchSlice<'_>,
    num_bitmaps: u16,
) -> Result<BitmapArray, Error> {
    let bitmap_bits = slice
        .read_u16_le()
        .map_err(|e| Error::insufficient_data("payload header").set_source(e))?;
    if bitmap_bits != BITMAP_BITS {
        return Err(Error::malformed("unsupported bitmap width")
            .with_context("expected", BITMAP_BITS)
            .with_context("actual", bitmap_bits));
    }

    let word_count = num_bitmaps as usize * (BITMAP_BITS / 64) as usize;
    if slice.remaining() < word_count * 8 {
        return Err(Error::insufficient_data("bitmap rows")
            .with_context("expected_bytes", word_count * 8)
            .with_context("remaining", slice.remaining()));
    }
    let mut words = Vec::with_capacity(word_count);
    for _ in 0..word_count {
        let word = slice
            .read_u64_le()
            .map_err(|e| Error::insufficient_data("bitmap rows").set_source(e))?;
        words.push(word);
    }
    Ok(BitmapArray::from_words(num_bitmaps, words.into_boxed_slice()))
}
