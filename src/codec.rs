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

//! Little-endian byte writer/reader for the sketch wire format.

use std::io;
use std::io::Cursor;
use std::io::Read;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        // Writing into a Vec cannot fail.
        WriteBytesExt::write_u8(&mut self.bytes, n).expect("write to Vec");
    }

    pub fn write_u16_le(&mut self, n: u16) {
        self.bytes
            .write_u16::<LittleEndian>(n)
            .expect("write to Vec");
    }

    pub fn write_u32_le(&mut self, n: u32) {
        self.bytes
            .write_u32::<LittleEndian>(n)
            .expect("write to Vec");
    }

    pub fn write_u64_le(&mut self, n: u64) {
        self.bytes
            .write_u64::<LittleEndian>(n)
            .expect("write to Vec");
    }
}

pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl SketchSlice<'_> {
    pub fn new(slice: &[u8]) -> SketchSlice<'_> {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        let len = self.slice.get_ref().len() as u64;
        len.saturating_sub(self.slice.position()) as usize
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        ReadBytesExt::read_u8(&mut self.slice)
    }

    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        self.slice.read_u16::<LittleEndian>()
    }

    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.slice.read_u32::<LittleEndian>()
    }

    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        self.slice.read_u64::<LittleEndian>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut bytes = SketchBytes::with_capacity(32);
        bytes.write_u8(7);
        bytes.write_u16_le(0x1234);
        bytes.write_u32_le(0xDEAD_BEEF);
        bytes.write_u64_le(u64::MAX - 1);
        bytes.write(b"abc");
        let buf = bytes.into_bytes();

        let mut slice = SketchSlice::new(&buf);
        assert_eq!(slice.read_u8().unwrap(), 7);
        assert_eq!(slice.read_u16_le().unwrap(), 0x1234);
        assert_eq!(slice.read_u32_le().unwrap(), 0xDEAD_BEEF);
        assert_eq!(slice.read_u64_le().unwrap(), u64::MAX - 1);
        let mut tail = [0u8; 3];
        slice.read_exact(&mut tail).unwrap();
        assert_eq!(&tail, b"abc");
    }

    #[test]
    fn test_read_past_end() {
        let mut slice = SketchSlice::new(&[1, 2]);
        assert_eq!(slice.remaining(), 2);
        assert!(slice.read_u32_le().is_err());
    }
}
