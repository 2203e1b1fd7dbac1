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

//! MSB-first bit streams over a byte buffer.
//!
//! Values are written as their `n` low bits, most significant bit first, and
//! bits fill each byte from its most significant end. Readers return
//! `UnexpectedEof` as soon as a field runs past the end of the input.

use std::io;

pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u32,
}

impl BitWriter {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            current: 0,
            filled: 0,
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u64, 1);
    }

    /// Writes the `n` low bits of `value`.
    pub fn write_bits(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 64, "cannot write more than 64 bits at once");
        let mut remaining = n;
        while remaining > 0 {
            let free = 8 - self.filled;
            let take = free.min(remaining);
            let shift = remaining - take;
            let chunk = ((value >> shift) & ((1u64 << take) - 1)) as u8;
            self.current |= chunk << (free - take);
            self.filled += take;
            remaining -= take;
            if self.filled == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }
    }

    /// Completes the last partial byte with `pad` bits and returns the buffer.
    pub fn flush(mut self, pad: bool) -> Vec<u8> {
        if self.filled > 0 {
            if pad {
                self.current |= ((1u16 << (8 - self.filled)) - 1) as u8;
            }
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

pub(crate) struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
    consumed: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            consumed: 0,
        }
    }

    pub fn read_bit(&mut self) -> io::Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads an `n`-bit field into the low bits of the result.
    pub fn read_bits(&mut self, n: u32) -> io::Result<u64> {
        debug_assert!(n <= 64, "cannot read more than 64 bits at once");
        let mut value = 0u64;
        let mut remaining = n;
        while remaining > 0 {
            let byte = *self.bytes.get(self.position).ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "bit stream exhausted")
            })?;
            let available = 8 - self.consumed;
            let take = available.min(remaining);
            let chunk = (byte >> (available - take)) & ((1u16 << take) - 1) as u8;
            value = (value << take) | chunk as u64;
            self.consumed += take;
            remaining -= take;
            if self.consumed == 8 {
                self.position += 1;
                self.consumed = 0;
            }
        }
        Ok(value)
    }
}
