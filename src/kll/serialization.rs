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

//! Compact binary encoding of a sketch's levels.
//!
//! Layout, after flattening every level into values sorted ascending with a
//! parallel array of level indices:
//!
//! ```text
//! [u16 LE count]
//! [4-bit width w][count x w-bit level index]        (absent when count == 0)
//! [64-bit first value][per-value delta fields ...]  (absent when count == 0)
//! [PAD_BIT up to the next byte boundary]
//! ```
//!
//! Each value after the first is stored as the XOR of its bit pattern with
//! the previous one: a control bit and, when non-zero, the 12 sign/exponent
//! bits; then the number of leading zeros dropped from the 52-bit mantissa
//! delta (3 bits, or 6 bits behind a set control bit once it exceeds 7);
//! then the remaining mantissa bits. Values are only ever handled as bit
//! patterns, so NaN payloads, signed zeros and infinities survive unchanged.

use std::io;

use super::compactor::Compactor;
use super::compactor::cmp_f64;
use super::helper::MAX_NUM_LEVELS;
use super::helper::checked_total_weight;
use crate::codec::BitReader;
use crate::codec::BitWriter;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;

/// Value of the bits that complete the last partial byte.
pub const PAD_BIT: bool = false;

/// Width of the header holding the bit width of the level indices.
const SMALL_INT_WIDTH_BITS: u32 = 4;
/// Level indices must fit in this many bits.
const MAX_SMALL_INT_BITS: u32 = 15;

const SIGN_EXPONENT_BITS: u32 = 12;
const MANTISSA_BITS: u32 = 52;
const MANTISSA_MASK: u64 = (1 << MANTISSA_BITS) - 1;
/// Drop counts up to this value use the short field.
const MAX_SHORT_DROP: u64 = 7;
const SHORT_DROP_BITS: u32 = 3;
const LONG_DROP_BITS: u32 = 6;

fn make_error(tag: &'static str) -> impl FnOnce(io::Error) -> Error {
    move |err| Error::insufficient_data(tag).set_source(err)
}

fn bit_length(x: u64) -> u32 {
    u64::BITS - x.leading_zeros()
}

/// All retained values sorted ascending, with the level each came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Flat {
    pub values: Vec<f64>,
    pub heights: Vec<u16>,
}

impl Flat {
    pub fn with_len(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
            heights: vec![0; len],
        }
    }

    pub fn from_levels(levels: &[Compactor]) -> Result<Self, Error> {
        let mut pairs = Vec::with_capacity(levels.iter().map(Compactor::len).sum());
        for (height, level) in levels.iter().enumerate() {
            let height = u16::try_from(height)
                .ok()
                .filter(|h| bit_length(*h as u64) <= MAX_SMALL_INT_BITS)
                .ok_or_else(|| {
                    Error::invalid_argument("too many levels to encode")
                        .with_context("height", height)
                })?;
            pairs.extend(level.as_slice().iter().map(|&v| (v, height)));
        }
        // ties are broken on the bit pattern and the level so the encoding
        // does not depend on the order values sit in inside a level
        pairs.sort_by(|a, b| {
            cmp_f64(&a.0, &b.0)
                .then_with(|| a.0.total_cmp(&b.0))
                .then(a.1.cmp(&b.1))
        });
        let (values, heights) = pairs.into_iter().unzip();
        Ok(Self { values, heights })
    }

    /// Scatters values back to their levels, creating any level in between.
    ///
    /// The result always has at least one level.
    pub fn into_levels(self) -> Vec<Compactor> {
        let mut levels = vec![Compactor::new()];
        for (value, height) in self.values.into_iter().zip(self.heights) {
            let height = height as usize;
            if levels.len() <= height {
                levels.resize_with(height + 1, Compactor::new);
            }
            levels[height].push(value);
        }
        levels
    }
}

/// Writes a width header and then every value in that width.
///
/// The length is known out of band, so an empty slice writes nothing.
pub(crate) fn encode_small_ints(writer: &mut BitWriter, values: &[u16]) {
    let Some(max) = values.iter().copied().max() else {
        return;
    };
    let width = bit_length(max as u64);
    debug_assert!(
        width <= MAX_SMALL_INT_BITS,
        "value {max} does not fit in 15 bits"
    );
    writer.write_bits(width as u64, SMALL_INT_WIDTH_BITS);
    for &value in values {
        writer.write_bits(value as u64, width);
    }
}

pub(crate) fn decode_small_ints(
    reader: &mut BitReader<'_>,
    values: &mut [u16],
) -> Result<(), Error> {
    if values.is_empty() {
        return Ok(());
    }
    let width = reader
        .read_bits(SMALL_INT_WIDTH_BITS)
        .map_err(make_error("level_index_width"))? as u32;
    for value in values.iter_mut() {
        *value = reader.read_bits(width).map_err(make_error("level_index"))? as u16;
    }
    Ok(())
}

/// Writes the first value in full and every later one as an XOR delta.
pub(crate) fn encode_floats(writer: &mut BitWriter, values: &[f64]) {
    let Some((first, rest)) = values.split_first() else {
        return;
    };
    let mut prev = first.to_bits();
    writer.write_bits(prev, 64);
    for value in rest {
        let cur = value.to_bits();
        let delta = prev ^ cur;
        prev = cur;

        let sign_exponent = delta >> MANTISSA_BITS;
        if sign_exponent == 0 {
            writer.write_bit(false);
        } else {
            writer.write_bit(true);
            writer.write_bits(sign_exponent, SIGN_EXPONENT_BITS);
        }

        let mantissa = delta & MANTISSA_MASK;
        let significant = bit_length(mantissa);
        let dropped = (MANTISSA_BITS - significant) as u64;
        if dropped > MAX_SHORT_DROP {
            writer.write_bit(true);
            writer.write_bits(dropped, LONG_DROP_BITS);
        } else {
            writer.write_bit(false);
            writer.write_bits(dropped, SHORT_DROP_BITS);
        }
        writer.write_bits(mantissa, significant);
    }
}

pub(crate) fn decode_floats(reader: &mut BitReader<'_>, values: &mut [f64]) -> Result<(), Error> {
    let Some((first, rest)) = values.split_first_mut() else {
        return Ok(());
    };
    let mut prev = reader.read_bits(64).map_err(make_error("first_value"))?;
    *first = f64::from_bits(prev);

    for (index, value) in rest.iter_mut().enumerate() {
        let sign_exponent = if reader.read_bit().map_err(make_error("exponent_flag"))? {
            reader
                .read_bits(SIGN_EXPONENT_BITS)
                .map_err(make_error("exponent"))?
        } else {
            0
        };

        let dropped = if reader.read_bit().map_err(make_error("mantissa_flag"))? {
            reader.read_bits(LONG_DROP_BITS)
        } else {
            reader.read_bits(SHORT_DROP_BITS)
        }
        .map_err(make_error("mantissa_drop"))?;
        if dropped > MANTISSA_BITS as u64 {
            return Err(Error::deserial(format!(
                "mantissa drop count {dropped} exceeds {MANTISSA_BITS}"
            ))
            .with_context("index", index + 1));
        }

        let significant = MANTISSA_BITS - dropped as u32;
        let mantissa = reader
            .read_bits(significant)
            .map_err(make_error("mantissa"))?;
        let cur = prev ^ ((sign_exponent << MANTISSA_BITS) | mantissa);
        prev = cur;
        *value = f64::from_bits(cur);
    }
    Ok(())
}

/// Encodes all levels into the canonical byte layout.
pub(crate) fn encode_levels(levels: &[Compactor]) -> Result<Vec<u8>, Error> {
    let flat = Flat::from_levels(levels)?;
    let count = u16::try_from(flat.values.len()).map_err(|_| {
        Error::invalid_argument(format!(
            "cannot encode {} retained values, at most {} fit the count field",
            flat.values.len(),
            u16::MAX
        ))
    })?;

    // two count bytes, up to 2 bytes per index, at most ~10 bytes per value
    let mut bytes = SketchBytes::with_capacity(2 + flat.values.len() * 12);
    bytes.write_u16_le(count);
    let mut writer = bytes.into_bit_writer();
    encode_small_ints(&mut writer, &flat.heights);
    encode_floats(&mut writer, &flat.values);
    Ok(writer.flush(PAD_BIT))
}

/// Decodes the canonical byte layout into freshly allocated levels.
pub(crate) fn decode_levels(bytes: &[u8]) -> Result<Vec<Compactor>, Error> {
    let mut slice = SketchSlice::new(bytes);
    let count = slice.read_u16_le().map_err(make_error("count"))? as usize;
    let mut flat = Flat::with_len(count);
    let mut reader = slice.into_bit_reader();
    decode_small_ints(&mut reader, &mut flat.heights)?;
    if let Some(&height) = flat
        .heights
        .iter()
        .find(|&&height| height as usize >= MAX_NUM_LEVELS)
    {
        return Err(Error::deserial(format!(
            "level index {height} exceeds the {MAX_NUM_LEVELS} levels a sketch can hold"
        ))
        .with_context("height", height));
    }
    decode_floats(&mut reader, &mut flat.values)?;

    let levels = flat.into_levels();
    let sizes = levels.iter().map(Compactor::len);
    if checked_total_weight(sizes).is_none() {
        return Err(Error::deserial(
            "total weight of the decoded levels overflows u64",
        ));
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn round_trip_small_ints(values: &[u16]) -> Vec<u16> {
        let mut writer = BitWriter::new(Vec::new());
        encode_small_ints(&mut writer, values);
        let bytes = writer.flush(true);
        let mut decoded = vec![0u16; values.len()];
        decode_small_ints(&mut BitReader::new(&bytes), &mut decoded).unwrap();
        decoded
    }

    fn round_trip_floats(values: &[f64]) -> Vec<f64> {
        let mut writer = BitWriter::new(Vec::new());
        encode_floats(&mut writer, values);
        let bytes = writer.flush(true);
        let mut decoded = vec![0.0; values.len()];
        decode_floats(&mut BitReader::new(&bytes), &mut decoded).unwrap();
        decoded
    }

    #[test]
    fn test_small_ints_round_trip() {
        let cases: [&[u16]; 11] = [
            &[],
            &[0],
            &[0, 0],
            &[0, 0, 0, 0],
            &[1],
            &[0, 1],
            &[1, 0],
            &[0, 1, 1, 2, 2, 2],
            &[1000, 100, 1],
            &[(1 << 15) - 1, 0],
            &[0, (1 << 15) - 1, 0],
        ];
        for case in cases {
            assert_eq!(round_trip_small_ints(case), case);
        }
    }

    #[test]
    fn test_small_ints_layout() {
        let mut writer = BitWriter::new(Vec::new());
        encode_small_ints(&mut writer, &[]);
        assert!(writer.flush(false).is_empty());

        // width 0 still writes the header
        let mut writer = BitWriter::new(Vec::new());
        encode_small_ints(&mut writer, &[0, 0, 0]);
        assert_eq!(writer.flush(false), vec![0x00]);

        // width 2: 0010 | 01 10 11 | pad
        let mut writer = BitWriter::new(Vec::new());
        encode_small_ints(&mut writer, &[1, 2, 3]);
        assert_eq!(writer.flush(false), vec![0b0010_0110, 0b1100_0000]);
    }

    #[test]
    fn test_floats_round_trip_bit_exact() {
        let cases: [&[f64]; 13] = [
            &[],
            &[0.0],
            &[0.0, 0.0],
            &[1.0],
            &[0.0, 1.0],
            &[1.0, 0.0],
            &[0.0, 1.0, 1.0, 2.0, 2.0, 2.0],
            &[-1e6, 1.0, 1e6, f64::NEG_INFINITY, f64::INFINITY],
            &[f64::NAN],
            &[1.0, f64::NAN, -0.0, 0.0, f64::MIN_POSITIVE, f64::MAX],
            &[0.1, 0.2, 0.30000000000000004, 1.0 / 3.0, 2.0 / 3.0],
            &[1.5, 1.5000000000000002, 3.0, -3.0, 5e-324],
            &[f64::from_bits(0x7ff8_0000_dead_beef), -0.0, f64::NAN],
        ];
        for case in cases {
            let decoded = round_trip_floats(case);
            assert_eq!(decoded.len(), case.len());
            for (got, want) in decoded.iter().zip(case.iter()) {
                assert_eq!(got.to_bits(), want.to_bits(), "{case:?}");
            }
        }
    }

    #[test]
    fn test_floats_layout() {
        // 1.0 then 1.0: exponent control 0, all 52 mantissa bits dropped in
        // the long form 1_110100, no mantissa bits
        let mut writer = BitWriter::new(Vec::new());
        encode_floats(&mut writer, &[1.0, 1.0]);
        let bytes = writer.flush(false);
        assert_eq!(&bytes[..8], &1.0f64.to_bits().to_be_bytes());
        assert_eq!(bytes[8], 0b0111_0100);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn test_truncated_floats_fail() {
        let mut writer = BitWriter::new(Vec::new());
        encode_floats(&mut writer, &[1.0, 2.5, -7.25]);
        let bytes = writer.flush(false);
        for len in 0..bytes.len() - 1 {
            let mut decoded = vec![0.0; 3];
            let result = decode_floats(&mut BitReader::new(&bytes[..len]), &mut decoded);
            assert!(result.is_err(), "prefix of {len} bytes decoded");
        }
    }

    #[test]
    fn test_malformed_drop_count() {
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bits(0, 64);
        writer.write_bit(false);
        writer.write_bit(true);
        writer.write_bits(60, LONG_DROP_BITS);
        let bytes = writer.flush(false);
        let mut decoded = vec![0.0; 2];
        let err = decode_floats(&mut BitReader::new(&bytes), &mut decoded).unwrap_err();
        assert!(err.message().contains("exceeds"));
    }

    #[test]
    fn test_flat_scatter_materializes_gaps() {
        let flat = Flat {
            values: vec![1.0, 2.0, 3.0],
            heights: vec![3, 0, 3],
        };
        let levels = flat.into_levels();
        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0].as_slice(), &[2.0]);
        assert_eq!(levels[1].len(), 0);
        assert_eq!(levels[2].len(), 0);
        assert_eq!(levels[3].as_slice(), &[1.0, 3.0]);

        assert_eq!(Flat::default().into_levels().len(), 1);
    }

    #[test]
    fn test_levels_round_trip() {
        let levels = vec![
            Compactor::from_values(vec![5.0, -1.0]),
            Compactor::new(),
            Compactor::from_values(vec![2.0, 2.0, f64::INFINITY]),
        ];
        let bytes = encode_levels(&levels).unwrap();
        assert_eq!(&bytes[..2], &[5, 0]);
        let decoded = decode_levels(&bytes).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].as_slice(), &[-1.0, 5.0]);
        assert_eq!(decoded[1].len(), 0);
        assert_eq!(decoded[2].as_slice(), &[2.0, 2.0, f64::INFINITY]);
    }

    #[test]
    fn test_empty_levels_encode_to_count_only() {
        let bytes = encode_levels(&[Compactor::new()]).unwrap();
        assert_eq!(bytes, vec![0, 0]);
        let decoded = decode_levels(&bytes).unwrap();
        assert_eq!(decoded, vec![Compactor::new()]);
    }

    #[test]
    fn test_decode_rejects_level_index_beyond_u64_weights() {
        let mut levels = vec![Compactor::new(); MAX_NUM_LEVELS + 1];
        levels[MAX_NUM_LEVELS].push(1.0);
        let bytes = encode_levels(&levels).unwrap();

        let err = decode_levels(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        assert!(err.to_string().contains("height: 64"), "{err}");
    }

    #[test]
    fn test_decode_rejects_overflowing_total_weight() {
        let mut levels = vec![Compactor::new(); MAX_NUM_LEVELS];
        levels[MAX_NUM_LEVELS - 1].push(1.0);
        let bytes = encode_levels(&levels).unwrap();
        let decoded = decode_levels(&bytes).unwrap();
        assert_eq!(decoded.len(), MAX_NUM_LEVELS);

        levels[MAX_NUM_LEVELS - 1].push(2.0);
        let bytes = encode_levels(&levels).unwrap();
        let err = decode_levels(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        assert!(err.message().contains("overflows"), "{err}");
    }
}
