// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use arrayvec::ArrayVec;
use std::fmt;

/// MQTT Remaining Length: 1-4 bytes, continuation bit in bit 7 of each byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableByteInteger {
    encoded: ArrayVec<u8, 4>,
}

impl VariableByteInteger {
    /// Largest value representable in 4 encoded bytes.
    pub const MAX: u32 = 0x0FFF_FFFF;

    pub fn from_u32(mut value: u32) -> Option<Self> {
        if value > Self::MAX {
            return None;
        }
        let mut buf = ArrayVec::<u8, 4>::new();
        loop {
            let mut byte = (value % 128) as u8;
            value /= 128;
            if value > 0 {
                byte |= 0x80;
            }
            buf.push(byte);
            if value == 0 {
                break;
            }
        }
        Some(Self { encoded: buf })
    }

    pub fn to_u32(&self) -> u32 {
        let mut multiplier = 1u32;
        let mut result = 0u32;
        for &b in &*self.encoded {
            result += u32::from(b & 0x7F) * multiplier;
            multiplier = multiplier.saturating_mul(128);
        }
        result
    }

    pub fn size(&self) -> usize {
        self.encoded.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// One-shot decode of an already-assembled buffer (used by tests and by
    /// callers who already have the whole length field in hand). Streaming
    /// callers drive [`PartialDecoder`] byte by byte instead.
    pub fn decode_stream(buf: &[u8]) -> DecodeResult<Self> {
        let mut decoder = PartialDecoder::new();
        for (i, &b) in buf.iter().enumerate() {
            match decoder.push(b) {
                PushResult::Complete => {
                    return match Self::from_u32(decoder.value()) {
                        Some(vbi) => DecodeResult::Ok(vbi, i + 1),
                        None => DecodeResult::Err("Encoding failure"),
                    };
                }
                PushResult::NeedMore => continue,
                PushResult::Malformed => return DecodeResult::Err("Malformed VariableByteInteger"),
            }
        }
        DecodeResult::Incomplete
    }
}

/// Result of a one-shot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult<T> {
    Ok(T, usize),
    Incomplete,
    Err(&'static str),
}

impl fmt::Display for VariableByteInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u32())
    }
}

/// Byte-at-a-time Remaining Length decoder, driven by [`crate::mqtt::packet::reader::Reader`].
///
/// Mirrors the fixed-header/remaining-length half of the state machine: each
/// call to [`push`](Self::push) consumes exactly one byte and reports whether
/// the length field is still incomplete, has just completed, or is malformed
/// (continuation bit still set on the 4th byte).
#[derive(Debug, Default)]
pub struct PartialDecoder {
    value: u32,
    multiplier: u32,
    bytes_read: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    NeedMore,
    Complete,
    Malformed,
}

impl PartialDecoder {
    pub fn new() -> Self {
        Self {
            value: 0,
            multiplier: 1,
            bytes_read: 0,
        }
    }

    pub fn push(&mut self, byte: u8) -> PushResult {
        self.value += u32::from(byte & 0x7F) * self.multiplier;
        self.bytes_read += 1;

        if byte & 0x80 == 0 {
            return PushResult::Complete;
        }
        if self.bytes_read >= 4 {
            return PushResult::Malformed;
        }
        self.multiplier *= 128;
        PushResult::NeedMore
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}
