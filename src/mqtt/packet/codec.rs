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

//! Field-level decode/encode helpers over an already-reassembled packet body.
//!
//! These operate on the `remaining_bytes()` slice a [`super::reader::Reader`]
//! hands back once a packet is complete; every decode index past the end of
//! the slice is reported as [`CodecError::OutOfBounds`], which callers treat
//! as a fatal per-session error (§7: close the transport).

use super::fixed_header::FixedHeader;
use super::variable_byte_integer::VariableByteInteger;
use crate::mqtt::common::Cursor;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("decode index out of bounds")]
    OutOfBounds,
}

/// Decode a big-endian `u16` at `at`, returning the value and `at + 2`.
pub fn decode_uint16(buf: &[u8], at: usize) -> Result<(u16, usize), CodecError> {
    let mut cursor = Cursor::new(buf);
    cursor.set_position(at as u64);
    let mut raw = [0u8; 2];
    cursor
        .read_exact(&mut raw)
        .map_err(|_| CodecError::OutOfBounds)?;
    Ok((u16::from_be_bytes(raw), cursor.position() as usize))
}

/// Decode an MQTT-style length-prefixed UTF-8 string at `at`.
pub fn decode_text(buf: &[u8], at: usize) -> Result<(String, usize), CodecError> {
    let (len, body_at) = decode_uint16(buf, at)?;
    let mut cursor = Cursor::new(buf);
    cursor.set_position(body_at as u64);
    let bytes = cursor
        .read_bytes(len as usize)
        .ok_or(CodecError::OutOfBounds)?;
    Ok((String::from_utf8_lossy(bytes).into_owned(), cursor.position() as usize))
}

/// Decode a SUBSCRIBE/PUBLISH topic field (no requested-QoS byte consumed).
pub fn decode_topic(buf: &[u8], at: usize) -> Result<(String, usize), CodecError> {
    decode_text(buf, at)
}

/// Everything from `from` to the end of the packet body.
pub fn decode_payload(buf: &[u8], from: usize) -> Result<&[u8], CodecError> {
    let mut cursor = Cursor::new(buf);
    cursor.set_position(from as u64);
    if from > buf.len() {
        return Err(CodecError::OutOfBounds);
    }
    Ok(cursor.remaining_slice())
}

/// Serialize a QoS 0 PUBLISH: `0x30`, remaining length, topic, payload.
pub fn encode_publish(topic: &str, payload: &[u8]) -> Vec<u8> {
    let topic_bytes = topic.as_bytes();
    let remaining = 2 + topic_bytes.len() + payload.len();
    let vbi = VariableByteInteger::from_u32(remaining as u32)
        .expect("publish remaining length fits in a 4-byte VBI for any realistic topic/payload");

    let mut out = Vec::with_capacity(1 + vbi.size() + remaining);
    out.push(FixedHeader::Publish.as_u8());
    out.extend_from_slice(vbi.as_bytes());
    out.extend_from_slice(&(topic_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(topic_bytes);
    out.extend_from_slice(payload);
    out
}

/// `0x20 0x02 0x00 0x00` — accept, no session present, reason code 0.
pub fn encode_connack() -> [u8; 4] {
    [FixedHeader::Connack.as_u8(), 0x02, 0x00, 0x00]
}

/// `0xD0 0x00`.
pub fn encode_pingresp() -> [u8; 2] {
    [FixedHeader::Pingresp.as_u8(), 0x00]
}

/// SUBACK: `0x90`, remaining length `2 + N`, packet id (MSB first), then N
/// return-code bytes (always `0x00`, since every filter is accepted at QoS 0).
pub fn encode_suback(packet_id: u16, filter_count: usize) -> Vec<u8> {
    let remaining = 2 + filter_count;
    let vbi = VariableByteInteger::from_u32(remaining as u32)
        .expect("suback remaining length fits in a 4-byte VBI for any realistic subscribe list");

    let mut out = Vec::with_capacity(1 + vbi.size() + remaining);
    out.push(FixedHeader::Suback.as_u8());
    out.extend_from_slice(vbi.as_bytes());
    out.extend_from_slice(&packet_id.to_be_bytes());
    out.extend(std::iter::repeat(0x00u8).take(filter_count));
    out
}

/// UNSUBACK: `0xB0`, remaining length `2`, packet id (MSB first).
pub fn encode_unsuback(packet_id: u16) -> [u8; 4] {
    let [hi, lo] = packet_id.to_be_bytes();
    [FixedHeader::Unsuback.as_u8(), 0x02, hi, lo]
}
