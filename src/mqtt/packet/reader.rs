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

//! Resumable MQTT control packet reassembly.
//!
//! [`Reader`] reconstructs one complete control packet at a time from an
//! arbitrarily fragmented byte stream, firing a callback each time the Fixed
//! Header and the full Remaining Length worth of bytes have arrived.

use thiserror::Error;

use super::variable_byte_integer::{PartialDecoder, PushResult};

/// Fatal conditions a [`Reader`] can report. Both close the owning transport.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    #[error("malformed remaining length: continuation bit still set on 4th byte")]
    MalformedRemainingLength,
    #[error("failed to allocate {0} bytes for the packet body")]
    AllocationFailed(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingFixedHeader,
    WaitingRemainingLength,
    WaitingRemainingPacket,
}

/// Byte-stream -> one-packet-at-a-time reassembler.
///
/// Construct once per [`Session`](crate::mqtt::session::Session) and feed it
/// every byte that arrives on that session's transport; `Reader` has no
/// notion of which session it belongs to.
pub struct Reader {
    state: State,
    fixed_header: u8,
    length_decoder: PartialDecoder,
    remaining_length: u32,
    buffer: Vec<u8>,
    filled: usize,
}

impl Reader {
    pub fn new() -> Self {
        Self {
            state: State::WaitingFixedHeader,
            fixed_header: 0,
            length_decoder: PartialDecoder::new(),
            remaining_length: 0,
            buffer: Vec::new(),
            filled: 0,
        }
    }

    /// Return to `WaitingFixedHeader`, releasing any allocated packet buffer.
    pub fn reset(&mut self) {
        self.state = State::WaitingFixedHeader;
        self.fixed_header = 0;
        self.length_decoder = PartialDecoder::new();
        self.remaining_length = 0;
        self.buffer = Vec::new();
        self.filled = 0;
    }

    /// The Fixed Header byte of the packet currently ready. Valid only
    /// during (or immediately after) the `on_packet_ready` callback.
    pub fn fixed_header(&self) -> u8 {
        self.fixed_header
    }

    /// The decoded Remaining Length of the packet currently ready.
    pub fn remaining_length(&self) -> u32 {
        self.remaining_length
    }

    /// The packet body, exactly `remaining_length()` bytes.
    pub fn remaining_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed zero or more bytes, possibly crossing several complete packets.
    ///
    /// `on_packet_ready` is invoked once per complete packet, in arrival
    /// order, with `self` positioned so [`fixed_header`](Self::fixed_header)
    /// and [`remaining_bytes`](Self::remaining_bytes) describe that packet;
    /// the reader resets to `WaitingFixedHeader` immediately after the
    /// callback returns.
    ///
    /// Returns the number of bytes consumed before any fatal error; on the
    /// successful path this always equals `bytes.len()`.
    pub fn feed(
        &mut self,
        bytes: &[u8],
        mut on_packet_ready: impl FnMut(&Reader),
    ) -> Result<usize, ReaderError> {
        let mut idx = 0;
        while idx < bytes.len() {
            let byte = bytes[idx];
            match self.state {
                State::WaitingFixedHeader => {
                    self.fixed_header = byte;
                    self.length_decoder = PartialDecoder::new();
                    self.state = State::WaitingRemainingLength;
                    idx += 1;
                }
                State::WaitingRemainingLength => {
                    match self.length_decoder.push(byte) {
                        PushResult::NeedMore => {
                            idx += 1;
                        }
                        PushResult::Malformed => {
                            idx += 1;
                            self.reset();
                            return Err(ReaderError::MalformedRemainingLength);
                        }
                        PushResult::Complete => {
                            idx += 1;
                            self.remaining_length = self.length_decoder.value();
                            if self.remaining_length == 0 {
                                on_packet_ready(self);
                                self.reset();
                            } else {
                                self.buffer
                                    .try_reserve_exact(self.remaining_length as usize)
                                    .map_err(|_| {
                                        let len = self.remaining_length;
                                        self.reset();
                                        ReaderError::AllocationFailed(len)
                                    })?;
                                self.buffer.resize(self.remaining_length as usize, 0);
                                self.filled = 0;
                                self.state = State::WaitingRemainingPacket;
                            }
                        }
                    }
                }
                State::WaitingRemainingPacket => {
                    let needed = self.remaining_length as usize - self.filled;
                    let available = bytes.len() - idx;
                    let to_copy = needed.min(available);
                    self.buffer[self.filled..self.filled + to_copy]
                        .copy_from_slice(&bytes[idx..idx + to_copy]);
                    self.filled += to_copy;
                    idx += to_copy;

                    if self.filled == self.remaining_length as usize {
                        on_packet_ready(self);
                        self.reset();
                    }
                }
            }
        }
        Ok(idx)
    }
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}
