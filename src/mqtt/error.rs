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

//! Error taxonomy for the broker core. None of these ever reach a remote
//! peer; they are consumed entirely inside [`crate::mqtt::session::Session`]
//! and [`crate::mqtt::broker::Broker`] and only surface as log events.

use thiserror::Error;

use crate::mqtt::packet::{CodecError, ReaderError};

/// Conditions that end a session. Every variant's policy is "close the
/// transport and let the deletion queue reap it" — the type exists so the
/// session boundary has one place to log a specific reason.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("packet reassembly failed: {0}")]
    Reader(#[from] ReaderError),

    #[error("packet field decode failed: {0}")]
    Codec(#[from] CodecError),

    #[error("handshake failed: {0}")]
    HandshakeFailed(&'static str),

    #[error("unknown or unexpected packet type 0x{0:02x}")]
    UnknownPacketType(u8),

    #[error("transport closed")]
    TransportClosed,
}
