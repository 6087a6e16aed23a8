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

//! The transport interface boundary: what [`crate::mqtt::session::Session`]
//! needs from any bidirectional byte stream, and nothing more.
//!
//! Concrete framing (TCP socket I/O, the WebSocket upgrade/frame codec) is
//! out of scope for this crate; `Tcp` and `WebSocket` below are thin adapters
//! that satisfy [`TransportOps`] over a real `tokio::net::TcpStream` /
//! `tokio_tungstenite` stream, kept just detailed enough to compile and to
//! unit-test [`Session`](crate::mqtt::session::Session) against a fake.

use enum_dispatch::enum_dispatch;
use tokio::sync::mpsc;

/// Operations the broker core needs from a connected client's transport.
#[enum_dispatch]
pub trait TransportOps {
    /// Non-blocking write; returns the number of bytes actually written.
    /// Returns 0 on backpressure, never blocks.
    fn send(&mut self, bytes: &[u8]) -> usize;
    /// Whether a `send` is permitted right now.
    fn can_send(&self) -> bool;
    /// Bytes free in the transport's send buffer.
    fn space(&self) -> usize;
    /// Idempotent; triggers an eventual disconnect notification.
    fn close(&mut self);
    fn connected(&self) -> bool;
    /// Diagnostics only.
    fn remote_ip(&self) -> &str;
}

/// Identifies one accepted connection inside [`crate::mqtt::broker::Broker`]'s
/// client registry. The broker core never interprets this beyond identity
/// and lookup; it is assigned by [`Broker::accept_client`](crate::mqtt::broker::Broker::accept_client).
pub type TransportKey = u64;

/// The two transport kinds this deployment accepts, dispatched without a
/// trait object so `Session` stays `Sized` and storable directly in the
/// client registry.
#[enum_dispatch(TransportOps)]
pub enum Transport {
    Tcp(TcpTransport),
    WebSocket(WebSocketTransport),
    /// Used by tests to drive `Session` without real I/O.
    Fake(FakeTransport),
}

/// Plain TCP adapter. The actual `tokio::net::TcpStream` write half lives in
/// a writer task owned by the listener that accepted this connection;
/// `send` hands bytes to it over `outbound` and never blocks. `send_space`
/// is a soft cap on how far ahead of the writer task a session is allowed
/// to get, not a measurement of the kernel socket buffer.
pub struct TcpTransport {
    remote_ip: String,
    connected: bool,
    writable: bool,
    send_space: usize,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl TcpTransport {
    pub fn new(remote_ip: String, send_space: usize, outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            remote_ip,
            connected: true,
            writable: true,
            send_space,
            outbound,
        }
    }

    /// Called by the owning network task when the writer task reports it
    /// has drained enough to accept `space` more bytes.
    pub fn set_writable(&mut self, space: usize) {
        self.writable = true;
        self.send_space = space;
    }
}

impl TransportOps for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> usize {
        if !self.connected || !self.writable || self.send_space < bytes.len() {
            return 0;
        }
        if self.outbound.send(bytes.to_vec()).is_err() {
            self.connected = false;
            return 0;
        }
        self.send_space -= bytes.len();
        if self.send_space == 0 {
            self.writable = false;
        }
        bytes.len()
    }

    fn can_send(&self) -> bool {
        self.connected && self.writable
    }

    fn space(&self) -> usize {
        self.send_space
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn remote_ip(&self) -> &str {
        &self.remote_ip
    }
}

/// WebSocket adapter; wraps a `tokio-tungstenite` stream upstream and speaks
/// MQTT-over-WebSocket binary frames one-for-one with MQTT packets. Bookkeeping
/// mirrors [`TcpTransport`] exactly; only the listener that constructs this
/// differs in how it performs the HTTP upgrade, and `outbound` carries raw
/// MQTT bytes that the writer task wraps in a binary frame.
pub struct WebSocketTransport {
    remote_ip: String,
    connected: bool,
    writable: bool,
    send_space: usize,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl WebSocketTransport {
    pub fn new(remote_ip: String, send_space: usize, outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            remote_ip,
            connected: true,
            writable: true,
            send_space,
            outbound,
        }
    }

    pub fn set_writable(&mut self, space: usize) {
        self.writable = true;
        self.send_space = space;
    }
}

impl TransportOps for WebSocketTransport {
    fn send(&mut self, bytes: &[u8]) -> usize {
        if !self.connected || !self.writable || self.send_space < bytes.len() {
            return 0;
        }
        if self.outbound.send(bytes.to_vec()).is_err() {
            self.connected = false;
            return 0;
        }
        self.send_space -= bytes.len();
        if self.send_space == 0 {
            self.writable = false;
        }
        bytes.len()
    }

    fn can_send(&self) -> bool {
        self.connected && self.writable
    }

    fn space(&self) -> usize {
        self.send_space
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn remote_ip(&self) -> &str {
        &self.remote_ip
    }
}

/// In-memory transport for tests: records every `send` instead of touching
/// real I/O, with a configurable `send_space` so backpressure scenarios can
/// be set up.
pub struct FakeTransport {
    pub sent: Vec<Vec<u8>>,
    pub connected: bool,
    pub writable: bool,
    pub send_space: usize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            connected: true,
            writable: true,
            send_space: usize::MAX,
        }
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportOps for FakeTransport {
    fn send(&mut self, bytes: &[u8]) -> usize {
        if !self.connected || !self.writable || self.send_space < bytes.len() {
            return 0;
        }
        self.send_space -= bytes.len();
        self.sent.push(bytes.to_vec());
        bytes.len()
    }

    fn can_send(&self) -> bool {
        self.connected && self.writable
    }

    fn space(&self) -> usize {
        self.send_space
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn remote_ip(&self) -> &str {
        "127.0.0.1"
    }
}
