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

//! Per-client state: handshake, keep-alive, outbox, packet dispatch.

use std::collections::{HashSet, VecDeque};

use getset::Getters;

use crate::mqtt::common::tracing_macros::warn;
use crate::mqtt::error::BrokerError;
use crate::mqtt::packet::{codec, decode_payload, decode_topic, decode_uint16, CodecError, PacketType, Reader};
use crate::mqtt::transport::{Transport, TransportOps};

/// A subscribe/publish/unsubscribe request the broker-wide [`Worker`] must
/// act on, or a request to close this session. Produced by
/// [`Session::handle_inbound`]; the caller (the network task, or a direct
/// test harness) is responsible for routing each variant to the right
/// place — `Session` itself never touches the broker's registry or trie.
///
/// [`Worker`]: crate::mqtt::pipeline::Worker
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    Publish(PublishMessage),
    Subscribe(SubscribeMessage),
    Unsubscribe(UnsubscribeMessage),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeMessage {
    pub packet_id: u16,
    pub filters: Vec<(String, u8)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeMessage {
    pub packet_id: u16,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Connected,
}

/// Broker-side state for one connected MQTT client.
#[derive(Getters)]
pub struct Session {
    #[getset(get = "pub")]
    id: u64,
    #[getset(get = "pub")]
    state: SessionState,
    keep_alive_seconds: u16,
    last_activity_ms: u64,
    reader: Reader,
    outbox: VecDeque<Vec<u8>>,
    outbox_capacity: usize,
    subscribed_filters: HashSet<String>,
    transport: Transport,
}

impl Session {
    pub fn new(id: u64, transport: Transport, outbox_capacity: usize, now_ms: u64) -> Self {
        Self {
            id,
            state: SessionState::Pending,
            keep_alive_seconds: 0,
            last_activity_ms: now_ms,
            reader: Reader::new(),
            outbox: VecDeque::new(),
            outbox_capacity,
            subscribed_filters: HashSet::new(),
            transport,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn subscribed_filters(&self) -> &HashSet<String> {
        &self.subscribed_filters
    }

    pub fn note_subscribed(&mut self, filter: String) {
        self.subscribed_filters.insert(filter);
    }

    pub fn note_unsubscribed(&mut self, filter: &str) {
        self.subscribed_filters.remove(filter);
    }

    /// Feed inbound bytes and return the actions the broker must take for
    /// every complete packet found. Also drains into the outbox directly
    /// for packets this session can answer unilaterally (PINGRESP).
    pub fn handle_inbound(&mut self, bytes: &[u8], now_ms: u64) -> Vec<SessionAction> {
        let mut ready: Vec<(u8, Vec<u8>)> = Vec::new();
        let feed_result = self.reader.feed(bytes, |reader| {
            ready.push((reader.fixed_header(), reader.remaining_bytes().to_vec()));
        });

        let mut actions = Vec::new();
        if let Err(err) = feed_result {
            warn!(session_id = self.id, error = %BrokerError::from(err), "closing session");
            actions.push(SessionAction::Close);
            return actions;
        }

        for (fixed_header, body) in ready {
            self.dispatch_packet(fixed_header, &body, now_ms, &mut actions);
            if matches!(actions.last(), Some(SessionAction::Close)) {
                break;
            }
        }
        actions
    }

    fn dispatch_packet(
        &mut self,
        fixed_header: u8,
        body: &[u8],
        now_ms: u64,
        actions: &mut Vec<SessionAction>,
    ) {
        match self.state {
            SessionState::Pending => self.dispatch_pending(fixed_header, body, now_ms, actions),
            SessionState::Connected => {
                self.dispatch_connected(fixed_header, body, now_ms, actions)
            }
        }
    }

    fn dispatch_pending(
        &mut self,
        fixed_header: u8,
        body: &[u8],
        now_ms: u64,
        actions: &mut Vec<SessionAction>,
    ) {
        let is_connect = fixed_header & 0xF0 == 0x10 && fixed_header & 0x0F == 0x00;
        if !is_connect {
            warn!(
                session_id = self.id,
                error = %BrokerError::HandshakeFailed("first packet was not CONNECT"),
                "closing session",
            );
            actions.push(SessionAction::Close);
            return;
        }

        match decode_connect_keep_alive(body) {
            Some(keep_alive) => {
                self.keep_alive_seconds = keep_alive;
                self.last_activity_ms = now_ms;
                self.enqueue_send(codec::encode_connack().to_vec());
                self.state = SessionState::Connected;
            }
            None => {
                warn!(
                    session_id = self.id,
                    error = %BrokerError::HandshakeFailed("malformed CONNECT variable header"),
                    "closing session",
                );
                actions.push(SessionAction::Close);
            }
        }
    }

    fn dispatch_connected(
        &mut self,
        fixed_header: u8,
        body: &[u8],
        now_ms: u64,
        actions: &mut Vec<SessionAction>,
    ) {
        let Some(packet_type) = PacketType::from_fixed_header_byte(fixed_header) else {
            warn!(
                session_id = self.id,
                error = %BrokerError::UnknownPacketType(fixed_header),
                "closing session",
            );
            actions.push(SessionAction::Close);
            return;
        };

        let result = match packet_type {
            PacketType::Publish => self.dispatch_publish(body, actions),
            PacketType::Subscribe => self.dispatch_subscribe(body, actions),
            PacketType::Unsubscribe => self.dispatch_unsubscribe(body, actions),
            PacketType::Pingreq => {
                self.enqueue_send(codec::encode_pingresp().to_vec());
                Ok(())
            }
            PacketType::Disconnect => {
                actions.push(SessionAction::Close);
                Ok(())
            }
            PacketType::Connect
            | PacketType::Connack
            | PacketType::Suback
            | PacketType::Unsuback
            | PacketType::Pingresp => {
                warn!(
                    session_id = self.id,
                    error = %BrokerError::UnknownPacketType(fixed_header),
                    packet_type = %packet_type,
                    "closing session: packet type not valid from a client",
                );
                actions.push(SessionAction::Close);
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!(session_id = self.id, error = %BrokerError::from(err), "closing session");
            actions.push(SessionAction::Close);
            return;
        }
        self.last_activity_ms = now_ms;
    }

    fn dispatch_publish(
        &mut self,
        body: &[u8],
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), CodecError> {
        let (topic, at) = decode_topic(body, 0)?;
        let payload = decode_payload(body, at)?;
        actions.push(SessionAction::Publish(PublishMessage {
            topic,
            payload: payload.to_vec(),
        }));
        Ok(())
    }

    fn dispatch_subscribe(
        &mut self,
        body: &[u8],
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), CodecError> {
        let (packet_id, mut at) = decode_uint16(body, 0)?;
        let mut filters = Vec::new();
        while at < body.len() {
            let (filter, next_at) = decode_topic(body, at)?;
            let qos = *body.get(next_at).ok_or(CodecError::OutOfBounds)?;
            filters.push((filter, qos));
            at = next_at + 1;
        }
        actions.push(SessionAction::Subscribe(SubscribeMessage {
            packet_id,
            filters,
        }));
        Ok(())
    }

    fn dispatch_unsubscribe(
        &mut self,
        body: &[u8],
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), CodecError> {
        let (packet_id, mut at) = decode_uint16(body, 0)?;
        let mut filters = Vec::new();
        while at < body.len() {
            let (filter, next_at) = decode_topic(body, at)?;
            filters.push(filter);
            at = next_at;
        }
        actions.push(SessionAction::Unsubscribe(UnsubscribeMessage {
            packet_id,
            filters,
        }));
        Ok(())
    }

    /// `keep_alive == 0` disables the inactivity timeout entirely.
    pub fn check_keepalive(&self, now_ms: u64) -> bool {
        if self.keep_alive_seconds == 0 {
            return false;
        }
        let timeout_ms = u64::from(self.keep_alive_seconds) * 1500;
        now_ms.saturating_sub(self.last_activity_ms) > timeout_ms
    }

    /// Queue `bytes` for transmission, taking the fast path straight to the
    /// transport when the outbox is empty and the transport is ready.
    /// Silently drops on a full outbox (QoS 0 loss) or a dead transport.
    pub fn enqueue_send(&mut self, bytes: Vec<u8>) {
        if !self.transport.connected() {
            warn!(
                session_id = self.id,
                error = %BrokerError::TransportClosed,
                "dropping queued send: transport already closed",
            );
            self.outbox.clear();
            return;
        }

        let fast_path = self.outbox.is_empty()
            && self.transport.can_send()
            && self.transport.space() >= bytes.len();

        if !fast_path {
            if self.outbox.len() >= self.outbox_capacity {
                return;
            }
            self.outbox.push_back(bytes);
            return;
        }

        let written = self.transport.send(&bytes);
        if written < bytes.len() {
            if self.outbox.len() >= self.outbox_capacity {
                return;
            }
            self.outbox.push_back(bytes[written..].to_vec());
        }
    }

    /// Drain as much of the outbox as the transport currently accepts,
    /// preserving FIFO order; called on the transport's "writable" event.
    pub fn drain_outbox(&mut self) {
        while let Some(head) = self.outbox.front() {
            if !(self.transport.can_send() && self.transport.space() >= head.len()) {
                break;
            }
            let written = self.transport.send(head);
            if written == head.len() {
                self.outbox.pop_front();
            } else if written == 0 {
                break;
            } else {
                let remaining = head[written..].to_vec();
                self.outbox.pop_front();
                self.outbox.push_front(remaining);
                break;
            }
        }
    }

    /// Number of messages currently queued behind backpressure. Exposed for
    /// tests and for a future metrics hook; not consulted by any dispatch
    /// logic.
    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.transport.close();
    }
}

/// Decode just enough of a CONNECT variable header to accept the handshake:
/// protocol name, protocol level, connect flags (all ignored beyond being
/// present — no auth, no client-id validation) and the keep-alive interval.
fn decode_connect_keep_alive(body: &[u8]) -> Option<u16> {
    let (_protocol_name, at) = decode_topic(body, 0).ok()?;
    let _protocol_level = *body.get(at)?;
    let _connect_flags = *body.get(at + 1)?;
    let (keep_alive, _) = decode_uint16(body, at + 2).ok()?;
    Some(keep_alive)
}

#[cfg(test)]
mod handshake_tests {
    use super::*;
    use crate::mqtt::packet::FixedHeader;

    fn connect_packet(keep_alive: u16) -> (u8, Vec<u8>) {
        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_be_bytes());
        body.extend_from_slice(b"MQTT");
        body.push(0x04); // protocol level
        body.push(0x00); // connect flags
        body.extend_from_slice(&keep_alive.to_be_bytes());
        body.extend_from_slice(&4u16.to_be_bytes());
        body.extend_from_slice(b"test");
        (0x10, body)
    }

    #[test]
    fn accepts_well_formed_connect() {
        let mut session = Session::new(1, Transport::Fake(Default::default()), 50, 0);
        let (fixed_header, body) = connect_packet(60);
        let mut actions = Vec::new();
        session.dispatch_packet(fixed_header, &body, 0, &mut actions);
        assert_eq!(session.state(), &SessionState::Connected);
        assert!(actions.is_empty());
    }

    #[test]
    fn rejects_non_connect_first_packet() {
        let mut session = Session::new(1, Transport::Fake(Default::default()), 50, 0);
        let mut actions = Vec::new();
        session.dispatch_packet(FixedHeader::Pingresp.as_u8(), &[], 0, &mut actions);
        assert_eq!(actions, vec![SessionAction::Close]);
    }
}
