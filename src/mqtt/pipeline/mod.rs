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

//! Typed work queues and the single cooperative worker that drains them.
//!
//! All Topic Trie mutation and all PUBLISH fan-out happens on the worker;
//! everything else (accepting connections, reading sockets) stays off it so
//! the network-ingress path never blocks.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::mqtt::session::{PublishMessage, SubscribeMessage, UnsubscribeMessage};
use crate::mqtt::transport::TransportKey;

/// Work item produced by a session's network-ingress path, consumed only by
/// [`Worker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Broker-wide fan-out; the source session is not referenced, matching
    /// MQTT's "publisher doesn't know its subscribers" model.
    Publish { message: PublishMessage },
    /// A session asking to be added to the trie for one or more filters.
    Subscribe {
        message: SubscribeMessage,
        session_id: TransportKey,
    },
    /// A session asking to be removed from the trie for one or more filters.
    Unsubscribe {
        message: UnsubscribeMessage,
        session_id: TransportKey,
    },
}

/// Bounded, non-blocking-send queue of [`BrokerEvent`]s. A thin wrapper over
/// `tokio::sync::mpsc` so the drop-on-full policy (§7: destroy the event and
/// its inner message) lives in one place instead of at every call site.
pub struct EventQueue {
    sender: mpsc::Sender<BrokerEvent>,
}

impl EventQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<BrokerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Non-blocking send; returns `false` (and drops `event`) if the queue
    /// is full. The caller logs a warning on `false`.
    pub fn try_enqueue(&self, event: BrokerEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Bounded queue of session ids pending destruction. Duplicate enqueues are
/// harmless: the worker treats "not found in the registry" as a no-op.
pub struct DeletionQueue {
    sender: mpsc::Sender<TransportKey>,
}

impl DeletionQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransportKey>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn try_enqueue(&self, key: TransportKey) -> bool {
        self.sender.try_send(key).is_ok()
    }
}

impl Clone for DeletionQueue {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Cadence knobs for [`run`]; mirrors [`crate::mqtt::broker::BrokerConfig`]'s
/// worker-related fields so the pipeline stays testable without a full
/// `Broker`.
#[derive(Debug, Clone, Copy)]
pub struct WorkerCadence {
    pub batch_size: usize,
    pub keepalive_check_interval: Duration,
    pub idle_sleep: Duration,
}

impl Default for WorkerCadence {
    fn default() -> Self {
        Self {
            batch_size: 10,
            keepalive_check_interval: Duration::from_millis(100),
            idle_sleep: Duration::from_millis(10),
        }
    }
}
