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

//! # mqtt-broker-core
//!
//! An embedded-oriented MQTT 3.1.1 broker core: packet reassembly, a
//! character-prefix subscription trie, per-client session state, and the
//! bounded event pipeline that ties them together, sized for a handful of
//! concurrent clients on a resource-constrained target rather than a
//! general-purpose internet-facing broker.
//!
//! ## Scope
//!
//! - QoS 0 only: no retry state, no message store, no persistence across
//!   restarts.
//! - Plain TCP and MQTT-over-WebSocket transports; the wire framing for
//!   either lives behind [`mqtt::transport::TransportOps`], not in this
//!   crate's core logic.
//! - A single coarse client registry lock plus a single trie lock, drained
//!   by one cooperative worker task ([`mqtt::broker::Broker::run_worker`]).
//!   There is no per-client task and no lock-free fast path; at the target
//!   scale (`BrokerConfig::max_clients`, 16 by default) contention on either
//!   lock is not the bottleneck.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mqtt_broker_core::mqtt::broker::{Broker, BrokerConfig};
//!
//! # async fn run() {
//! let broker = Broker::new(BrokerConfig::default());
//! let worker = Arc::clone(&broker);
//! tokio::spawn(async move { worker.run_worker().await });
//!
//! // Elsewhere, once a listener has accepted a transport:
//! // let session_id = broker.accept_client(transport).await;
//! // broker.on_data(session_id, &bytes).await;
//! # }
//! ```
//!
//! ## Module map
//!
//! - [`mqtt::packet`] — fixed header, Remaining Length, and field codecs.
//! - [`mqtt::trie`] — the `+`/`#` subscription matcher.
//! - [`mqtt::session`] — per-client handshake, keep-alive, and outbox.
//! - [`mqtt::pipeline`] — the bounded queues the worker drains.
//! - [`mqtt::broker`] — the registry, trie ownership, and worker loop.
//! - [`mqtt::transport`] — the byte-stream boundary `Session` depends on.
//! - [`mqtt::listener`] — accept loops that hand transports to a [`mqtt::broker::Broker`].
//!
//! ## Feature flags
//!
//! - **`tracing`** (default): structured logging via the `tracing` crate,
//!   and [`logger::init`] to install a `tracing-subscriber` formatter.
//!   Disabling it compiles every log statement in this crate to a no-op.

#[cfg(feature = "tracing")]
pub mod logger;

pub mod mqtt;
