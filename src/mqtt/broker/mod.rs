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

//! The broker: client registry, subscription trie, and the single worker
//! that owns both.
//!
//! Everything that touches the registry or the trie goes through `&self`
//! methods on [`Broker`] guarded by `tokio::sync::Mutex`; the split between
//! "caller-facing" methods (`publish`, `subscribe`, `unsubscribe`,
//! `on_data`, `on_writable`) and "worker-only" methods (the `_impl` suite)
//! exists so a reviewer can see at a glance which path can block the
//! network-ingress side and which can't: only the worker ever holds the
//! trie lock.

mod config;
pub use self::config::{BrokerConfig, BrokerConfigBuilder};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex};

use crate::mqtt::common::tracing_macros::{info, warn};
use crate::mqtt::common::HashMap;
use crate::mqtt::packet::{encode_publish, encode_suback, encode_unsuback};
use crate::mqtt::pipeline::{BrokerEvent, DeletionQueue, EventQueue, WorkerCadence};
use crate::mqtt::session::{PublishMessage, Session, SessionAction, SessionState, SubscribeMessage, UnsubscribeMessage};
use crate::mqtt::transport::{Transport, TransportKey, TransportOps};
use crate::mqtt::trie::Trie;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the UNIX epoch")
        .as_millis() as u64
}

/// Owns the client registry and the subscription trie. Cheap to clone
/// (it's an `Arc` inside): hand a clone to every network task that accepts
/// connections, and call [`Broker::run_worker`] exactly once from whichever
/// task is meant to own the background loop.
pub struct Broker {
    config: BrokerConfig,
    clients: Mutex<HashMap<TransportKey, Session>>,
    trie: Mutex<Trie>,
    next_client_id: AtomicU64,
    events: EventQueue,
    event_rx: Mutex<Option<mpsc::Receiver<BrokerEvent>>>,
    deletions: DeletionQueue,
    deletion_rx: Mutex<Option<mpsc::Receiver<TransportKey>>>,
    stopping: AtomicBool,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Arc<Self> {
        let (events, event_rx) = EventQueue::channel(config.event_queue_capacity);
        let (deletions, deletion_rx) = DeletionQueue::channel(config.deletion_queue_capacity);
        Arc::new(Self {
            config,
            clients: Mutex::new(HashMap::new()),
            trie: Mutex::new(Trie::new()),
            next_client_id: AtomicU64::new(1),
            events,
            event_rx: Mutex::new(Some(event_rx)),
            deletions,
            deletion_rx: Mutex::new(Some(deletion_rx)),
            stopping: AtomicBool::new(false),
        })
    }

    /// Registers a newly-established transport, rejecting it if the
    /// registry is already at `max_clients`. The caller owns closing and
    /// dropping `transport` on a `None` return.
    pub async fn accept_client(&self, transport: Transport) -> Option<TransportKey> {
        let mut clients = self.clients.lock().await;
        if clients.len() >= self.config.max_clients {
            warn!(len = clients.len(), max = self.config.max_clients, "rejecting client: registry full");
            return None;
        }
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, transport, self.config.outbox_capacity, now_ms());
        clients.insert(id, session);
        info!(session_id = id, "client accepted");
        Some(id)
    }

    /// Feeds `bytes` to `session_id`'s reader and routes whatever actions
    /// fall out. Never blocks on the trie: publishes, subscribes, and
    /// unsubscribes are handed to the worker via the event queue.
    pub async fn on_data(&self, session_id: TransportKey, bytes: &[u8]) {
        let actions = {
            let mut clients = self.clients.lock().await;
            let Some(session) = clients.get_mut(&session_id) else {
                return;
            };
            session.handle_inbound(bytes, now_ms())
        };

        let mut should_close = false;
        for action in actions {
            match action {
                SessionAction::Publish(message) => self.publish(message),
                SessionAction::Subscribe(message) => self.subscribe(message, session_id),
                SessionAction::Unsubscribe(message) => self.unsubscribe(message, session_id),
                SessionAction::Close => should_close = true,
            }
        }

        if should_close {
            self.close_and_reap(session_id).await;
        }
    }

    /// Called when `session_id`'s transport reports writable again; drains
    /// whatever the outbox is holding.
    pub async fn on_writable(&self, session_id: TransportKey) {
        let mut clients = self.clients.lock().await;
        if let Some(session) = clients.get_mut(&session_id) {
            session.drain_outbox();
        }
    }

    /// Called when the transport itself reports a disconnect (EOF, reset,
    /// WebSocket close frame).
    pub async fn on_disconnect(&self, session_id: TransportKey) {
        self.close_and_reap(session_id).await;
    }

    async fn close_and_reap(&self, session_id: TransportKey) {
        let mut clients = self.clients.lock().await;
        if let Some(session) = clients.get_mut(&session_id) {
            session.transport_mut().close();
        }
        drop(clients);
        self.queue_for_deletion(session_id);
    }

    fn queue_for_deletion(&self, session_id: TransportKey) {
        if !self.deletions.try_enqueue(session_id) {
            warn!(session_id, "deletion queue full, dropping duplicate reap request");
        }
    }

    pub fn publish(&self, message: PublishMessage) {
        if !self.events.try_enqueue(BrokerEvent::Publish { message }) {
            warn!("event queue full, dropping publish");
        }
    }

    pub fn subscribe(&self, message: SubscribeMessage, session_id: TransportKey) {
        if !self.events.try_enqueue(BrokerEvent::Subscribe { message, session_id }) {
            warn!(session_id, "event queue full, dropping subscribe");
        }
    }

    pub fn unsubscribe(&self, message: UnsubscribeMessage, session_id: TransportKey) {
        if !self.events.try_enqueue(BrokerEvent::Unsubscribe { message, session_id }) {
            warn!(session_id, "event queue full, dropping unsubscribe");
        }
    }

    /// Request the worker loop to stop after its current iteration.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Relaxed);
    }

    /// The single cooperative worker: drains events in capped batches,
    /// reaps deleted sessions, and checks keep-alives on a fixed cadence.
    /// Must be called exactly once per `Broker`; panics on a second call.
    pub async fn run_worker(self: &Arc<Self>) {
        let mut event_rx = self
            .event_rx
            .lock()
            .await
            .take()
            .expect("run_worker must be called exactly once");
        let mut deletion_rx = self
            .deletion_rx
            .lock()
            .await
            .take()
            .expect("run_worker must be called exactly once");

        let cadence = WorkerCadence {
            batch_size: self.config.worker_batch_size,
            keepalive_check_interval: self.config.keepalive_check_interval(),
            idle_sleep: self.config.idle_sleep(),
        };
        let mut last_keepalive_check = tokio::time::Instant::now();

        loop {
            if self.stopping.load(Ordering::Relaxed) {
                break;
            }

            let events_processed = self.process_broker_events(&mut event_rx, cadence.batch_size).await;
            let deletions_processed = self.process_deletions(&mut deletion_rx).await;

            if last_keepalive_check.elapsed() >= cadence.keepalive_check_interval {
                self.process_keep_alives().await;
                last_keepalive_check = tokio::time::Instant::now();
            }

            if events_processed || deletions_processed {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(cadence.idle_sleep).await;
            }
        }
    }

    async fn process_broker_events(&self, rx: &mut mpsc::Receiver<BrokerEvent>, batch_size: usize) -> bool {
        let mut processed = 0;
        while processed < batch_size {
            match rx.try_recv() {
                Ok(event) => {
                    self.dispatch_event(event).await;
                    processed += 1;
                }
                Err(_) => break,
            }
        }
        processed > 0
    }

    async fn dispatch_event(&self, event: BrokerEvent) {
        match event {
            BrokerEvent::Publish { message } => self.publish_impl(message).await,
            BrokerEvent::Subscribe { message, session_id } => self.subscribe_impl(message, session_id).await,
            BrokerEvent::Unsubscribe { message, session_id } => self.unsubscribe_impl(message, session_id).await,
        }
    }

    /// Fan out one PUBLISH to every session whose subscriptions match the
    /// topic. The only place a `Session`'s outbox is ever pushed to by
    /// something other than that session's own packet dispatch.
    async fn publish_impl(&self, message: PublishMessage) {
        let matching = {
            let trie = self.trie.lock().await;
            trie.matching_sessions(&message.topic)
        };
        if matching.is_empty() {
            return;
        }

        let bytes = encode_publish(&message.topic, &message.payload);
        let mut clients = self.clients.lock().await;
        for session_id in matching {
            if let Some(session) = clients.get_mut(&session_id) {
                if *session.state() == SessionState::Connected {
                    session.enqueue_send(bytes.clone());
                }
            }
        }
    }

    async fn subscribe_impl(&self, message: SubscribeMessage, session_id: TransportKey) {
        {
            let mut trie = self.trie.lock().await;
            for (filter, _qos) in &message.filters {
                trie.subscribe(filter, session_id);
            }
        }

        let mut clients = self.clients.lock().await;
        if let Some(session) = clients.get_mut(&session_id) {
            for (filter, _qos) in &message.filters {
                session.note_subscribed(filter.clone());
            }
            session.enqueue_send(encode_suback(message.packet_id, message.filters.len()));
        }
    }

    async fn unsubscribe_impl(&self, message: UnsubscribeMessage, session_id: TransportKey) {
        {
            let mut trie = self.trie.lock().await;
            for filter in &message.filters {
                trie.unsubscribe(filter, session_id);
            }
        }

        let mut clients = self.clients.lock().await;
        if let Some(session) = clients.get_mut(&session_id) {
            for filter in &message.filters {
                session.note_unsubscribed(filter);
            }
            session.enqueue_send(encode_unsuback(message.packet_id).to_vec());
        }
    }

    /// Removes every destroyed session from the registry and its filters
    /// from the trie. The trie cleanup here (rather than in `Session`'s
    /// `Drop`) is what keeps trie mutation exclusive to the worker.
    async fn process_deletions(&self, rx: &mut mpsc::Receiver<TransportKey>) -> bool {
        let mut any = false;
        while let Ok(session_id) = rx.try_recv() {
            any = true;
            let removed = {
                let mut clients = self.clients.lock().await;
                clients.remove(&session_id)
            };
            if let Some(session) = removed {
                let mut trie = self.trie.lock().await;
                for filter in session.subscribed_filters() {
                    trie.unsubscribe(filter, session_id);
                }
                info!(session_id, "session destroyed");
            }
        }
        any
    }

    async fn process_keep_alives(&self) {
        let now = now_ms();
        let mut timed_out = Vec::new();
        {
            let mut clients = self.clients.lock().await;
            for (id, session) in clients.iter_mut() {
                if session.check_keepalive(now) {
                    session.transport_mut().close();
                    timed_out.push(*id);
                }
            }
        }
        for id in timed_out {
            warn!(session_id = id, "keep-alive timeout");
            self.queue_for_deletion(id);
        }
    }

    /// Number of sessions currently registered. Exposed for tests and
    /// diagnostics; the worker never consults this.
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Bytes a [`FakeTransport`](crate::mqtt::transport::FakeTransport)-backed
    /// session has had `send` called with, in order. Returns `None` for an
    /// unknown session id or a session on a real transport.
    pub async fn sent_to(&self, session_id: TransportKey) -> Option<Vec<Vec<u8>>> {
        let clients = self.clients.lock().await;
        let session = clients.get(&session_id)?;
        match session.transport() {
            Transport::Fake(fake) => Some(fake.sent.clone()),
            _ => None,
        }
    }
}
