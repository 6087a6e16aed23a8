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

//! Accept loops that turn an established byte stream into a registered
//! [`Session`](crate::mqtt::session::Session).
//!
//! Both listeners share one shape: accept, construct the matching
//! [`Transport`] variant, hand it to [`Broker::accept_client`], then spawn a
//! reader task that feeds inbound bytes to [`Broker::on_data`] and a writer
//! task that drains the transport's outbound channel. Neither listener
//! interprets MQTT; they exist purely to get bytes in front of the broker
//! core.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::mqtt::broker::Broker;
use crate::mqtt::common::tracing_macros::{info, warn};
use crate::mqtt::transport::{TcpTransport, Transport, WebSocketTransport};

const READ_BUFFER_SIZE: usize = 4096;

/// Something that accepts connections and feeds them into a [`Broker`]
/// until told to stop.
#[allow(async_fn_in_trait)]
pub trait Listener {
    async fn serve(&self, broker: Arc<Broker>) -> std::io::Result<()>;
}

/// Plain TCP MQTT listener: one MQTT packet stream per connection, no
/// framing beyond what [`crate::mqtt::packet::reader::Reader`] already does.
pub struct TcpServerListener {
    addr: SocketAddr,
    send_space: usize,
}

impl TcpServerListener {
    pub fn new(addr: SocketAddr, send_space: usize) -> Self {
        Self { addr, send_space }
    }
}

impl Listener for TcpServerListener {
    async fn serve(&self, broker: Arc<Broker>) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "tcp listener bound");

        loop {
            let (stream, peer) = listener.accept().await?;
            let broker = Arc::clone(&broker);
            let send_space = self.send_space;
            tokio::spawn(async move {
                serve_tcp_connection(stream, peer, send_space, broker).await;
            });
        }
    }
}

async fn serve_tcp_connection(stream: TcpStream, peer: SocketAddr, send_space: usize, broker: Arc<Broker>) {
    let _ = stream.set_nodelay(true);
    let (mut read_half, mut write_half) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let transport = Transport::Tcp(TcpTransport::new(peer.ip().to_string(), send_space, outbound_tx));
    let Some(session_id) = broker.accept_client(transport).await else {
        return;
    };

    let writer = tokio::spawn(async move {
        while let Some(bytes) = outbound_rx.recv().await {
            if write_half.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => broker.on_data(session_id, &buf[..n]).await,
        }
    }

    broker.on_disconnect(session_id).await;
    writer.abort();
}

/// MQTT-over-WebSocket listener: each binary WebSocket frame carries
/// whatever bytes the client chose to batch into it, so inbound frames are
/// fed to the same byte-oriented `Broker::on_data` path as raw TCP.
pub struct WsListener {
    addr: SocketAddr,
    send_space: usize,
}

impl WsListener {
    pub fn new(addr: SocketAddr, send_space: usize) -> Self {
        Self { addr, send_space }
    }
}

impl Listener for WsListener {
    async fn serve(&self, broker: Arc<Broker>) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "websocket listener bound");

        loop {
            let (stream, peer) = listener.accept().await?;
            let broker = Arc::clone(&broker);
            let send_space = self.send_space;
            tokio::spawn(async move {
                serve_ws_connection(stream, peer, send_space, broker).await;
            });
        }
    }
}

async fn serve_ws_connection(stream: TcpStream, peer: SocketAddr, send_space: usize, broker: Arc<Broker>) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%peer, %err, "websocket handshake failed");
            return;
        }
    };
    let (mut sink, mut stream) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let transport = Transport::WebSocket(WebSocketTransport::new(peer.ip().to_string(), send_space, outbound_tx));
    let Some(session_id) = broker.accept_client(transport).await else {
        return;
    };

    let writer = tokio::spawn(async move {
        while let Some(bytes) = outbound_rx.recv().await {
            if sink.send(Message::Binary(bytes)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(bytes)) => broker.on_data(session_id, &bytes).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    broker.on_disconnect(session_id).await;
    writer.abort();
}
