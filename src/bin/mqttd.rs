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

//! Bring-up binary: wires a [`BrokerConfig`] to a TCP listener, a WebSocket
//! listener, and the worker loop. Defaults match the deployment this crate
//! targets (§6): plain TCP on 1883, MQTT-over-WebSocket on 8883.

use std::net::SocketAddr;
use std::sync::Arc;

use mqtt_broker_core::mqtt::broker::{Broker, BrokerConfig};
use mqtt_broker_core::mqtt::listener::{Listener, TcpServerListener, WsListener};

const TCP_ADDR: &str = "0.0.0.0:1883";
const WS_ADDR: &str = "0.0.0.0:8883";
const SEND_SPACE: usize = 4096;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    #[cfg(feature = "tracing")]
    mqtt_broker_core::logger::init(tracing::Level::INFO);

    let broker = Broker::new(BrokerConfig::default());

    let worker_broker = Arc::clone(&broker);
    let worker = tokio::spawn(async move { worker_broker.run_worker().await });

    let tcp_addr: SocketAddr = TCP_ADDR.parse().expect("TCP_ADDR is a valid socket address");
    let ws_addr: SocketAddr = WS_ADDR.parse().expect("WS_ADDR is a valid socket address");
    let tcp_listener = TcpServerListener::new(tcp_addr, SEND_SPACE);
    let ws_listener = WsListener::new(ws_addr, SEND_SPACE);

    let tcp_broker = Arc::clone(&broker);
    let ws_broker = Arc::clone(&broker);
    tokio::try_join!(
        tcp_listener.serve(tcp_broker),
        ws_listener.serve(ws_broker),
    )?;

    broker.stop();
    worker.abort();
    Ok(())
}
