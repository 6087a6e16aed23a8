//! End-to-end scenarios (spec §8) driven through the full `Broker`, using
//! `FakeTransport` in place of real sockets.

use std::sync::Arc;
use std::time::Duration;

use mqtt_broker_core::mqtt::broker::{Broker, BrokerConfig};
use mqtt_broker_core::mqtt::transport::{FakeTransport, Transport};

fn mqtt_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = (bytes.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(bytes);
    out
}

fn connect(client_id: &str, keep_alive: u16) -> Vec<u8> {
    let mut body = mqtt_string(b"MQTT");
    body.push(0x04);
    body.push(0x00);
    body.extend_from_slice(&keep_alive.to_be_bytes());
    body.extend_from_slice(&mqtt_string(client_id.as_bytes()));
    let mut packet = vec![0x10, body.len() as u8];
    packet.extend_from_slice(&body);
    packet
}

fn subscribe(packet_id: u16, filter: &str) -> Vec<u8> {
    let mut body = packet_id.to_be_bytes().to_vec();
    body.extend_from_slice(&mqtt_string(filter.as_bytes()));
    body.push(0x00);
    let mut packet = vec![0x80, body.len() as u8];
    packet.extend_from_slice(&body);
    packet
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = mqtt_string(topic.as_bytes());
    body.extend_from_slice(payload);
    let mut packet = vec![0x30, body.len() as u8];
    packet.extend_from_slice(&body);
    packet
}

/// The bytes a correct PUBLISH encoder must produce for `topic`/`payload`,
/// built independently of `encode_publish` so the assertion is a real check.
fn expected_publish(topic: &str, payload: &[u8]) -> Vec<u8> {
    publish_packet(topic, payload)
}

async fn spawn_worker(broker: &Arc<Broker>) -> tokio::task::JoinHandle<()> {
    let worker_broker = Arc::clone(broker);
    tokio::spawn(async move { worker_broker.run_worker().await })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn scenario_1_basic_publish_subscribe() {
    let broker = Broker::new(BrokerConfig::default());
    let _worker = spawn_worker(&broker).await;

    let a = broker.accept_client(Transport::Fake(FakeTransport::new())).await.unwrap();
    broker.on_data(a, &connect("a", 60)).await;
    assert_eq!(broker.sent_to(a).await.unwrap(), vec![vec![0x20, 0x02, 0x00, 0x00]]);

    broker.on_data(a, &subscribe(1, "sensors/temp")).await;
    settle().await;
    assert_eq!(broker.sent_to(a).await.unwrap().last().unwrap(), &vec![0x90, 0x03, 0x00, 0x01, 0x00]);

    let b = broker.accept_client(Transport::Fake(FakeTransport::new())).await.unwrap();
    broker.on_data(b, &connect("b", 60)).await;
    broker.on_data(b, &publish_packet("sensors/temp", b"21.5")).await;
    settle().await;

    assert_eq!(
        broker.sent_to(a).await.unwrap().last().unwrap(),
        &expected_publish("sensors/temp", b"21.5"),
    );

    broker.stop();
}

#[tokio::test]
async fn scenario_2_single_level_wildcard_fan_out() {
    let broker = Broker::new(BrokerConfig::default());
    let _worker = spawn_worker(&broker).await;

    let x = broker.accept_client(Transport::Fake(FakeTransport::new())).await.unwrap();
    broker.on_data(x, &connect("x", 60)).await;
    broker.on_data(x, &subscribe(1, "home/+/temp")).await;

    let y = broker.accept_client(Transport::Fake(FakeTransport::new())).await.unwrap();
    broker.on_data(y, &connect("y", 60)).await;
    broker.on_data(y, &subscribe(1, "home/kitchen/temp")).await;
    settle().await;

    let publisher = broker.accept_client(Transport::Fake(FakeTransport::new())).await.unwrap();
    broker.on_data(publisher, &connect("p", 60)).await;
    broker.on_data(publisher, &publish_packet("home/kitchen/temp", b"22")).await;
    settle().await;

    let expected = expected_publish("home/kitchen/temp", b"22");
    assert_eq!(broker.sent_to(x).await.unwrap().last().unwrap(), &expected);
    assert_eq!(broker.sent_to(y).await.unwrap().last().unwrap(), &expected);

    let before_x = broker.sent_to(x).await.unwrap().len();
    let before_y = broker.sent_to(y).await.unwrap().len();
    broker.on_data(publisher, &publish_packet("home/kitchen/outer/temp", b"nope")).await;
    settle().await;
    assert_eq!(broker.sent_to(x).await.unwrap().len(), before_x);
    assert_eq!(broker.sent_to(y).await.unwrap().len(), before_y);

    broker.stop();
}

#[tokio::test]
async fn scenario_4_keepalive_timeout_removes_the_session() {
    let broker = Broker::new(BrokerConfig::default());
    let _worker = spawn_worker(&broker).await;

    let a = broker.accept_client(Transport::Fake(FakeTransport::new())).await.unwrap();
    broker.on_data(a, &connect("a", 1)).await; // 1s keepalive, 1.5s timeout

    assert_eq!(broker.client_count().await, 1);
    tokio::time::sleep(Duration::from_millis(1700)).await;
    assert_eq!(broker.client_count().await, 0, "session should be reaped after 1.5x keepalive");

    broker.stop();
}

#[tokio::test]
async fn seventeenth_client_is_rejected_when_max_clients_is_sixteen() {
    let broker = Broker::new(BrokerConfig::default()); // max_clients = 16

    let mut accepted = Vec::new();
    for _ in 0..16 {
        let id = broker.accept_client(Transport::Fake(FakeTransport::new())).await;
        assert!(id.is_some());
        accepted.push(id.unwrap());
    }

    let seventeenth = broker.accept_client(Transport::Fake(FakeTransport::new())).await;
    assert!(seventeenth.is_none());
    assert_eq!(broker.client_count().await, 16);
}
