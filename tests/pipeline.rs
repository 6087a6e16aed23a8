//! Event/deletion queue backpressure and batching behavior (spec §8,
//! Scenario 6: queue-full drop).

use mqtt_broker_core::mqtt::pipeline::{BrokerEvent, DeletionQueue, EventQueue, WorkerCadence};
use mqtt_broker_core::mqtt::session::PublishMessage;

fn publish_event(topic: &str) -> BrokerEvent {
    BrokerEvent::Publish {
        message: PublishMessage {
            topic: topic.to_string(),
            payload: Vec::new(),
        },
    }
}

#[test]
fn scenario_6_queue_full_drops_the_next_publish_and_recovers_after_a_drain() {
    let (events, mut rx) = EventQueue::channel(50);

    for i in 0..50 {
        assert!(events.try_enqueue(publish_event(&format!("t/{i}"))), "slot {i} should still be free");
    }

    // 51st: queue is full, dropped.
    assert!(!events.try_enqueue(publish_event("t/50")));

    // Worker drains one event...
    assert!(rx.try_recv().is_ok());

    // ...and the 52nd enqueue (in spec numbering) now succeeds.
    assert!(events.try_enqueue(publish_event("t/51")));
}

#[test]
fn deletion_queue_tolerates_duplicate_enqueues() {
    let (deletions, mut rx) = DeletionQueue::channel(4);

    assert!(deletions.try_enqueue(1));
    assert!(deletions.try_enqueue(1));
    assert!(deletions.try_enqueue(2));

    assert_eq!(rx.try_recv().unwrap(), 1);
    assert_eq!(rx.try_recv().unwrap(), 1);
    assert_eq!(rx.try_recv().unwrap(), 2);
    assert!(rx.try_recv().is_err());
}

#[test]
fn deletion_queue_drops_past_capacity_without_panicking() {
    let (deletions, _rx) = DeletionQueue::channel(1);

    assert!(deletions.try_enqueue(1));
    assert!(!deletions.try_enqueue(2));
}

#[test]
fn event_queue_clone_shares_the_same_underlying_channel() {
    let (events, mut rx) = EventQueue::channel(1);
    let cloned = events.clone();

    assert!(cloned.try_enqueue(publish_event("t/0")));
    assert!(!events.try_enqueue(publish_event("t/1")));
    assert!(rx.try_recv().is_ok());
}

#[test]
fn worker_cadence_defaults_match_the_configured_deployment_defaults() {
    let cadence = WorkerCadence::default();
    assert_eq!(cadence.batch_size, 10);
    assert_eq!(cadence.keepalive_check_interval.as_millis(), 100);
    assert_eq!(cadence.idle_sleep.as_millis(), 10);
}
