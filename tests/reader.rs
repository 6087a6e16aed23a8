//! Packet reassembly: round-trip and fragmentation laws, boundary behaviors
//! (spec §8), grounded in `ReaderMqttPacket.cpp`'s state machine.

use mqtt_broker_core::mqtt::packet::{Reader, ReaderError};

fn connect_bytes() -> Vec<u8> {
    // `10 0C 00 04 4D 51 54 54 04 02 00 3C 00 00`: CONNECT, remaining length
    // 12, protocol name "MQTT", level 4, flags 0x02, keepalive 60, client id "".
    vec![
        0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x00,
    ]
}

#[test]
fn feeds_a_whole_packet_in_one_call() {
    let mut reader = Reader::new();
    let bytes = connect_bytes();
    let mut fired = 0;
    let consumed = reader
        .feed(&bytes, |r| {
            fired += 1;
            assert_eq!(r.fixed_header(), 0x10);
            assert_eq!(r.remaining_length(), 12);
        })
        .unwrap();

    assert_eq!(fired, 1);
    assert_eq!(consumed, bytes.len());
}

#[test]
fn scenario_5_fragmented_one_byte_at_a_time() {
    let mut reader = Reader::new();
    let bytes = connect_bytes();
    let mut fired = 0;
    for &byte in &bytes {
        reader
            .feed(&[byte], |r| {
                fired += 1;
                assert_eq!(r.fixed_header(), 0x10);
                assert_eq!(r.remaining_bytes().len(), 12);
            })
            .unwrap();
    }
    assert_eq!(fired, 1);
}

#[test]
fn round_trip_holds_for_arbitrary_chunking() {
    let bytes = connect_bytes();
    for chunk_size in 1..=bytes.len() {
        let mut reader = Reader::new();
        let mut fired = 0;
        for chunk in bytes.chunks(chunk_size) {
            reader.feed(chunk, |_| fired += 1).unwrap();
        }
        assert_eq!(fired, 1, "chunk_size={chunk_size}");
    }
}

#[test]
fn remaining_length_zero_fires_with_empty_payload() {
    let mut reader = Reader::new();
    let mut fired = 0;
    reader
        .feed(&[0xC0, 0x00], |r| {
            fired += 1;
            assert_eq!(r.remaining_length(), 0);
            assert!(r.remaining_bytes().is_empty());
        })
        .unwrap();
    assert_eq!(fired, 1);
}

#[test]
fn continuation_bit_on_fourth_length_byte_is_malformed() {
    let mut reader = Reader::new();
    let err = reader
        .feed(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF], |_| panic!("must not fire"))
        .unwrap_err();
    assert_eq!(err, ReaderError::MalformedRemainingLength);
}

#[test]
fn reader_recovers_after_a_malformed_length_and_resets_to_waiting_fixed_header() {
    let mut reader = Reader::new();
    let _ = reader.feed(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF], |_| {});

    let mut fired = 0;
    reader.feed(&[0xC0, 0x00], |_| fired += 1).unwrap();
    assert_eq!(fired, 1);
}

#[test]
fn multiple_packets_in_one_feed_fire_in_order() {
    let mut reader = Reader::new();
    let mut seen = Vec::new();
    reader
        .feed(&[0xC0, 0x00, 0xE0, 0x00, 0xC0, 0x00], |r| seen.push(r.fixed_header()))
        .unwrap();
    assert_eq!(seen, vec![0xC0, 0xE0, 0xC0]);
}
