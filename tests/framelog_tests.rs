//! Tests for the frame-record CSV/JSONL formats.

use std::time::Instant;

use pcs_rs::framelog::{csv_header_line, Direction, FrameRecord, CSV_HEADER};
use pcs_rs::protocol::frame::{decode_rx_frame, RxFrame};

/// The CSV column order is part of the external contract.
#[test]
fn csv_header_order() {
    assert_eq!(
        CSV_HEADER,
        [
            "ts_iso",
            "ts_monotonic_ns",
            "direction",
            "can_id_hex",
            "pf_hex",
            "payload_hex",
            "decoded_json",
        ]
    );
    assert_eq!(
        csv_header_line(),
        "ts_iso,ts_monotonic_ns,direction,can_id_hex,pf_hex,payload_hex,decoded_json"
    );
}

/// A decoded RX frame renders into every CSV column.
#[test]
fn csv_record_fields() {
    let payload = [0x00u8, 0x0B, 0x80, 0x0D, 0x00, 0x00, 0x00, 0x00];
    let decoded = decode_rx_frame(0x13, &payload).unwrap();
    let record = FrameRecord::new(
        Direction::Rx,
        0x1813_B4FA,
        &payload,
        Instant::now(),
        Some(decoded),
    );

    let fields = record.to_csv_record();
    assert_eq!(fields.len(), CSV_HEADER.len());
    assert!(fields[0].contains('T'), "ts_iso must be ISO 8601: {}", fields[0]);
    assert_eq!(fields[2], "RX");
    assert_eq!(fields[3], "0x1813B4FA");
    assert_eq!(fields[4], "0x13");
    assert_eq!(fields[5], "000b800d00000000");
    assert!(fields[6].contains("32781"), "fault code in decoded json: {}", fields[6]);

    // The JSON column is quoted on the wire line.
    let line = record.to_csv_line();
    assert!(line.starts_with(&fields[0]));
    assert!(line.contains("\"{"));
}

/// A TX record without decode leaves the JSON column empty.
#[test]
fn csv_record_without_decode() {
    let record = FrameRecord::new(Direction::Tx, 0x180B_FAB4, &[0u8; 8], Instant::now(), None);
    let fields = record.to_csv_record();
    assert_eq!(fields[2], "TX");
    assert_eq!(fields[4], "0x0B");
    assert_eq!(fields[6], "");
    assert_eq!(record.pf_name(), "SetWorkingMode");
}

/// JSONL renders one object per frame with the decoded record nested.
#[test]
fn jsonl_object_shape() {
    let payload = [0x0F, 0xA0, 0x27, 0xD8, 0x00, 0x50, 0x03, 0x52];
    let decoded = decode_rx_frame(0x11, &payload).unwrap();
    assert!(matches!(decoded, RxFrame::Dc(_)));
    let record = FrameRecord::new(
        Direction::Rx,
        0x1811_B4FA,
        &payload,
        Instant::now(),
        Some(decoded),
    );

    let parsed: serde_json::Value = serde_json::from_str(&record.to_jsonl()).unwrap();
    assert_eq!(parsed["direction"], "RX");
    assert_eq!(parsed["can_id_hex"], "0x1811B4FA");
    assert_eq!(parsed["pf_hex"], "0x11");
    assert_eq!(parsed["payload_hex"], "0fa027d800500352");
    assert!(parsed["decoded_json"].is_object(), "nested decode: {parsed}");
    assert_eq!(parsed["decoded_json"]["fields"]["voltage"], 400.0);
    assert!(parsed["ts_monotonic_ns"].is_u64() || parsed["ts_monotonic_ns"].is_number());
}
