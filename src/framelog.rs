//! Frame-record formatting for offline analysis.
//!
//! External writers persist raw traffic as CSV or JSONL; this module fixes
//! the record shape both formats share:
//!
//! ```text
//! ts_iso, ts_monotonic_ns, direction, can_id_hex, pf_hex, payload_hex, decoded_json
//! ```
//!
//! JSONL renders one object per frame with the same fields and the decoded
//! record inlined as a nested object.

use std::time::Instant;

use chrono::{Local, SecondsFormat};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::protocol::frame::{pf_name, RxFrame};

/// Monotonic origin of `ts_monotonic_ns`, fixed at first use.
static MONOTONIC_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Traffic direction relative to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Tx => "TX",
            Direction::Rx => "RX",
        }
    }
}

/// One logged frame.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub ts_iso: String,
    pub ts_monotonic_ns: u128,
    pub direction: Direction,
    pub can_id: u32,
    pub pf: u8,
    pub payload: Vec<u8>,
    pub decoded: Option<RxFrame>,
}

/// CSV header, in column order.
pub const CSV_HEADER: [&str; 7] = [
    "ts_iso",
    "ts_monotonic_ns",
    "direction",
    "can_id_hex",
    "pf_hex",
    "payload_hex",
    "decoded_json",
];

impl FrameRecord {
    /// Builds a record stamped with the current wall clock and the frame's
    /// monotonic bus timestamp.
    pub fn new(
        direction: Direction,
        can_id: u32,
        payload: &[u8],
        ts_monotonic: Instant,
        decoded: Option<RxFrame>,
    ) -> Self {
        FrameRecord {
            ts_iso: Local::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ts_monotonic_ns: ts_monotonic
                .saturating_duration_since(*MONOTONIC_EPOCH)
                .as_nanos(),
            direction,
            can_id,
            pf: ((can_id >> 16) & 0xFF) as u8,
            payload: payload.to_vec(),
            decoded,
        }
    }

    pub fn pf_name(&self) -> &'static str {
        pf_name(self.pf)
    }

    fn decoded_json(&self) -> Option<serde_json::Value> {
        self.decoded
            .as_ref()
            .and_then(|frame| serde_json::to_value(frame).ok())
    }

    /// CSV field values in column order, unescaped.
    pub fn to_csv_record(&self) -> [String; 7] {
        [
            self.ts_iso.clone(),
            self.ts_monotonic_ns.to_string(),
            self.direction.as_str().to_string(),
            format!("0x{:08X}", self.can_id),
            format!("0x{:02X}", self.pf),
            hex::encode(&self.payload),
            self.decoded_json()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        ]
    }

    /// One CSV line with RFC 4180 quoting where needed.
    pub fn to_csv_line(&self) -> String {
        self.to_csv_record()
            .iter()
            .map(|field| csv_escape(field))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// One JSONL object with `decoded_json` nested.
    pub fn to_jsonl(&self) -> String {
        let mut object = json!({
            "ts_iso": self.ts_iso,
            "ts_monotonic_ns": self.ts_monotonic_ns as u64,
            "direction": self.direction.as_str(),
            "can_id_hex": format!("0x{:08X}", self.can_id),
            "pf_hex": format!("0x{:02X}", self.pf),
            "payload_hex": hex::encode(&self.payload),
        });
        if let Some(decoded) = self.decoded_json() {
            object["decoded_json"] = decoded;
        }
        object.to_string()
    }
}

/// The CSV header line.
pub fn csv_header_line() -> String {
    CSV_HEADER.join(",")
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escaping_quotes_json_fields() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn record_derives_pf_from_the_identifier() {
        let record = FrameRecord::new(
            Direction::Rx,
            0x1811_B4FA,
            &[0u8; 8],
            Instant::now(),
            None,
        );
        assert_eq!(record.pf, 0x11);
        assert_eq!(record.pf_name(), "DCData");
    }
}
