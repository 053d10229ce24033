//! Signals request body formatting.
//!
//! The request is a JSON document with four top-level fields: the partner
//! identifier, the signal-set identifier, an optional schema object (sent
//! once per process lifetime), and a data array. The data array is streamed
//! directly from the value cursor — no intermediate collection is built.

use std::fmt::Write as _;
use std::iter::Peekable;

use crate::entry::Entry;
use crate::value::Value;

/// Formats the complete signals request into `out`.
///
/// `signals` is the schema sequence (timestamp signal first, then each
/// measurement signal); `values` must yield cells in cursor order: identity,
/// timestamp, then measurements, for each record. When `schema` is `None`
/// the schema block is omitted.
pub fn format_request(
    partner_id: &str,
    signal_set_id: &str,
    schema: Option<&[Entry]>,
    id_signal: &Entry,
    signals: &[Entry],
    values: impl Iterator<Item = Value>,
    out: &mut String,
) {
    out.push_str("{\n");

    let _ = write!(out, "\"partnerId\": \"{}\"", partner_id);
    let _ = write!(out, ",\n\"signalSetId\": \"{}\"", signal_set_id);

    if let Some(schema) = schema {
        out.push_str(",\n\"schema\": {\n");
        format_schema(schema, out);
        out.push_str("\n}");
    }

    out.push_str(",\n\"data\": [");
    format_data(id_signal, signals, values.peekable(), out);
    out.push_str("]");

    out.push_str("\n}\n");
}

fn format_schema(schema: &[Entry], out: &mut String) {
    let mut entries = schema.iter();

    if let Some(first) = entries.next() {
        first.format_type(out);
        for entry in entries {
            out.push_str(", ");
            entry.format_type(out);
        }
    }
}

fn format_data(
    id_signal: &Entry,
    signals: &[Entry],
    mut values: Peekable<impl Iterator<Item = Value>>,
    out: &mut String,
) {
    while let Some(value) = values.next() {
        out.push_str("\n{ ");
        id_signal.format_value(&value, out);

        for signal in signals {
            if let Some(value) = values.next() {
                out.push_str(", ");
                signal.format_value(&value, out);
            }
        }

        // Peek one cell ahead to decide whether this record is the last.
        if values.peek().is_some() {
            out.push_str(" },");
        } else {
            out.push_str(" }\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ValueCursor;
    use crate::sample::Sample;
    use crate::signals::{build_signals, id_signal};
    use crate::value::Stamp;

    fn batch(count: usize, measurements: usize) -> Vec<Box<Sample>> {
        (0..count)
            .map(|i| {
                let mut sample = Box::new(Sample::new(measurements));
                sample.stamp(Stamp { secs: 1700000000 + i as i64, nanos: 0 });
                for (index, slot) in sample.values.iter_mut().enumerate() {
                    *slot = Value::Double((index + 1) as f64);
                }
                sample
            })
            .collect()
    }

    fn render(schema: bool, samples: usize, rows: usize, counters: usize) -> String {
        let signals = build_signals(rows, counters);
        let batch = batch(samples, rows * counters);
        let mut out = String::new();
        format_request(
            "partner-1",
            "set-1",
            schema.then_some(signals.as_slice()),
            &id_signal(),
            &signals,
            ValueCursor::new(&batch),
            &mut out,
        );
        out
    }

    #[test]
    fn test_request_is_valid_json() {
        let request = render(true, 2, 1, 4);
        let parsed: serde_json::Value = serde_json::from_str(&request).unwrap();

        assert_eq!(parsed["partnerId"], "partner-1");
        assert_eq!(parsed["signalSetId"], "set-1");
        assert_eq!(parsed["schema"]["ts"], "datetime");
        assert_eq!(parsed["schema"]["cpu_user"], "double");
        assert_eq!(parsed["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_schema_omitted_when_none() {
        let request = render(false, 1, 1, 4);
        let parsed: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert!(parsed.get("schema").is_none());
        assert_eq!(parsed["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_data_records_carry_id_ts_and_measurements() {
        let request = render(true, 1, 1, 2);
        let parsed: serde_json::Value = serde_json::from_str(&request).unwrap();

        let record = &parsed["data"][0];
        assert_eq!(record["id"], "01700000000");
        assert_eq!(record["ts"], "2023-11-14T22:13:20.000Z");
        assert_eq!(record["cpu_user"], 1.0);
        assert_eq!(record["cpu_nice"], 2.0);
    }

    #[test]
    fn test_empty_batch_renders_empty_data_array() {
        let request = render(true, 0, 1, 4);
        let parsed: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert_eq!(parsed["data"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_records_preserve_batch_order() {
        let request = render(false, 3, 1, 1);
        let parsed: serde_json::Value = serde_json::from_str(&request).unwrap();
        let ids: Vec<&str> = parsed["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|record| record["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["01700000000", "01700000001", "01700000002"]);
    }
}
