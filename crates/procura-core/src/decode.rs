//! Streaming decoder for record packages.
//!
//! A package is a JSON object whose `records` (or `releases`) array can run to
//! gigabytes. [`decode_records`] parses it on a dedicated thread and hands
//! records over a bounded channel, so at most `channel_capacity` records are
//! held in memory at once. The consumer sees a plain forward-only iterator.
//!
//! A syntax error anywhere in the document is fatal: the iterator yields one
//! [`DecodeError`] and ends. Records that are well-formed JSON but the wrong
//! shape are yielded as-is and rejected later, per record.

use std::fmt;
use std::io::{BufReader, Read};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::RecordError;
use crate::raw::RawRelease;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level `{0}` array not found")]
    MissingArray(String),
}

/// Where records live inside the document.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Key of the top-level array (`records` for record packages).
    pub array_key: String,
    /// Key of the release inside each record, or `None` when the array items
    /// are releases themselves.
    pub payload_key: Option<String>,
    pub channel_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            array_key: "records".into(),
            payload_key: Some("compiledRelease".into()),
            channel_capacity: 64,
        }
    }
}

impl DecoderConfig {
    /// Layout of a release package: `{"releases": [release, ...]}`.
    pub fn release_package() -> Self {
        Self {
            array_key: "releases".into(),
            payload_key: None,
            ..Self::default()
        }
    }
}

type Item = Result<Value, DecodeError>;

/// Lazy, forward-only sequence of raw records.
pub struct RecordStream {
    rx: Receiver<Item>,
    done: bool,
}

impl Iterator for RecordStream {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        if self.done {
            return None;
        }
        match self.rx.recv() {
            Ok(Ok(v)) => Some(Ok(v)),
            Ok(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// Start decoding `reader` in the background and return the record iterator.
///
/// Dropping the iterator early stops the decoder thread at its next record.
pub fn decode_records<R>(reader: R, config: &DecoderConfig) -> RecordStream
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(config.channel_capacity.max(1));
    let key = config.array_key.clone();
    let err_tx = tx.clone();

    let spawned = thread::Builder::new()
        .name("record-decoder".into())
        .spawn(move || {
            if let Err(e) = decode_into(reader, &key, &tx) {
                // The consumer may already be gone; nothing left to tell.
                let _ = tx.send(Err(e));
            }
        });
    if let Err(e) = spawned {
        let _ = err_tx.send(Err(DecodeError::Io(e)));
    }
    drop(err_tx);

    RecordStream { rx, done: false }
}

fn decode_into<R: Read>(reader: R, key: &str, tx: &SyncSender<Item>) -> Result<(), DecodeError> {
    let mut de = serde_json::Deserializer::from_reader(BufReader::new(reader));
    let found = TopLevel { key, tx }.deserialize(&mut de)?;
    de.end()?;
    if !found {
        return Err(DecodeError::MissingArray(key.to_string()));
    }
    debug!("record stream exhausted");
    Ok(())
}

/// Visits the top-level object, streaming the `key` array and skipping
/// everything else. A bare top-level array is streamed directly.
#[derive(Clone, Copy)]
struct TopLevel<'a> {
    key: &'a str,
    tx: &'a SyncSender<Item>,
}

impl<'de> DeserializeSeed<'de> for TopLevel<'_> {
    type Value = bool;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for TopLevel<'_> {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an object with a `{}` array", self.key)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<bool, A::Error> {
        let mut found = false;
        while let Some(k) = map.next_key::<String>()? {
            if !found && k == self.key {
                map.next_value_seed(Records { tx: self.tx })?;
                found = true;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(found)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<bool, A::Error> {
        Records { tx: self.tx }.visit_seq(seq)?;
        Ok(true)
    }
}

#[derive(Clone, Copy)]
struct Records<'a> {
    tx: &'a SyncSender<Item>,
}

impl<'de> DeserializeSeed<'de> for Records<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for Records<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of records")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(record) = seq.next_element::<Value>()? {
            self.tx
                .send(Ok(record))
                .map_err(|_| de::Error::custom("record consumer hung up"))?;
        }
        Ok(())
    }
}

/// Pull the release out of one decoded record.
///
/// With a payload key, the record must be an object holding that key; without
/// one, the record is the release.
pub fn extract_release(record: Value, payload_key: Option<&str>) -> Result<RawRelease, RecordError> {
    let payload = match payload_key {
        Some(key) => {
            let Value::Object(mut obj) = record else {
                return Err(RecordError::NotAnObject);
            };
            match obj.remove(key) {
                Some(Value::Null) | None => return Err(RecordError::MissingPayload(key.to_string())),
                Some(v) => v,
            }
        }
        None => record,
    };
    if !payload.is_object() {
        return Err(RecordError::NotAnObject);
    }
    serde_json::from_value(payload).map_err(|e| RecordError::malformed("release", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(doc: &str) -> RecordStream {
        decode_records(Cursor::new(doc.to_string().into_bytes()), &DecoderConfig::default())
    }

    #[test]
    fn yields_records_in_order() {
        let doc = r#"{"uri": "x", "records": [{"ocid": "a"}, {"ocid": "b"}], "extensions": []}"#;
        let ocids: Vec<String> = stream(doc)
            .map(|r| r.unwrap()["ocid"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ocids, ["a", "b"]);
    }

    #[test]
    fn bare_array_is_accepted() {
        let items: Vec<_> = stream(r#"[{"ocid": "a"}]"#).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[test]
    fn missing_array_is_fatal() {
        let items: Vec<_> = stream(r#"{"releases": []}"#).collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(DecodeError::MissingArray(_))));
    }

    #[test]
    fn truncated_document_is_fatal_after_good_records() {
        let items: Vec<_> = stream(r#"{"records": [{"ocid": "a"}, {"ocid": "#).collect();
        assert!(items[0].is_ok());
        assert!(matches!(items.last(), Some(Err(DecodeError::Json(_)))));
    }

    #[test]
    fn trailing_garbage_is_fatal() {
        let items: Vec<_> = stream(r#"{"records": []} nope"#).collect();
        assert!(matches!(items.last(), Some(Err(DecodeError::Json(_)))));
    }

    #[test]
    fn scalar_top_level_is_fatal() {
        let items: Vec<_> = stream("42").collect();
        assert!(matches!(items[0], Err(DecodeError::Json(_))));
    }

    #[test]
    fn dropping_stream_early_is_clean() {
        let mut doc = String::from(r#"{"records": ["#);
        for i in 0..1000 {
            if i > 0 {
                doc.push(',');
            }
            doc.push_str(&format!(r#"{{"ocid": "r{i}"}}"#));
        }
        doc.push_str("]}");
        let mut s = stream(&doc);
        assert!(s.next().unwrap().is_ok());
        drop(s);
    }

    #[test]
    fn extract_requires_payload_key() {
        let err = extract_release(serde_json::json!({"ocid": "a"}), Some("compiledRelease")).unwrap_err();
        assert!(err.is_missing_payload());
        let err = extract_release(
            serde_json::json!({"compiledRelease": null}),
            Some("compiledRelease"),
        )
        .unwrap_err();
        assert!(err.is_missing_payload());
    }

    #[test]
    fn extract_reports_wrong_types() {
        let err = extract_release(
            serde_json::json!({"compiledRelease": {"ocid": "a", "tender": {"title": 5}}}),
            Some("compiledRelease"),
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::MalformedField { .. }));
    }

    #[test]
    fn extract_without_payload_key() {
        let rel = extract_release(serde_json::json!({"ocid": "a"}), None).unwrap();
        assert_eq!(rel.ocid.as_deref(), Some("a"));
        assert!(matches!(
            extract_release(serde_json::json!([1]), None),
            Err(RecordError::NotAnObject)
        ));
    }
}
