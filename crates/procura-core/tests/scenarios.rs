//! Decode → map → resolve over whole packages.

use std::io::Cursor;

use chrono::{TimeZone, Utc};
use procura_core::{
    decode_records, prepare, DecoderConfig, Link, MapOptions, RunSummary, UnresolvedReason,
};
use rust_decimal::Decimal;

fn run(doc: serde_json::Value) -> (Vec<procura_core::LinkedRelease>, RunSummary) {
    let config = DecoderConfig::default();
    let opts = MapOptions::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    let bytes = serde_json::to_vec(&doc).unwrap();
    let mut summary = RunSummary::default();
    let mut out = Vec::new();
    for record in decode_records(Cursor::new(bytes), &config) {
        let record = record.expect("well-formed document");
        summary.record_seen();
        match prepare(record, config.payload_key.as_deref(), &opts) {
            Ok(linked) => {
                summary.record_resolution(&linked);
                out.push(linked);
            }
            Err(e) => summary.record_skipped(&e),
        }
    }
    (out, summary)
}

#[test]
fn road_repair_maps_with_defaults_and_one_resolved_award() {
    let (linked, summary) = run(serde_json::json!({
        "records": [{
            "ocid": "ocds-a",
            "compiledRelease": {
                "ocid": "ocds-a",
                "tender": {
                    "title": "Road Repair",
                    "tenderers": [{"name": "Asphalt Works"}]
                },
                "awards": [{"id": "aw-1", "suppliers": [{"name": "Asphalt Works"}]}]
            }
        }]
    }));
    assert_eq!(summary.records_seen, 1);
    assert_eq!(summary.records_skipped(), 0);

    let rel = &linked[0];
    assert_eq!(rel.tender.title, "Road Repair");
    assert_eq!(rel.tender.value.amount, Decimal::ZERO);
    assert_eq!(rel.tender.value.currency, "USD");
    assert_eq!(rel.tender.items.len(), 1);
    assert!(!rel.tender.items[0].description.is_empty());
    assert_eq!(rel.resolved_awards().count(), 1);
    assert_eq!(summary.awards_excluded, 0);
}

#[test]
fn contract_pointing_at_absent_award_is_excluded_once() {
    let (linked, summary) = run(serde_json::json!({
        "records": [{
            "ocid": "ocds-b",
            "compiledRelease": {
                "ocid": "ocds-b",
                "tender": {"tenderers": [{"name": "Bridge Co"}]},
                "awards": [{"id": "aw-1", "suppliers": [{"name": "Bridge Co"}]}],
                "contracts": [
                    {"id": "c-1", "awardID": "aw-1"},
                    {"id": "c-2", "awardID": "aw-404"}
                ]
            }
        }]
    }));
    let rel = &linked[0];
    assert_eq!(
        rel.contracts[1].award,
        Link::Unresolved(UnresolvedReason::UnknownAward("aw-404".into()))
    );
    assert_eq!(rel.resolved_contracts().count(), 1);
    assert_eq!(summary.contracts_excluded, 1);
}

#[test]
fn bad_records_are_skipped_without_stopping_the_stream() {
    let (linked, summary) = run(serde_json::json!({
        "records": [
            {"ocid": "no-payload"},
            {"compiledRelease": {"ocid": "neg", "tender": {"value": {"amount": -1}}}},
            {"compiledRelease": {"ocid": "bad-date", "date": "yesterday"}},
            "not an object",
            {"compiledRelease": {"ocid": "ok"}}
        ]
    }));
    assert_eq!(summary.records_seen, 5);
    assert_eq!(summary.skipped_missing_payload, 1);
    assert_eq!(summary.skipped_malformed, 3);
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].tender.external_id, "ok");
}

#[test]
fn unrecognised_classification_is_normalised() {
    let (linked, _) = run(serde_json::json!({
        "records": [{
            "compiledRelease": {
                "ocid": "ocds-c",
                "tender": {"items": [{
                    "description": "Gravel",
                    "classification": {"scheme": "UNSPSC", "id": "111117", "description": "Gravel"}
                }]}
            }
        }]
    }));
    let item = &linked[0].tender.items[0];
    assert_eq!(item.classification.scheme, "ДК021");
    assert_eq!(item.classification.id, "45000000-7");
}
