//! Row shape written by the upsert: indexed columns plus the full document.

use chrono::{DateTime, SecondsFormat, Utc};
use procura_core::{LinkedRelease, TenderDocument};
use rust_decimal::prelude::ToPrimitive;

use crate::StoreError;

/// One `tenders` row.
///
/// Scalar columns are denormalised from the document at write time so that
/// filters and sorts never have to reach into the JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTender {
    pub external_id: String,
    pub title: String,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Release `date`; sorts as `dateModified`.
    pub release_date: Option<String>,
    pub contract_count: i64,
    pub item_count: i64,
    pub milestone_count: i64,
    pub transaction_count: i64,
    pub purchase_order_count: i64,
    pub award_value: f64,
    pub complexity: i64,
    /// Serialised [`TenderDocument`].
    pub payload: String,
}

impl StoredTender {
    pub fn from_linked(linked: &LinkedRelease) -> Result<Self, StoreError> {
        let doc = TenderDocument::from_linked(linked);
        let stats = doc.stats();
        let tender = &linked.tender;
        Ok(Self {
            external_id: tender.external_id.clone(),
            title: tender.title.clone(),
            status: tender.status.as_str().to_string(),
            amount: tender.value.amount.to_f64().unwrap_or_default(),
            currency: tender.value.currency.clone(),
            start_date: stats.start_date.map(column_timestamp),
            end_date: stats.end_date.map(column_timestamp),
            release_date: linked.meta.date.map(column_timestamp),
            contract_count: stats.contract_count as i64,
            item_count: stats.item_count as i64,
            milestone_count: stats.milestone_count as i64,
            transaction_count: stats.transaction_count as i64,
            purchase_order_count: stats.purchase_order_count as i64,
            award_value: stats.award_value.to_f64().unwrap_or_default(),
            complexity: stats.complexity as i64,
            payload: serde_json::to_string(&doc)?,
        })
    }
}

/// Timestamps are stored as fixed-width UTC strings so that string order is
/// time order.
pub fn column_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::raw::RawRelease;
    use procura_core::{map_release, resolve, MapOptions};

    fn linked(json: serde_json::Value) -> LinkedRelease {
        let raw: RawRelease = serde_json::from_value(json).unwrap();
        resolve(&map_release(&raw, &MapOptions::new(Utc::now())).unwrap())
    }

    #[test]
    fn columns_mirror_the_document() {
        let l = linked(serde_json::json!({
            "ocid": "ocds-1",
            "date": "2025-03-04T05:06:07.891Z",
            "tender": {
                "title": "Signals",
                "status": "complete",
                "value": {"amount": 99.5, "currency": "EUR"},
                "tenderPeriod": {"startDate": "2025-01-01", "endDate": "2025-01-31"}
            }
        }));
        let row = StoredTender::from_linked(&l).unwrap();
        assert_eq!(row.external_id, "ocds-1");
        assert_eq!(row.status, "complete");
        assert_eq!(row.amount, 99.5);
        assert_eq!(row.currency, "EUR");
        assert_eq!(row.start_date.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(row.end_date.as_deref(), Some("2025-01-31T00:00:00Z"));
        assert_eq!(row.release_date.as_deref(), Some("2025-03-04T05:06:07Z"));

        let payload: serde_json::Value = serde_json::from_str(&row.payload).unwrap();
        assert_eq!(payload["tender"]["title"], "Signals");
    }
}
