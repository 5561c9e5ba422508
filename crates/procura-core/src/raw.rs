//! As-received release model.
//!
//! Only the fields the canonical mapper reads are modelled; unknown fields are
//! ignored. Optional sub-objects stay `Option` so that the mapper, not serde,
//! decides the defaults.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::de::{null_as_default, opt_string_or_number};

/// One procurement event snapshot (the record's compiled release).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRelease {
    pub ocid: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag: Vec<String>,
    pub initiation_type: Option<String>,
    pub buyer: Option<RawOrganization>,
    pub tender: Option<RawTender>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub awards: Vec<RawAward>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contracts: Vec<RawContract>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parties: Vec<RawOrganization>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTender {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub value: Option<RawValue>,
    pub min_value: Option<RawValue>,
    pub procuring_entity: Option<RawOrganization>,
    pub procurement_method: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub submission_method: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<RawItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tenderers: Vec<RawOrganization>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub identifiers: Vec<RawIdentifier>,
    pub tender_period: Option<RawPeriod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawValue {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPeriod {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIdentifier {
    pub scheme: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub legal_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAddress {
    pub country_name: Option<String>,
    pub region: Option<String>,
    pub locality: Option<String>,
    pub street_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContactPoint {
    pub name: Option<String>,
    pub telephone: Option<String>,
}

/// An organization as it appears in buyer, procuring entity, tenderer,
/// supplier, and party positions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrganization {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub identifier: Option<RawIdentifier>,
    pub address: Option<RawAddress>,
    pub contact_point: Option<RawContactPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClassification {
    pub scheme: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub classification: Option<RawClassification>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAward {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub value: Option<RawValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suppliers: Vec<RawOrganization>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContract {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default, rename = "awardID", deserialize_with = "opt_string_or_number")]
    pub award_id: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub value: Option<RawValue>,
    pub period: Option<RawPeriod>,
    pub date_signed: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<RawItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub milestones: Vec<RawMilestone>,
    pub implementation: Option<RawImplementation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agreed_metrics: Vec<RawMetric>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMilestone {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImplementation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub transactions: Vec<RawTransaction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub milestones: Vec<RawMilestone>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub purchase_orders: Vec<RawPurchaseOrder>,
}

/// Payer/payee reference on a transaction: an organization id plus name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrganizationRef {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub date: Option<String>,
    pub value: Option<RawValue>,
    pub payer: Option<RawOrganizationRef>,
    pub payee: Option<RawOrganizationRef>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPurchaseOrder {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub execution_period: Option<RawPeriod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetric {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_release_parses() {
        let rel: RawRelease = serde_json::from_str(r#"{"ocid": "ocds-1"}"#).unwrap();
        assert_eq!(rel.ocid.as_deref(), Some("ocds-1"));
        assert!(rel.tender.is_none());
        assert!(rel.awards.is_empty());
    }

    #[test]
    fn contract_award_id_accepts_number() {
        let c: RawContract = serde_json::from_str(r#"{"id": "c1", "awardID": 7}"#).unwrap();
        assert_eq!(c.award_id.as_deref(), Some("7"));
    }

    #[test]
    fn decimal_amount_from_number_and_string() {
        let v: RawValue = serde_json::from_str(r#"{"amount": 1234.56}"#).unwrap();
        assert_eq!(v.amount.unwrap().to_string(), "1234.56");
        let v: RawValue = serde_json::from_str(r#"{"amount": "99.10"}"#).unwrap();
        assert_eq!(v.amount.unwrap().to_string(), "99.10");
    }

    #[test]
    fn wrong_type_amount_fails() {
        let res: Result<RawValue, _> = serde_json::from_str(r#"{"amount": [1, 2]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn unknown_fields_ignored() {
        let t: RawTender =
            serde_json::from_str(r#"{"title": "x", "somethingElse": {"deep": true}}"#).unwrap();
        assert_eq!(t.title.as_deref(), Some("x"));
    }
}
