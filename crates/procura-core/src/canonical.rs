//! Canonical entity shapes produced by the mapper.
//!
//! Field names serialise in camelCase so that both the stored document and the
//! workflow wire payloads share one predictable nesting (`tender.value.amount`,
//! `tender.tenderPeriod.startDate`, `contracts[].value.amount`, ...).
//!
//! Monetary amounts stay [`Decimal`] in memory and only become `f64` when
//! serialised.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const PLACEHOLDER_TITLE: &str = "Imported Tender";

/// Classification scheme every item is normalised to.
pub const CLASSIFICATION_SCHEME: &str = "ДК021";
/// Source schemes whose codes survive normalisation.
pub const RECOGNIZED_SCHEMES: &[&str] = &["CPV", "CPV2008", "ДК021"];
pub const DEFAULT_CLASSIFICATION_ID: &str = "45000000-7";
pub const DEFAULT_CLASSIFICATION_DESC: &str = "Construction work";

/// Lifecycle status of a canonical tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TenderStatus {
    Draft,
    Active,
    Complete,
    Cancelled,
    Unsuccessful,
    Terminated,
    Unknown,
}

impl TenderStatus {
    /// Map a source status string onto the closed status set.
    pub fn from_source(status: Option<&str>) -> Self {
        match status.map(str::trim) {
            Some("draft" | "planning" | "planned") => Self::Draft,
            Some("active") => Self::Active,
            Some("complete") => Self::Complete,
            Some("cancelled") => Self::Cancelled,
            Some("unsuccessful") => Self::Unsuccessful,
            Some("terminated" | "withdrawn") => Self::Terminated,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Unsuccessful => "unsuccessful",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the serialised form back (used by query filters).
    pub fn parse(s: &str) -> Option<Self> {
        let status = match s {
            "draft" => Self::Draft,
            "active" => Self::Active,
            "complete" => Self::Complete,
            "cancelled" => Self::Cancelled,
            "unsuccessful" => Self::Unsuccessful,
            "terminated" => Self::Terminated,
            "unknown" => Self::Unknown,
            _ => return None,
        };
        Some(status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Value {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
}

impl Value {
    pub fn zero() -> Self {
        Self {
            amount: Decimal::ZERO,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Period {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub scheme: String,
    pub id: String,
    pub legal_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub country_name: String,
    pub region: String,
    pub locality: String,
    pub street_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactPoint {
    pub name: String,
    pub telephone: String,
}

/// A fully-defaulted organization (procuring entity, bidder, supplier).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub identifier: Identifier,
    pub address: Address,
    pub contact_point: ContactPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub scheme: String,
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub unit: Unit,
    pub classification: Classification,
}

/// Normalised tender-level record, keyed by `external_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTender {
    #[serde(rename = "tenderID")]
    pub external_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TenderStatus,
    pub value: Value,
    pub minimal_step: Value,
    pub procuring_entity: Organization,
    pub items: Vec<Item>,
    pub tender_period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enquiry_period: Option<Period>,
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procurement_method: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub submission_method: Vec<String>,
}

/// Release-level metadata carried alongside the tender.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiation_type: Option<String>,
}

/// Where a bidder candidate was sighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrigin {
    Tenderer,
    Supplier,
}

/// A bidder sighting before deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct BidderCandidate {
    pub organization: Organization,
    pub origin: CandidateOrigin,
    /// `scheme:id` of the source identifier, when the source carried one.
    pub source_identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub value: Value,
    pub suppliers: Vec<Organization>,
    /// Source name of the first listed supplier, the award's bidder reference.
    #[serde(skip)]
    pub bidder_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<Organization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee: Option<Organization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_period: Option<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreedMetric {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    pub transactions: Vec<Transaction>,
    pub milestones: Vec<Milestone>,
    pub purchase_orders: Vec<PurchaseOrder>,
}

impl Implementation {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.milestones.is_empty() && self.purchase_orders.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: String,
    /// Source award id this contract claims to implement.
    #[serde(rename = "awardID")]
    pub award_ref: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub value: Value,
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_signed: Option<DateTime<Utc>>,
    pub milestones: Vec<Milestone>,
    #[serde(skip_serializing_if = "Implementation::is_empty")]
    pub implementation: Implementation,
    pub agreed_metrics: Vec<AgreedMetric>,
}

/// Everything the mapper derives from one release.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRelease {
    pub meta: ReleaseMeta,
    pub tender: CanonicalTender,
    pub bidder_candidates: Vec<BidderCandidate>,
    pub awards: Vec<Award>,
    pub contracts: Vec<Contract>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_source() {
        assert_eq!(TenderStatus::from_source(Some("active")), TenderStatus::Active);
        assert_eq!(TenderStatus::from_source(Some("planning")), TenderStatus::Draft);
        assert_eq!(TenderStatus::from_source(Some("withdrawn")), TenderStatus::Terminated);
        assert_eq!(TenderStatus::from_source(Some("weird")), TenderStatus::Unknown);
        assert_eq!(TenderStatus::from_source(None), TenderStatus::Unknown);
    }

    #[test]
    fn status_parse_matches_as_str() {
        for s in [
            TenderStatus::Draft,
            TenderStatus::Active,
            TenderStatus::Complete,
            TenderStatus::Cancelled,
            TenderStatus::Unsuccessful,
            TenderStatus::Terminated,
            TenderStatus::Unknown,
        ] {
            assert_eq!(TenderStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn value_serialises_amount_as_number() {
        let v = Value {
            amount: Decimal::new(123456, 2),
            currency: "USD".into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["amount"], serde_json::json!(1234.56));
        assert_eq!(json["currency"], "USD");
    }
}
