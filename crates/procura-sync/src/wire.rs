//! Request bodies for the remote workflow API.
//!
//! Every body travels inside a `{"data": ...}` envelope. Payloads borrow from
//! the linked release; amounts stay [`Decimal`] until serde writes them as
//! JSON numbers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use procura_core::canonical::{
    AgreedMetric, Award, CanonicalTender, Contract, Implementation, Item, Milestone,
    Organization, Period, Value,
};

pub const PROCUREMENT_METHOD_TYPE: &str = "belowThreshold";
pub const MODE: &str = "test";

/// Remote tender statuses the driver moves through.
pub mod status {
    pub const TENDERING: &str = "active.tendering";
    pub const QUALIFICATION: &str = "active.qualification";
    pub const COMPLETE: &str = "complete";
    pub const ACTIVE: &str = "active";
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireValue<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: &'a str,
    pub value_added_tax_included: bool,
}

impl<'a> From<&'a Value> for WireValue<'a> {
    fn from(v: &'a Value) -> Self {
        Self {
            amount: v.amount,
            currency: &v.currency,
            value_added_tax_included: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderPayload<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub procurement_method_type: &'static str,
    #[serde(rename = "tenderID")]
    pub tender_id: &'a str,
    pub mode: &'static str,
    pub procuring_entity: &'a Organization,
    pub value: WireValue<'a>,
    pub minimal_step: WireValue<'a>,
    pub items: &'a [Item],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enquiry_period: Option<&'a Period>,
    pub tender_period: &'a Period,
}

impl<'a> TenderPayload<'a> {
    pub fn new(tender: &'a CanonicalTender) -> Self {
        Self {
            title: &tender.title,
            description: tender.description.as_deref(),
            procurement_method_type: PROCUREMENT_METHOD_TYPE,
            tender_id: &tender.external_id,
            mode: MODE,
            procuring_entity: &tender.procuring_entity,
            value: (&tender.value).into(),
            minimal_step: (&tender.minimal_step).into(),
            items: &tender.items,
            source_url: tender.source_url.as_deref(),
            enquiry_period: tender.enquiry_period.as_ref(),
            tender_period: &tender.tender_period,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusPatch<'a> {
    pub status: &'a str,
}

/// A bid carries the tender's own value; source releases have no bid amounts.
#[derive(Debug, Serialize)]
pub struct BidPayload<'a> {
    pub tenderers: [&'a Organization; 1],
    pub value: WireValue<'a>,
    pub status: &'static str,
    pub date: DateTime<Utc>,
}

impl<'a> BidPayload<'a> {
    pub fn new(bidder: &'a Organization, tender_value: &'a Value, now: DateTime<Utc>) -> Self {
        Self {
            tenderers: [bidder],
            value: tender_value.into(),
            status: status::ACTIVE,
            date: now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AwardPayload<'a> {
    pub title: &'a str,
    pub status: &'static str,
    pub date: DateTime<Utc>,
    pub value: WireValue<'a>,
    pub suppliers: &'a [Organization],
    /// Remote id of the winning bid.
    pub bid_id: &'a str,
}

impl<'a> AwardPayload<'a> {
    pub fn new(award: &'a Award, bid_id: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            title: &award.title,
            status: status::ACTIVE,
            date: now,
            value: (&award.value).into(),
            suppliers: &award.suppliers,
            bid_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractPayload<'a> {
    pub title: &'a str,
    pub status: &'static str,
    /// Source contract id.
    #[serde(rename = "contractID")]
    pub contract_id: &'a str,
    /// Remote award id.
    #[serde(rename = "awardID")]
    pub award_id: &'a str,
    pub date_signed: DateTime<Utc>,
    pub value: WireValue<'a>,
    pub items: &'a [Item],
    pub milestones: &'a [Milestone],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<&'a Implementation>,
    pub agreed_metrics: &'a [AgreedMetric],
}

impl<'a> ContractPayload<'a> {
    pub fn new(contract: &'a Contract, remote_award_id: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            title: &contract.title,
            status: status::ACTIVE,
            contract_id: &contract.id,
            award_id: remote_award_id,
            date_signed: now,
            value: (&contract.value).into(),
            items: &contract.items,
            milestones: &contract.milestones,
            implementation: (!contract.implementation.is_empty()).then_some(&contract.implementation),
            agreed_metrics: &contract.agreed_metrics,
        }
    }
}
