//! Stored document shape for the idempotent sink.
//!
//! One document per release, keyed by the tender's external id:
//!
//! ```text
//! { id, date, tag, initiationType,
//!   tender:    { tenderID, title, status, value, tenderPeriod, items, ... },
//!   bids:      [ { id, tenderers: [org] } ],
//!   awards:    [ { id, title, value, suppliers, bidID } ],
//!   contracts: [ { id, awardID, value, items, milestones, implementation, ... } ] }
//! ```
//!
//! Only resolved awards and contracts are included.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::canonical::{Award, CanonicalTender, Contract, Organization, ReleaseMeta};
use crate::resolve::{BidderKey, LinkedRelease};

#[derive(Debug, Serialize)]
pub struct BidDocument<'a> {
    pub id: &'a BidderKey,
    pub tenderers: [&'a Organization; 1],
}

#[derive(Debug, Serialize)]
pub struct AwardDocument<'a> {
    #[serde(flatten)]
    pub award: &'a Award,
    #[serde(rename = "bidID")]
    pub bid_id: &'a BidderKey,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderDocument<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub meta: &'a ReleaseMeta,
    pub tender: &'a CanonicalTender,
    pub bids: Vec<BidDocument<'a>>,
    pub awards: Vec<AwardDocument<'a>>,
    pub contracts: Vec<&'a Contract>,
}

impl<'a> TenderDocument<'a> {
    pub fn from_linked(linked: &'a LinkedRelease) -> Self {
        Self {
            id: &linked.tender.external_id,
            meta: &linked.meta,
            tender: &linked.tender,
            bids: linked
                .bidders
                .iter()
                .map(|b| BidDocument {
                    id: &b.key,
                    tenderers: [&b.organization],
                })
                .collect(),
            awards: linked
                .resolved_awards()
                .map(|(award, bid_id)| AwardDocument { award, bid_id })
                .collect(),
            contracts: linked.resolved_contracts().map(|(c, _)| c).collect(),
        }
    }

    /// Denormalised figures the store indexes alongside the document.
    pub fn stats(&self) -> DocumentStats {
        let contract_items: usize = self.contracts.iter().map(|c| c.items.len()).sum();
        let milestones: usize = self
            .contracts
            .iter()
            .map(|c| c.milestones.len() + c.implementation.milestones.len())
            .sum();
        DocumentStats {
            contract_count: self.contracts.len(),
            item_count: contract_items,
            milestone_count: milestones,
            transaction_count: self
                .contracts
                .iter()
                .map(|c| c.implementation.transactions.len())
                .sum(),
            purchase_order_count: self
                .contracts
                .iter()
                .map(|c| c.implementation.purchase_orders.len())
                .sum(),
            award_value: self.awards.iter().map(|a| a.award.value.amount).sum(),
            complexity: self.awards.len()
                + self.contracts.len()
                + self.tender.items.len()
                + milestones
                + self.bids.len(),
            start_date: self.tender.tender_period.start_date,
            end_date: self.tender.tender_period.end_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStats {
    pub contract_count: usize,
    /// Items across all contracts.
    pub item_count: usize,
    pub milestone_count: usize,
    pub transaction_count: usize,
    pub purchase_order_count: usize,
    pub award_value: Decimal,
    pub complexity: usize,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}
