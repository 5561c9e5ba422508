//! Cross-reference resolution: bidder deduplication, award → bidder and
//! contract → award matching.
//!
//! The resolver never edits the mapper's output; it returns a linked copy in
//! which every award and contract carries an explicit [`Link`]. Unresolved
//! entities stay in the graph (they are counted) but are excluded from
//! submission and storage.

use std::collections::HashMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::debug;

use crate::canonical::{
    Award, BidderCandidate, CandidateOrigin, CanonicalTender, Contract, MappedRelease,
    Organization, ReleaseMeta,
};

/// Normalised bidder identity: trimmed, inner whitespace collapsed, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BidderKey(String);

impl BidderKey {
    /// Returns `None` for names that are blank after trimming.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BidderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A deduplicated organization that declared interest or won an award.
#[derive(Debug, Clone, PartialEq)]
pub struct Bidder {
    pub key: BidderKey,
    pub organization: Organization,
    /// Origin of the sighting that won last-write-wins.
    pub origin: CandidateOrigin,
}

/// Why a cross-reference could not be matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "ref", rename_all = "camelCase")]
pub enum UnresolvedReason {
    /// Award lists no named supplier.
    NoSupplier,
    /// First supplier's name matches no bidder.
    UnknownBidder(String),
    /// First supplier's name maps to an identity with conflicting identifiers.
    AmbiguousBidder(String),
    /// Contract carries no award reference.
    MissingAwardRef,
    /// Contract references an award id absent from the release.
    UnknownAward(String),
    /// Contract references an award that is itself unresolved.
    AwardUnresolved(String),
    /// A prerequisite submission failed at run time.
    PrerequisiteFailed(String),
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSupplier => write!(f, "award lists no supplier"),
            Self::UnknownBidder(name) => write!(f, "no bidder named {name:?}"),
            Self::AmbiguousBidder(name) => write!(f, "bidder {name:?} has conflicting identifiers"),
            Self::MissingAwardRef => write!(f, "contract has no awardID"),
            Self::UnknownAward(id) => write!(f, "no award with id {id:?}"),
            Self::AwardUnresolved(id) => write!(f, "award {id:?} is unresolved"),
            Self::PrerequisiteFailed(what) => write!(f, "prerequisite {what} was not submitted"),
        }
    }
}

/// Outcome of one cross-reference lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link<T> {
    Resolved(T),
    Unresolved(UnresolvedReason),
}

impl<T> Link<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn target(&self) -> Option<&T> {
        match self {
            Self::Resolved(t) => Some(t),
            Self::Unresolved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAward {
    pub award: Award,
    pub bidder: Link<BidderKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContract {
    pub contract: Contract,
    /// Source id of the matched award.
    pub award: Link<String>,
}

/// Two or more sightings share a bidder key but carry different identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousIdentity {
    pub key: BidderKey,
    pub identities: Vec<String>,
}

/// The mapper's entity set with cross-references established.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedRelease {
    pub meta: ReleaseMeta,
    pub tender: CanonicalTender,
    pub bidders: Vec<Bidder>,
    pub awards: Vec<ResolvedAward>,
    pub contracts: Vec<ResolvedContract>,
    pub ambiguities: Vec<AmbiguousIdentity>,
}

impl LinkedRelease {
    pub fn resolved_awards(&self) -> impl Iterator<Item = (&Award, &BidderKey)> {
        self.awards
            .iter()
            .filter_map(|ra| ra.bidder.target().map(|k| (&ra.award, k)))
    }

    pub fn resolved_contracts(&self) -> impl Iterator<Item = (&Contract, &String)> {
        self.contracts
            .iter()
            .filter_map(|rc| rc.award.target().map(|a| (&rc.contract, a)))
    }

    pub fn excluded_awards(&self) -> usize {
        self.awards.iter().filter(|a| !a.bidder.is_resolved()).count()
    }

    pub fn excluded_contracts(&self) -> usize {
        self.contracts.iter().filter(|c| !c.award.is_resolved()).count()
    }
}

/// Deduplicate bidder sightings by [`BidderKey`], last write wins.
///
/// The first sighting fixes a bidder's position in the output; later
/// sightings replace its organization. Keys whose sightings carry more than
/// one distinct source identifier are reported as ambiguous.
pub fn dedup_bidders(candidates: &[BidderCandidate]) -> (Vec<Bidder>, Vec<AmbiguousIdentity>) {
    let mut bidders: IndexMap<BidderKey, Bidder> = IndexMap::new();
    let mut identities: IndexMap<BidderKey, IndexSet<String>> = IndexMap::new();

    for cand in candidates {
        let Some(key) = BidderKey::from_name(&cand.organization.name) else {
            continue;
        };
        if let Some(identity) = &cand.source_identity {
            identities
                .entry(key.clone())
                .or_default()
                .insert(identity.clone());
        }
        bidders.insert(
            key.clone(),
            Bidder {
                key,
                organization: cand.organization.clone(),
                origin: cand.origin,
            },
        );
    }

    let ambiguities = identities
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(key, ids)| AmbiguousIdentity {
            key,
            identities: ids.into_iter().collect(),
        })
        .collect();

    (bidders.into_values().collect(), ambiguities)
}

/// Link an award to a bidder via its first supplier's name.
fn link_award(
    award: &Award,
    bidders: &HashMap<&BidderKey, &Bidder>,
    ambiguous: &[AmbiguousIdentity],
) -> Link<BidderKey> {
    let Some(name) = award.bidder_ref.as_deref() else {
        return Link::Unresolved(UnresolvedReason::NoSupplier);
    };
    let Some(key) = BidderKey::from_name(name) else {
        return Link::Unresolved(UnresolvedReason::NoSupplier);
    };
    if ambiguous.iter().any(|a| a.key == key) {
        return Link::Unresolved(UnresolvedReason::AmbiguousBidder(name.to_string()));
    }
    match bidders.get(&key) {
        Some(b) => Link::Resolved(b.key.clone()),
        None => Link::Unresolved(UnresolvedReason::UnknownBidder(name.to_string())),
    }
}

/// Link a contract to an award via its award reference.
fn link_contract(contract: &Contract, awards: &HashMap<&str, bool>) -> Link<String> {
    let Some(award_ref) = contract.award_ref.as_deref() else {
        return Link::Unresolved(UnresolvedReason::MissingAwardRef);
    };
    match awards.get(award_ref) {
        Some(true) => Link::Resolved(award_ref.to_string()),
        Some(false) => Link::Unresolved(UnresolvedReason::AwardUnresolved(award_ref.to_string())),
        None => Link::Unresolved(UnresolvedReason::UnknownAward(award_ref.to_string())),
    }
}

/// Resolve all cross-references of one mapped release.
pub fn resolve(mapped: &MappedRelease) -> LinkedRelease {
    let (bidders, ambiguities) = dedup_bidders(&mapped.bidder_candidates);
    let by_key: HashMap<&BidderKey, &Bidder> = bidders.iter().map(|b| (&b.key, b)).collect();

    let awards: Vec<ResolvedAward> = mapped
        .awards
        .iter()
        .map(|aw| ResolvedAward {
            bidder: link_award(aw, &by_key, &ambiguities),
            award: aw.clone(),
        })
        .collect();

    // Duplicate award ids: resolved if any occurrence resolved.
    let mut award_state: HashMap<&str, bool> = HashMap::new();
    for ra in &awards {
        let ok = ra.bidder.is_resolved();
        award_state
            .entry(ra.award.id.as_str())
            .and_modify(|r| *r |= ok)
            .or_insert(ok);
    }

    let contracts: Vec<ResolvedContract> = mapped
        .contracts
        .iter()
        .map(|c| ResolvedContract {
            award: link_contract(c, &award_state),
            contract: c.clone(),
        })
        .collect();

    for ra in &awards {
        if let Link::Unresolved(reason) = &ra.bidder {
            debug!(ocid = %mapped.tender.external_id, award = %ra.award.id, %reason, "award excluded");
        }
    }
    for rc in &contracts {
        if let Link::Unresolved(reason) = &rc.award {
            debug!(ocid = %mapped.tender.external_id, contract = %rc.contract.id, %reason, "contract excluded");
        }
    }

    LinkedRelease {
        meta: mapped.meta.clone(),
        tender: mapped.tender.clone(),
        bidders,
        awards,
        contracts,
        ambiguities,
    }
}
