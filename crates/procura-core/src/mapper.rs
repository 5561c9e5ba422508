//! Canonical mapper: one raw release in, one structurally complete entity set out.
//!
//! Every function here is pure. Missing sub-objects and fields are replaced by
//! fixed defaults; only fields of the wrong shape (negative money, unparsable
//! tender or release timestamps) fail the record with
//! [`RecordError::MalformedField`]. Timestamps on awards, contracts and their
//! pass-through children are dropped when unparsable.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::canonical::*;
use crate::error::RecordError;
use crate::raw::*;

const DEFAULT_IDENTIFIER_SCHEME: &str = "UA-EDR";
const DEFAULT_IDENTIFIER_ID: &str = "00000000";
const DEFAULT_COUNTRY: &str = "United States";
const DEFAULT_REGION: &str = "NY";
const DEFAULT_LOCALITY: &str = "New York";
const DEFAULT_STREET: &str = "-";
const DEFAULT_CONTACT_NAME: &str = "Contact";
const DEFAULT_TELEPHONE: &str = "-";
const PROCURING_ENTITY_KIND: &str = "general";

/// Minimal step fallback: 0.5% of the tender amount.
const MINIMAL_STEP_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);
const MINIMAL_STEP_FLOOR: Decimal = Decimal::TEN;

/// Identifier schemes that link back to a public source page.
///
/// `{id}` in the template is replaced by the identifier's id.
const SOURCE_LINKS: &[(&str, &str)] = &[(
    "US_OR-PDX-BS-BIDNBR",
    "https://procure.portlandoregon.gov/bso/external/bidDetail.sda?docId={id}&external=true&parentUrl=close",
)];

/// How tender periods are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodPolicy {
    /// Keep the source `tenderPeriod`, possibly empty.
    #[default]
    Source,
    /// Synthesise an enquiry period that has just closed and a tender period
    /// that is open "now", for targets that reject inactive periods.
    SynthesizeActive,
}

/// Inputs to the mapper that are not part of the release itself.
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub now: DateTime<Utc>,
    pub period_policy: PeriodPolicy,
}

impl MapOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            period_policy: PeriodPolicy::Source,
        }
    }

    pub fn with_period_policy(mut self, policy: PeriodPolicy) -> Self {
        self.period_policy = policy;
        self
    }
}

/// Map one raw release into its canonical entity set.
pub fn map_release(raw: &RawRelease, opts: &MapOptions) -> Result<MappedRelease, RecordError> {
    let external_id = non_blank(raw.ocid.as_deref())
        .or_else(|| non_blank(raw.id.as_deref()))
        .ok_or(RecordError::MissingIdentifier)?
        .to_string();

    let empty = RawTender::default();
    let t = raw.tender.as_ref().unwrap_or(&empty);

    let title = non_blank(t.title.as_deref())
        .unwrap_or(PLACEHOLDER_TITLE)
        .to_string();
    let value = map_value(t.value.as_ref(), "tender.value")?;
    let minimal_step = match t.min_value.as_ref() {
        Some(min) => map_value(Some(min), "tender.minValue")?,
        None => minimal_step(&value),
    };

    let (tender_period, enquiry_period) = match opts.period_policy {
        PeriodPolicy::Source => (
            map_period(t.tender_period.as_ref(), "tender.tenderPeriod")?.unwrap_or_default(),
            None,
        ),
        PeriodPolicy::SynthesizeActive => synthesized_periods(opts.now),
    };

    let tender = CanonicalTender {
        external_id,
        items: map_items(&t.items, &title, "tender.items")?,
        title,
        description: t.description.clone(),
        status: TenderStatus::from_source(t.status.as_deref()),
        value,
        minimal_step,
        procuring_entity: map_procuring_entity(raw.buyer.as_ref().or(t.procuring_entity.as_ref())),
        tender_period,
        enquiry_period,
        source_url: source_url(&t.identifiers),
        procurement_method: t.procurement_method.clone(),
        submission_method: t.submission_method.clone(),
    };

    let meta = ReleaseMeta {
        date: parse_timestamp(raw.date.as_deref(), "date")?,
        tag: raw.tag.clone(),
        initiation_type: raw.initiation_type.clone(),
    };

    let bidder_candidates = bidder_candidates(t, &raw.awards);

    let awards = raw
        .awards
        .iter()
        .enumerate()
        .map(|(idx, aw)| map_award(aw, idx))
        .collect::<Result<Vec<_>, _>>()?;

    let contracts = raw
        .contracts
        .iter()
        .enumerate()
        .map(|(idx, c)| map_contract(c, idx, &tender.title))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MappedRelease {
        meta,
        tender,
        bidder_candidates,
        awards,
        contracts,
    })
}

// ── Values ──

/// Map a money value. Absent value or fields default to `0 USD`; a present
/// currency is kept verbatim.
pub fn map_value(raw: Option<&RawValue>, field: &str) -> Result<Value, RecordError> {
    let Some(raw) = raw else {
        return Ok(Value::zero());
    };
    let amount = raw.amount.unwrap_or(Decimal::ZERO);
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(RecordError::malformed(
            format!("{field}.amount"),
            format!("negative amount {amount}"),
        ));
    }
    Ok(Value {
        amount,
        currency: raw
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
    })
}

/// Derive a bidding step from the tender value: 0.5% rounded to cents, raised
/// to 10 but never above half the tender amount.
pub fn minimal_step(value: &Value) -> Value {
    let mut step = (value.amount * MINIMAL_STEP_RATE).round_dp(2);
    if step < MINIMAL_STEP_FLOOR {
        step = MINIMAL_STEP_FLOOR.min(value.amount / Decimal::TWO);
    }
    Value {
        amount: step,
        currency: value.currency.clone(),
    }
}

// ── Organizations ──

fn default_address() -> Address {
    Address {
        country_name: DEFAULT_COUNTRY.into(),
        region: DEFAULT_REGION.into(),
        locality: DEFAULT_LOCALITY.into(),
        street_address: DEFAULT_STREET.into(),
    }
}

fn default_contact() -> ContactPoint {
    ContactPoint {
        name: DEFAULT_CONTACT_NAME.into(),
        telephone: DEFAULT_TELEPHONE.into(),
    }
}

fn placeholder_organization(name: &str) -> Organization {
    Organization {
        name: name.into(),
        kind: None,
        identifier: Identifier {
            scheme: DEFAULT_IDENTIFIER_SCHEME.into(),
            id: DEFAULT_IDENTIFIER_ID.into(),
            legal_name: "Unknown".into(),
        },
        address: default_address(),
        contact_point: default_contact(),
    }
}

/// Map an organization, defaulting every sub-field independently.
pub fn map_organization(raw: Option<&RawOrganization>) -> Organization {
    let Some(org) = raw else {
        return placeholder_organization("Unknown Organization");
    };
    let name = org.name.clone().unwrap_or_else(|| "Unknown".into());
    let ident = org.identifier.clone().unwrap_or_default();
    let addr = org.address.clone().unwrap_or_default();
    let contact = org.contact_point.clone().unwrap_or_default();
    Organization {
        identifier: Identifier {
            scheme: ident
                .scheme
                .unwrap_or_else(|| DEFAULT_IDENTIFIER_SCHEME.into()),
            id: ident.id.unwrap_or_else(|| DEFAULT_IDENTIFIER_ID.into()),
            legal_name: ident.legal_name.unwrap_or_else(|| name.clone()),
        },
        address: Address {
            country_name: addr.country_name.unwrap_or_else(|| DEFAULT_COUNTRY.into()),
            region: addr.region.unwrap_or_else(|| DEFAULT_REGION.into()),
            locality: addr.locality.unwrap_or_else(|| DEFAULT_LOCALITY.into()),
            street_address: addr.street_address.unwrap_or_else(|| DEFAULT_STREET.into()),
        },
        contact_point: ContactPoint {
            name: contact.name.unwrap_or_else(|| DEFAULT_CONTACT_NAME.into()),
            telephone: contact.telephone.unwrap_or_else(|| DEFAULT_TELEPHONE.into()),
        },
        name,
        kind: None,
    }
}

/// Map the procuring entity (buyer first, then tender.procuringEntity).
pub fn map_procuring_entity(raw: Option<&RawOrganization>) -> Organization {
    let mut org = match raw {
        Some(_) => map_organization(raw),
        None => placeholder_organization("Unknown Entity"),
    };
    org.kind = Some(PROCURING_ENTITY_KIND.into());
    org
}

fn map_organization_ref(raw: Option<&RawOrganizationRef>) -> Option<Organization> {
    let r = raw?;
    let name = r.name.clone().unwrap_or_else(|| "Unknown".into());
    Some(Organization {
        identifier: Identifier {
            scheme: DEFAULT_IDENTIFIER_SCHEME.into(),
            id: r.id.clone().unwrap_or_else(|| DEFAULT_IDENTIFIER_ID.into()),
            legal_name: name.clone(),
        },
        address: default_address(),
        contact_point: default_contact(),
        name,
        kind: None,
    })
}

// ── Items ──

fn placeholder_item(description: &str) -> Item {
    Item {
        description: description.into(),
        quantity: Decimal::ONE,
        unit: default_unit(),
        classification: Classification {
            scheme: CLASSIFICATION_SCHEME.into(),
            id: DEFAULT_CLASSIFICATION_ID.into(),
            description: DEFAULT_CLASSIFICATION_DESC.into(),
        },
    }
}

fn default_unit() -> Unit {
    Unit {
        name: "unit".into(),
        code: "C62".into(),
    }
}

/// Map an item list, synthesising one placeholder item when the source has
/// none. The classification scheme is always forced to the normalised scheme;
/// codes from unrecognised schemes collapse to the default code.
pub fn map_items(items: &[RawItem], default_desc: &str, field: &str) -> Result<Vec<Item>, RecordError> {
    if items.is_empty() {
        return Ok(vec![placeholder_item(default_desc)]);
    }
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| map_item(item, &format!("{field}[{idx}]")))
        .collect()
}

fn map_item(item: &RawItem, field: &str) -> Result<Item, RecordError> {
    let quantity = item.quantity.unwrap_or(Decimal::ONE);
    if quantity.is_sign_negative() && !quantity.is_zero() {
        return Err(RecordError::malformed(
            format!("{field}.quantity"),
            format!("negative quantity {quantity}"),
        ));
    }

    let cls = item.classification.clone().unwrap_or_default();
    let recognized = cls
        .scheme
        .as_deref()
        .is_none_or(|s| RECOGNIZED_SCHEMES.contains(&s));
    let classification = if recognized {
        Classification {
            scheme: CLASSIFICATION_SCHEME.into(),
            id: cls.id.unwrap_or_else(|| DEFAULT_CLASSIFICATION_ID.into()),
            description: cls.description.unwrap_or_else(|| "Item".into()),
        }
    } else {
        Classification {
            scheme: CLASSIFICATION_SCHEME.into(),
            id: DEFAULT_CLASSIFICATION_ID.into(),
            description: item
                .description
                .clone()
                .unwrap_or_else(|| "Imported Item".into()),
        }
    };

    Ok(Item {
        description: item.description.clone().unwrap_or_else(|| "Item".into()),
        quantity,
        unit: default_unit(),
        classification,
    })
}

// ── Links and periods ──

/// First recognised identifier scheme wins; no match is not an error.
pub fn source_url(identifiers: &[RawIdentifier]) -> Option<String> {
    identifiers.iter().find_map(|ident| {
        let scheme = ident.scheme.as_deref()?;
        let (_, template) = SOURCE_LINKS.iter().find(|(s, _)| *s == scheme)?;
        let id = ident.id.as_deref()?;
        Some(template.replace("{id}", id))
    })
}

fn synthesized_periods(now: DateTime<Utc>) -> (Period, Option<Period>) {
    let enquiry = Period {
        start_date: Some(now - Duration::days(2)),
        end_date: Some(now - Duration::days(1)),
    };
    let tender = Period {
        start_date: Some(now - Duration::days(1)),
        end_date: Some(now + Duration::days(1)),
    };
    (tender, Some(enquiry))
}

fn map_period(raw: Option<&RawPeriod>, field: &str) -> Result<Option<Period>, RecordError> {
    let Some(p) = raw else {
        return Ok(None);
    };
    Ok(Some(Period {
        start_date: parse_timestamp(p.start_date.as_deref(), &format!("{field}.startDate"))?,
        end_date: parse_timestamp(p.end_date.as_deref(), &format!("{field}.endDate"))?,
    }))
}

/// Parse an RFC 3339 timestamp. Zone-less date-times and bare dates are
/// read as UTC; blank strings count as absent.
pub fn parse_timestamp(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, RecordError> {
    let Some(s) = non_blank(raw) else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Some(naive.and_utc()));
    }
    if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(naive.and_utc()));
    }
    Err(RecordError::malformed(field, format!("unparsable timestamp {s:?}")))
}

/// Like [`parse_timestamp`], but an unparsable value becomes `None`.
fn nested_timestamp(raw: Option<&str>, field: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(raw, field).unwrap_or_else(|e| {
        debug!(%field, error = %e, "dropping timestamp");
        None
    })
}

fn nested_period(raw: Option<&RawPeriod>, field: &str) -> Option<Period> {
    raw.map(|p| Period {
        start_date: nested_timestamp(p.start_date.as_deref(), &format!("{field}.startDate")),
        end_date: nested_timestamp(p.end_date.as_deref(), &format!("{field}.endDate")),
    })
}

// ── Bidders, awards, contracts ──

fn bidder_candidates(t: &RawTender, awards: &[RawAward]) -> Vec<BidderCandidate> {
    let tenderers = t.tenderers.iter().map(|o| (o, CandidateOrigin::Tenderer));
    let suppliers = awards
        .iter()
        .flat_map(|aw| aw.suppliers.iter())
        .map(|o| (o, CandidateOrigin::Supplier));

    tenderers
        .chain(suppliers)
        .filter(|(org, _)| non_blank(org.name.as_deref()).is_some())
        .map(|(org, origin)| BidderCandidate {
            organization: map_organization(Some(org)),
            origin,
            source_identity: org.identifier.as_ref().and_then(|i| {
                let id = non_blank(i.id.as_deref())?;
                Some(format!("{}:{}", i.scheme.as_deref().unwrap_or(""), id))
            }),
        })
        .collect()
}

fn map_award(aw: &RawAward, idx: usize) -> Result<Award, RecordError> {
    let field = format!("awards[{idx}]");
    Ok(Award {
        id: aw.id.clone().unwrap_or_else(|| format!("award-{}", idx + 1)),
        title: aw.title.clone().unwrap_or_else(|| "Award".into()),
        status: aw.status.clone(),
        date: nested_timestamp(aw.date.as_deref(), &format!("{field}.date")),
        value: map_value(aw.value.as_ref(), &format!("{field}.value"))?,
        suppliers: aw.suppliers.iter().map(|s| map_organization(Some(s))).collect(),
        bidder_ref: aw
            .suppliers
            .first()
            .and_then(|s| non_blank(s.name.as_deref()))
            .map(str::to_string),
    })
}

fn map_contract(c: &RawContract, idx: usize, tender_title: &str) -> Result<Contract, RecordError> {
    let field = format!("contracts[{idx}]");
    let title = non_blank(c.title.as_deref())
        .unwrap_or(tender_title)
        .to_string();
    let implementation = match &c.implementation {
        Some(imp) => map_implementation(imp, &format!("{field}.implementation"))?,
        None => Implementation::default(),
    };
    Ok(Contract {
        id: c.id.clone().unwrap_or_else(|| format!("contract-{}", idx + 1)),
        award_ref: c.award_id.clone(),
        items: map_items(&c.items, &title, &format!("{field}.items"))?,
        title,
        status: c.status.clone(),
        value: map_value(c.value.as_ref(), &format!("{field}.value"))?,
        period: nested_period(c.period.as_ref(), &format!("{field}.period")),
        date_signed: nested_timestamp(c.date_signed.as_deref(), &format!("{field}.dateSigned")),
        milestones: map_milestones(&c.milestones, &format!("{field}.milestones")),
        implementation,
        agreed_metrics: c
            .agreed_metrics
            .iter()
            .map(|m| AgreedMetric {
                id: m.id.clone(),
                title: m.title.clone(),
                description: m.description.clone(),
            })
            .collect(),
    })
}

fn map_milestones(ms: &[RawMilestone], field: &str) -> Vec<Milestone> {
    ms.iter()
        .enumerate()
        .map(|(idx, m)| {
            let f = format!("{field}[{idx}]");
            Milestone {
                id: m.id.clone(),
                title: m.title.clone(),
                kind: m.kind.clone(),
                code: m.code.clone(),
                description: m.description.clone(),
                status: m.status.clone(),
                date: nested_timestamp(m.date.as_deref(), &format!("{f}.date")),
                due_date: nested_timestamp(m.due_date.as_deref(), &format!("{f}.dueDate")),
            }
        })
        .collect()
}

fn map_implementation(imp: &RawImplementation, field: &str) -> Result<Implementation, RecordError> {
    let transactions = imp
        .transactions
        .iter()
        .enumerate()
        .map(|(idx, tx)| {
            let f = format!("{field}.transactions[{idx}]");
            Ok(Transaction {
                id: tx.id.clone(),
                date: nested_timestamp(tx.date.as_deref(), &format!("{f}.date")),
                value: map_value(tx.value.as_ref(), &format!("{f}.value"))?,
                payer: map_organization_ref(tx.payer.as_ref()),
                payee: map_organization_ref(tx.payee.as_ref()),
                uri: tx.uri.clone(),
            })
        })
        .collect::<Result<Vec<_>, RecordError>>()?;

    let purchase_orders = imp
        .purchase_orders
        .iter()
        .enumerate()
        .map(|(idx, po)| PurchaseOrder {
            id: po.id.clone(),
            title: po.title.clone(),
            execution_period: nested_period(
                po.execution_period.as_ref(),
                &format!("{field}.purchaseOrders[{idx}].executionPeriod"),
            ),
        })
        .collect();

    Ok(Implementation {
        transactions,
        milestones: map_milestones(&imp.milestones, &format!("{field}.milestones")),
        purchase_orders,
    })
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 6, 12, 0, 0).unwrap()
    }

    fn release(json: serde_json::Value) -> RawRelease {
        serde_json::from_value(json).unwrap()
    }

    fn map(json: serde_json::Value) -> MappedRelease {
        map_release(&release(json), &MapOptions::new(now())).unwrap()
    }

    #[test]
    fn missing_value_defaults_to_zero_usd() {
        let m = map(serde_json::json!({"ocid": "ocds-1", "tender": {"title": "x"}}));
        assert_eq!(m.tender.value, Value::zero());
        assert_eq!(m.tender.value.currency, "USD");
    }

    #[test]
    fn missing_tender_is_fully_defaulted() {
        let m = map(serde_json::json!({"ocid": "ocds-1"}));
        assert_eq!(m.tender.title, PLACEHOLDER_TITLE);
        assert_eq!(m.tender.items.len(), 1);
        assert_eq!(m.tender.items[0].description, PLACEHOLDER_TITLE);
        assert_eq!(m.tender.procuring_entity.name, "Unknown Entity");
        assert_eq!(m.tender.procuring_entity.kind.as_deref(), Some("general"));
        assert_eq!(m.tender.status, TenderStatus::Unknown);
        assert!(m.tender.source_url.is_none());
    }

    #[test]
    fn present_currency_is_never_replaced() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"value": {"currency": "EUR"}}
        }));
        assert_eq!(m.tender.value.currency, "EUR");
        assert_eq!(m.tender.value.amount, Decimal::ZERO);
    }

    #[test]
    fn negative_amount_is_malformed() {
        let raw = release(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"value": {"amount": -5}}
        }));
        let err = map_release(&raw, &MapOptions::new(now())).unwrap_err();
        assert!(matches!(err, RecordError::MalformedField { ref field, .. } if field == "tender.value.amount"));
    }

    #[test]
    fn empty_items_synthesize_one_placeholder() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"title": "Bridge", "items": []}
        }));
        assert_eq!(m.tender.items.len(), 1);
        let item = &m.tender.items[0];
        assert_eq!(item.description, "Bridge");
        assert_eq!(item.classification.id, DEFAULT_CLASSIFICATION_ID);
        assert_eq!(item.quantity, Decimal::ONE);
    }

    #[test]
    fn unrecognized_scheme_is_remapped() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"items": [{
                "description": "Asphalt",
                "classification": {"scheme": "UNSPSC", "id": "30111500", "description": "Concrete"}
            }]}
        }));
        let cls = &m.tender.items[0].classification;
        assert_eq!(cls.scheme, CLASSIFICATION_SCHEME);
        assert_eq!(cls.id, DEFAULT_CLASSIFICATION_ID);
        assert_eq!(cls.description, "Asphalt");
    }

    #[test]
    fn recognized_scheme_keeps_code() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"items": [{
                "description": "Cartons",
                "quantity": 3,
                "classification": {"scheme": "CPV", "id": "44617100-9", "description": "Cartons"}
            }]}
        }));
        let item = &m.tender.items[0];
        assert_eq!(item.classification.scheme, CLASSIFICATION_SCHEME);
        assert_eq!(item.classification.id, "44617100-9");
        assert_eq!(item.quantity, Decimal::from(3));
    }

    #[test]
    fn procuring_entity_prefers_buyer() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "buyer": {"name": "City of Portland"},
            "tender": {"procuringEntity": {"name": "Other"}}
        }));
        let pe = &m.tender.procuring_entity;
        assert_eq!(pe.name, "City of Portland");
        assert_eq!(pe.identifier.legal_name, "City of Portland");
        assert_eq!(pe.address.locality, DEFAULT_LOCALITY);
        assert_eq!(pe.contact_point.name, DEFAULT_CONTACT_NAME);
    }

    #[test]
    fn procuring_entity_subfields_default_independently() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"procuringEntity": {
                "name": "Water Bureau",
                "address": {"locality": "Portland"},
                "identifier": {"id": "123"}
            }}
        }));
        let pe = &m.tender.procuring_entity;
        assert_eq!(pe.address.locality, "Portland");
        assert_eq!(pe.address.region, DEFAULT_REGION);
        assert_eq!(pe.identifier.id, "123");
        assert_eq!(pe.identifier.scheme, DEFAULT_IDENTIFIER_SCHEME);
    }

    #[test]
    fn source_url_from_recognized_identifier() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"identifiers": [
                {"scheme": "OTHER", "id": "1"},
                {"scheme": "US_OR-PDX-BS-BIDNBR", "id": "00001234"}
            ]}
        }));
        assert_eq!(
            m.tender.source_url.as_deref(),
            Some("https://procure.portlandoregon.gov/bso/external/bidDetail.sda?docId=00001234&external=true&parentUrl=close")
        );
    }

    #[test]
    fn source_url_absent_without_match() {
        let ids = vec![RawIdentifier {
            scheme: Some("OTHER".into()),
            id: Some("1".into()),
            legal_name: None,
        }];
        assert!(source_url(&ids).is_none());
    }

    #[test]
    fn minimal_step_rules() {
        let v = |amount: i64| Value {
            amount: Decimal::from(amount),
            currency: "USD".into(),
        };
        assert_eq!(minimal_step(&v(100_000)).amount, Decimal::from(500));
        assert_eq!(minimal_step(&v(1_000)).amount, Decimal::TEN);
        assert_eq!(minimal_step(&v(8)).amount, Decimal::from(4));
        assert_eq!(minimal_step(&v(0)).amount, Decimal::ZERO);
    }

    #[test]
    fn min_value_overrides_minimal_step() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"value": {"amount": 100000}, "minValue": {"amount": 250, "currency": "USD"}}
        }));
        assert_eq!(m.tender.minimal_step.amount, Decimal::from(250));
    }

    #[test]
    fn synthesized_periods_bracket_now() {
        let raw = release(serde_json::json!({"ocid": "ocds-1"}));
        let opts = MapOptions::new(now()).with_period_policy(PeriodPolicy::SynthesizeActive);
        let m = map_release(&raw, &opts).unwrap();
        let tp = &m.tender.tender_period;
        assert!(tp.start_date.unwrap() < now());
        assert!(tp.end_date.unwrap() > now());
        let ep = m.tender.enquiry_period.unwrap();
        assert!(ep.end_date.unwrap() <= tp.start_date.unwrap());
    }

    #[test]
    fn source_period_is_parsed() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"tenderPeriod": {"startDate": "2025-01-02T10:00:00-08:00", "endDate": "2025-02-01"}}
        }));
        let tp = &m.tender.tender_period;
        assert_eq!(tp.start_date.unwrap(), Utc.with_ymd_and_hms(2025, 1, 2, 18, 0, 0).unwrap());
        assert_eq!(tp.end_date.unwrap(), Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let raw = release(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"tenderPeriod": {"startDate": "next tuesday"}}
        }));
        let err = map_release(&raw, &MapOptions::new(now())).unwrap_err();
        assert!(matches!(err, RecordError::MalformedField { .. }));
    }

    #[test]
    fn free_text_dates_below_the_tender_are_dropped() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"title": "Sidewalks"},
            "awards": [{"id": "a1", "date": "soon", "suppliers": [{"name": "A"}]}],
            "contracts": [{
                "id": "c1",
                "dateSigned": "n/a",
                "period": {"startDate": "2025-03-01", "endDate": "open"},
                "milestones": [{"id": "m1", "dueDate": "TBD", "date": "2025-02-01"}],
                "implementation": {
                    "transactions": [{"id": "t1", "date": "Q3"}],
                    "purchaseOrders": [{"id": "po1", "executionPeriod": {"startDate": "later"}}]
                }
            }]
        }));
        assert_eq!(m.tender.title, "Sidewalks");
        assert!(m.awards[0].date.is_none());
        let c = &m.contracts[0];
        assert!(c.date_signed.is_none());
        let period = c.period.as_ref().unwrap();
        assert_eq!(period.start_date.unwrap(), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        assert!(period.end_date.is_none());
        assert_eq!(c.milestones[0].id.as_deref(), Some("m1"));
        assert!(c.milestones[0].due_date.is_none());
        assert!(c.milestones[0].date.is_some());
        assert!(c.implementation.transactions[0].date.is_none());
        let po = c.implementation.purchase_orders[0].execution_period.as_ref().unwrap();
        assert!(po.start_date.is_none());
    }

    #[test]
    fn missing_identifier_fails() {
        let raw = release(serde_json::json!({"tender": {"title": "x"}}));
        let err = map_release(&raw, &MapOptions::new(now())).unwrap_err();
        assert!(matches!(err, RecordError::MissingIdentifier));
    }

    #[test]
    fn release_id_is_identifier_fallback() {
        let m = map(serde_json::json!({"id": 991}));
        assert_eq!(m.tender.external_id, "991");
    }

    #[test]
    fn candidates_come_from_tenderers_then_suppliers() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"tenderers": [{"name": "A"}, {"name": ""}]},
            "awards": [{"id": "a1", "suppliers": [{"name": "B", "identifier": {"scheme": "X", "id": "9"}}]}]
        }));
        let names: Vec<_> = m
            .bidder_candidates
            .iter()
            .map(|c| c.organization.name.as_str())
            .collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(m.bidder_candidates[0].origin, CandidateOrigin::Tenderer);
        assert_eq!(m.bidder_candidates[1].source_identity.as_deref(), Some("X:9"));
    }

    #[test]
    fn contract_nested_lists_are_mapped() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"title": "Road Repair"},
            "contracts": [{
                "id": "c1",
                "awardID": "a1",
                "value": {"amount": 10.5},
                "milestones": [{"id": "m1", "type": "delivery", "dueDate": "2025-03-01T00:00:00Z", "extra": 1}],
                "implementation": {
                    "transactions": [{"id": "t1", "value": {"amount": 3}, "payer": {"id": "p", "name": "City"}}],
                    "purchaseOrders": [{"id": "po1", "title": "PO"}]
                },
                "agreedMetrics": [{"id": "k1", "title": "Uptime"}]
            }]
        }));
        let c = &m.contracts[0];
        assert_eq!(c.title, "Road Repair");
        assert_eq!(c.award_ref.as_deref(), Some("a1"));
        assert_eq!(c.items.len(), 1);
        assert_eq!(c.milestones[0].kind.as_deref(), Some("delivery"));
        let tx = &c.implementation.transactions[0];
        assert_eq!(tx.payer.as_ref().unwrap().identifier.id, "p");
        assert!(tx.payee.is_none());
        assert_eq!(c.implementation.purchase_orders.len(), 1);
        assert_eq!(c.agreed_metrics[0].title.as_deref(), Some("Uptime"));
    }

    #[test]
    fn decimal_precision_survives_mapping() {
        let m = map(serde_json::json!({
            "ocid": "ocds-1",
            "tender": {"value": {"amount": "0.10"}},
            "awards": [{"id": "a", "value": {"amount": 0.2}}]
        }));
        let sum = m.tender.value.amount + m.awards[0].value.amount;
        assert_eq!(sum.to_string(), "0.30");
    }
}
