//! Workflow driver: replays one linked release against the remote API.
//!
//! Stages run in a fixed order, each on an explicit [`WorkflowLedger`] that
//! carries the remote ids later stages depend on:
//!
//! ```text
//! create → active.tendering → bids → active.qualification → awards
//!        → contracts (each activated) → complete
//! ```
//!
//! Only `create` is fatal for a record. Every other failure is logged and the
//! record carries on with whatever the ledger holds; awards whose bid was not
//! created and contracts whose award was not created are excluded. Nothing is
//! rolled back.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use procura_core::resolve::{BidderKey, UnresolvedReason};
use procura_core::{LinkedRelease, RunSummary, Stage, StageTally};
use tracing::{debug, info, warn};

use crate::api::{ApiError, RemoteTender, WorkflowApi};
use crate::retry::RetryPolicy;
use crate::wire::{status, AwardPayload, BidPayload, ContractPayload, TenderPayload};

pub const DEFAULT_BASE_URL: &str = "http://localhost:6543/api/2.4/tenders";

/// Everything the workflow path needs to know about the remote system.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Tender collection URL; sub-resources hang off `{base_url}/{id}`.
    pub base_url: String,
    /// Credential for tender, award and contract calls.
    pub broker_token: String,
    /// Credential for bid submission.
    pub bidder_token: String,
    /// Pause after every remote call.
    pub call_delay: Duration,
    /// Upper bound on one HTTP request, connect to last body byte.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            broker_token: "broker".into(),
            bidder_token: "bidder".into(),
            call_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::None,
        }
    }
}

/// Result accumulator for one record's stage sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowLedger {
    pub tender: Option<RemoteTender>,
    /// Remote bid id per bidder.
    pub bid_ids: HashMap<BidderKey, String>,
    /// Remote award id per source award id.
    pub award_ids: HashMap<String, String>,
    /// Remote ids of contracts that were created and activated.
    pub contract_ids: Vec<String>,
    pub stages: BTreeMap<Stage, StageTally>,
    /// Awards dropped because their bid failed.
    pub awards_excluded: u64,
    /// Contracts dropped because their award failed.
    pub contracts_excluded: u64,
}

impl WorkflowLedger {
    fn ok(&mut self, stage: Stage) {
        self.stages.entry(stage).or_default().submitted += 1;
    }

    fn failed(&mut self, stage: Stage) {
        self.stages.entry(stage).or_default().failed += 1;
    }

    pub fn tally(&self, stage: Stage) -> StageTally {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// Append this record's counts to the run summary.
    pub fn fold_into(&self, summary: &mut RunSummary) {
        for (stage, tally) in &self.stages {
            summary.add_stage(*stage, *tally);
        }
        summary.exclude_awards(self.awards_excluded);
        summary.exclude_contracts(self.contracts_excluded);
    }
}

/// How far one record got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stage 1 failed; nothing exists remotely.
    Abandoned,
    /// The final status change was accepted.
    Completed,
    /// The tender exists remotely but the final status change failed.
    Incomplete,
}

pub struct WorkflowDriver<A> {
    api: A,
    call_delay: Duration,
    retry: RetryPolicy,
}

impl<A: WorkflowApi> WorkflowDriver<A> {
    pub fn new(api: A, config: &WorkflowConfig) -> Self {
        Self {
            api,
            call_delay: config.call_delay,
            retry: config.retry.clone(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_api(self) -> A {
        self.api
    }

    /// Run every stage for one record and fold the result into `summary`.
    pub async fn drive(&self, linked: &LinkedRelease, summary: &mut RunSummary) -> RecordOutcome {
        let mut ledger = WorkflowLedger::default();
        let outcome = self.run_stages(linked, &mut ledger).await;
        ledger.fold_into(summary);
        match outcome {
            RecordOutcome::Abandoned => summary.record_failed(),
            RecordOutcome::Completed | RecordOutcome::Incomplete => summary.record_completed(),
        }
        outcome
    }

    /// Run every stage for one record against `ledger`.
    pub async fn run_stages(&self, linked: &LinkedRelease, ledger: &mut WorkflowLedger) -> RecordOutcome {
        let ocid = linked.tender.external_id.as_str();
        let Some(tender) = self.create(linked, ledger).await else {
            return RecordOutcome::Abandoned;
        };
        self.open_tendering(&tender, ledger).await;
        self.submit_bids(linked, &tender, ledger).await;
        self.qualify(&tender, ledger).await;
        self.submit_awards(linked, &tender, ledger).await;
        self.submit_contracts(linked, &tender, ledger).await;
        if self.complete(&tender, ledger).await {
            info!(ocid, remote_id = %tender.id, "tender complete");
            RecordOutcome::Completed
        } else {
            RecordOutcome::Incomplete
        }
    }

    // ── Stages ──

    /// Stage 1: create the tender and keep its id and access token.
    pub async fn create(&self, linked: &LinkedRelease, ledger: &mut WorkflowLedger) -> Option<RemoteTender> {
        let ocid = linked.tender.external_id.as_str();
        let payload = TenderPayload::new(&linked.tender);
        let (api, payload) = (&self.api, &payload);
        match self.call("create_tender", move || api.create_tender(payload)).await {
            Ok(tender) => {
                info!(ocid, remote_id = %tender.id, "created tender");
                ledger.ok(Stage::Create);
                ledger.tender = Some(tender.clone());
                Some(tender)
            }
            Err(e) => {
                warn!(ocid, error = %e, "failed to create tender, skipping record");
                ledger.failed(Stage::Create);
                None
            }
        }
    }

    /// Stage 2: open the tender for bids.
    pub async fn open_tendering(&self, tender: &RemoteTender, ledger: &mut WorkflowLedger) -> bool {
        self.advance(tender, status::TENDERING, Stage::OpenTendering, ledger).await
    }

    /// Stage 3: one bid per deduplicated bidder. Failed bids are left out of
    /// the ledger.
    pub async fn submit_bids(&self, linked: &LinkedRelease, tender: &RemoteTender, ledger: &mut WorkflowLedger) {
        let now = Utc::now();
        for bidder in &linked.bidders {
            let payload = BidPayload::new(&bidder.organization, &linked.tender.value, now);
            let api = &self.api;
            let payload = &payload;
            match self.call("create_bid", move || api.create_bid(tender, payload)).await {
                Ok(bid_id) => {
                    debug!(bidder = %bidder.key, bid_id = %bid_id, "created bid");
                    ledger.ok(Stage::SubmitBids);
                    ledger.bid_ids.insert(bidder.key.clone(), bid_id);
                }
                Err(e) => {
                    warn!(remote_id = %tender.id, bidder = %bidder.key, error = %e, "failed to create bid");
                    ledger.failed(Stage::SubmitBids);
                }
            }
        }
    }

    /// Stage 4: move the tender to qualification.
    pub async fn qualify(&self, tender: &RemoteTender, ledger: &mut WorkflowLedger) -> bool {
        self.advance(tender, status::QUALIFICATION, Stage::Qualify, ledger).await
    }

    /// Stage 5: every resolved award whose bid exists.
    pub async fn submit_awards(&self, linked: &LinkedRelease, tender: &RemoteTender, ledger: &mut WorkflowLedger) {
        let now = Utc::now();
        for (award, key) in linked.resolved_awards() {
            let Some(bid_id) = ledger.bid_ids.get(key).cloned() else {
                let reason = UnresolvedReason::PrerequisiteFailed(format!("bid for {key}"));
                debug!(award = %award.id, %reason, "award excluded");
                ledger.awards_excluded += 1;
                continue;
            };
            let payload = AwardPayload::new(award, &bid_id, now);
            let api = &self.api;
            let payload = &payload;
            match self.call("create_award", move || api.create_award(tender, payload)).await {
                Ok(remote_id) => {
                    debug!(award = %award.id, remote_id = %remote_id, "created award");
                    ledger.ok(Stage::SubmitAwards);
                    ledger.award_ids.insert(award.id.clone(), remote_id);
                }
                Err(e) => {
                    warn!(remote_id = %tender.id, award = %award.id, error = %e, "failed to create award");
                    ledger.failed(Stage::SubmitAwards);
                }
            }
        }
    }

    /// Stage 6: every resolved contract whose award exists, each activated
    /// straight after creation. A contract counts as submitted only when both
    /// calls succeed.
    pub async fn submit_contracts(&self, linked: &LinkedRelease, tender: &RemoteTender, ledger: &mut WorkflowLedger) {
        let now = Utc::now();
        for (contract, award_ref) in linked.resolved_contracts() {
            let Some(award_id) = ledger.award_ids.get(award_ref).cloned() else {
                let reason = UnresolvedReason::PrerequisiteFailed(format!("award {award_ref}"));
                debug!(contract = %contract.id, %reason, "contract excluded");
                ledger.contracts_excluded += 1;
                continue;
            };
            let payload = ContractPayload::new(contract, &award_id, now);
            let api = &self.api;
            let payload = &payload;
            let contract_id = match self.call("create_contract", move || api.create_contract(tender, payload)).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(remote_id = %tender.id, contract = %contract.id, error = %e, "failed to create contract");
                    ledger.failed(Stage::SubmitContracts);
                    continue;
                }
            };
            let cid = contract_id.as_str();
            let activated = self.call("activate_contract", move || api.activate_contract(tender, cid)).await;
            match activated {
                Ok(()) => {
                    debug!(contract = %contract.id, remote_id = %contract_id, "contract active");
                    ledger.ok(Stage::SubmitContracts);
                    ledger.contract_ids.push(contract_id);
                }
                Err(e) => {
                    warn!(remote_id = %tender.id, contract = %contract_id, error = %e, "failed to activate contract");
                    ledger.failed(Stage::SubmitContracts);
                }
            }
        }
    }

    /// Stage 7: mark the tender complete.
    pub async fn complete(&self, tender: &RemoteTender, ledger: &mut WorkflowLedger) -> bool {
        self.advance(tender, status::COMPLETE, Stage::Complete, ledger).await
    }

    // ── Calls ──

    async fn advance(&self, tender: &RemoteTender, to: &str, stage: Stage, ledger: &mut WorkflowLedger) -> bool {
        let api = &self.api;
        match self.call("patch_tender_status", move || api.patch_tender_status(tender, to)).await {
            Ok(()) => {
                ledger.ok(stage);
                true
            }
            Err(e) => {
                warn!(remote_id = %tender.id, status = to, error = %e, "status change failed, continuing");
                ledger.failed(stage);
                false
            }
        }
    }

    /// One remote call under the retry policy, followed by the pacing delay.
    async fn call<T, F, Fut>(&self, what: &str, op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let result = self.retry.run(what, op).await;
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        result
    }
}
