//! A [`WorkflowApi`] that writes each call as one JSON line instead of
//! sending it, and answers with synthetic ids.

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::api::{ApiError, RemoteTender, WorkflowApi};
use crate::wire::{AwardPayload, BidPayload, ContractPayload, Envelope, TenderPayload};

pub struct DryRunApi<W> {
    out: Mutex<W>,
    next_id: AtomicU64,
}

impl<W: Write + Send> DryRunApi<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn emit<B: Serialize + ?Sized>(&self, call: &str, target: Option<&str>, body: &B) -> Result<String, ApiError> {
        let id = format!("dry-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let line = json!({
            "call": call,
            "target": target,
            "id": id,
            "body": serde_json::to_value(Envelope::new(body))?,
        });
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{line}")?;
        Ok(id)
    }
}

#[async_trait]
impl<W: Write + Send> WorkflowApi for DryRunApi<W> {
    async fn create_tender(&self, tender: &TenderPayload<'_>) -> Result<RemoteTender, ApiError> {
        let id = self.emit("create_tender", None, tender)?;
        Ok(RemoteTender {
            token: format!("{id}-token"),
            id,
        })
    }

    async fn patch_tender_status(&self, tender: &RemoteTender, status: &str) -> Result<(), ApiError> {
        self.emit("patch_tender_status", Some(tender.id.as_str()), &json!({ "status": status }))?;
        Ok(())
    }

    async fn create_bid(&self, tender: &RemoteTender, bid: &BidPayload<'_>) -> Result<String, ApiError> {
        self.emit("create_bid", Some(tender.id.as_str()), bid)
    }

    async fn create_award(
        &self,
        tender: &RemoteTender,
        award: &AwardPayload<'_>,
    ) -> Result<String, ApiError> {
        self.emit("create_award", Some(tender.id.as_str()), award)
    }

    async fn create_contract(
        &self,
        tender: &RemoteTender,
        contract: &ContractPayload<'_>,
    ) -> Result<String, ApiError> {
        self.emit("create_contract", Some(tender.id.as_str()), contract)
    }

    async fn activate_contract(&self, tender: &RemoteTender, contract_id: &str) -> Result<(), ApiError> {
        self.emit(
            "activate_contract",
            Some(tender.id.as_str()),
            &json!({ "contract": contract_id, "status": "active" }),
        )?;
        Ok(())
    }
}
