//! The remote workflow API as seen by the driver.

use async_trait::async_trait;
use thiserror::Error;

use crate::wire::{AwardPayload, BidPayload, ContractPayload, TenderPayload};

#[derive(Error, Debug)]
pub enum ApiError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Transport failures, throttling and server-side errors may succeed on a
    /// later attempt; anything else will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Http(e) => !(e.is_decode() || e.is_builder()),
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::Io(_) | Self::MissingField(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Handle on a tender created remotely: its id and the access token required
/// for every later mutation of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTender {
    pub id: String,
    pub token: String,
}

/// Operations the workflow driver needs from the remote system.
///
/// `create_*` methods return the remote id of the created sub-resource.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    async fn create_tender(&self, tender: &TenderPayload<'_>) -> Result<RemoteTender, ApiError>;

    async fn patch_tender_status(&self, tender: &RemoteTender, status: &str) -> Result<(), ApiError>;

    async fn create_bid(&self, tender: &RemoteTender, bid: &BidPayload<'_>) -> Result<String, ApiError>;

    async fn create_award(
        &self,
        tender: &RemoteTender,
        award: &AwardPayload<'_>,
    ) -> Result<String, ApiError>;

    async fn create_contract(
        &self,
        tender: &RemoteTender,
        contract: &ContractPayload<'_>,
    ) -> Result<String, ApiError>;

    async fn activate_contract(&self, tender: &RemoteTender, contract_id: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        let server = |status| ApiError::Server {
            status,
            body: String::new(),
        };
        assert!(server(429).is_retryable());
        assert!(server(503).is_retryable());
        assert!(!server(422).is_retryable());
        assert!(!server(403).is_retryable());
        assert!(!ApiError::MissingField("data.id").is_retryable());
    }
}
