//! HTTP client for the remote tender API.

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiError, RemoteTender, WorkflowApi};
use crate::driver::WorkflowConfig;
use crate::wire::{
    status, AwardPayload, BidPayload, ContractPayload, Envelope, StatusPatch, TenderPayload,
};

/// [`WorkflowApi`] over HTTP. Bodies go out inside a `{"data": ...}`
/// envelope with basic auth (token as user name, empty password).
pub struct HttpWorkflowClient {
    client: reqwest::Client,
    base_url: Url,
    broker_token: String,
    bidder_token: String,
}

#[derive(Deserialize)]
struct Created {
    data: CreatedData,
    access: Option<Access>,
}

#[derive(Deserialize)]
struct CreatedData {
    id: String,
}

#[derive(Deserialize)]
struct Access {
    token: String,
}

impl HttpWorkflowClient {
    /// `config.base_url` is the tender collection, e.g.
    /// `http://localhost:6543/api/2.4/tenders`. A trailing slash is dropped.
    /// Every request is bounded by `config.request_timeout`.
    pub fn new(config: &WorkflowConfig) -> Result<Self, ApiError> {
        let raw = config.base_url.trim_end_matches('/');
        let base_url = Url::parse(raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(raw.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            broker_token: config.broker_token.clone(),
            bidder_token: config.bidder_token.clone(),
        })
    }

    /// `{base_url}/{tender id}/{tail...}`, each segment percent-encoded.
    fn tender_url(&self, tender: &RemoteTender, tail: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(&tender.id)
            .extend(tail);
        Ok(url)
    }

    /// Broker PATCH carrying the tender's access token as `acc_token`.
    fn owner_patch(&self, url: Url, tender: &RemoteTender) -> reqwest::RequestBuilder {
        self.client
            .patch(url)
            .basic_auth(&self.broker_token, None::<&str>)
            .query(&[("acc_token", tender.token.as_str())])
    }

    async fn send<B, R>(&self, req: reqwest::RequestBuilder, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let resp = req.json(&Envelope::new(body)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn post_created<B: Serialize + ?Sized>(
        &self,
        url: Url,
        token: &str,
        body: &B,
    ) -> Result<String, ApiError> {
        debug!(%url, "POST");
        let req = self.client.post(url).basic_auth(token, None::<&str>);
        let created: Created = self.send(req, body).await?;
        Ok(created.data.id)
    }

    async fn patch<B: Serialize + ?Sized>(
        &self,
        url: Url,
        tender: &RemoteTender,
        body: &B,
    ) -> Result<(), ApiError> {
        debug!(%url, "PATCH");
        let req = self.owner_patch(url, tender);
        let _: serde_json::Value = self.send(req, body).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowApi for HttpWorkflowClient {
    async fn create_tender(&self, tender: &TenderPayload<'_>) -> Result<RemoteTender, ApiError> {
        debug!(url = %self.base_url, "POST");
        let req = self
            .client
            .post(self.base_url.clone())
            .basic_auth(&self.broker_token, None::<&str>);
        let created: Created = self.send(req, tender).await?;
        let token = created
            .access
            .map(|a| a.token)
            .ok_or(ApiError::MissingField("access.token"))?;
        Ok(RemoteTender {
            id: created.data.id,
            token,
        })
    }

    async fn patch_tender_status(&self, tender: &RemoteTender, to: &str) -> Result<(), ApiError> {
        let url = self.tender_url(tender, &[])?;
        self.patch(url, tender, &StatusPatch { status: to }).await
    }

    async fn create_bid(&self, tender: &RemoteTender, bid: &BidPayload<'_>) -> Result<String, ApiError> {
        let url = self.tender_url(tender, &["bids"])?;
        self.post_created(url, &self.bidder_token, bid).await
    }

    async fn create_award(
        &self,
        tender: &RemoteTender,
        award: &AwardPayload<'_>,
    ) -> Result<String, ApiError> {
        let url = self.tender_url(tender, &["awards"])?;
        self.post_created(url, &self.broker_token, award).await
    }

    async fn create_contract(
        &self,
        tender: &RemoteTender,
        contract: &ContractPayload<'_>,
    ) -> Result<String, ApiError> {
        let url = self.tender_url(tender, &["contracts"])?;
        self.post_created(url, &self.broker_token, contract).await
    }

    async fn activate_contract(&self, tender: &RemoteTender, contract_id: &str) -> Result<(), ApiError> {
        let url = self.tender_url(tender, &["contracts", contract_id])?;
        self.patch(url, tender, &StatusPatch { status: status::ACTIVE }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tender(id: &str, token: &str) -> RemoteTender {
        RemoteTender {
            id: id.into(),
            token: token.into(),
        }
    }

    #[test]
    fn client_trims_trailing_slash() {
        let config = WorkflowConfig {
            base_url: "http://localhost:6543/api/2.4/tenders/".into(),
            ..WorkflowConfig::default()
        };
        let client = HttpWorkflowClient::new(&config).unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:6543/api/2.4/tenders");
    }

    #[test]
    fn sub_resources_hang_off_tender_url() {
        let client = HttpWorkflowClient::new(&WorkflowConfig::default()).unwrap();
        let t = tender("abc", "tok");
        assert_eq!(
            client.tender_url(&t, &[]).unwrap().as_str(),
            "http://localhost:6543/api/2.4/tenders/abc"
        );
        assert_eq!(
            client.tender_url(&t, &["bids"]).unwrap().as_str(),
            "http://localhost:6543/api/2.4/tenders/abc/bids"
        );
    }

    #[test]
    fn path_segments_and_token_are_encoded() {
        let client = HttpWorkflowClient::new(&WorkflowConfig::default()).unwrap();
        let t = tender("abc", "a&b=c");
        let url = client.tender_url(&t, &["contracts", "c/1?x"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:6543/api/2.4/tenders/abc/contracts/c%2F1%3Fx"
        );

        let req = client.owner_patch(url, &t).build().unwrap();
        assert_eq!(req.url().query(), Some("acc_token=a%26b%3Dc"));
        let pairs: Vec<(String, String)> = req.url().query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert_eq!(pairs, [("acc_token".to_string(), "a&b=c".to_string())]);
    }

    #[tokio::test]
    async fn silent_server_times_out_as_retryable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = WorkflowConfig {
            base_url: format!("http://{addr}/tenders"),
            request_timeout: Duration::from_millis(200),
            ..WorkflowConfig::default()
        };
        let client = HttpWorkflowClient::new(&config).unwrap();
        let err = client
            .patch_tender_status(&tender("abc", "tok"), status::COMPLETE)
            .await
            .unwrap_err();
        assert!(matches!(&err, ApiError::Http(e) if e.is_timeout()));
        assert!(err.is_retryable());
    }

    #[test]
    fn unusable_base_url_is_rejected() {
        for base in ["not a url", "mailto:ops@example.org"] {
            let config = WorkflowConfig {
                base_url: base.into(),
                ..WorkflowConfig::default()
            };
            let err = HttpWorkflowClient::new(&config).err().unwrap();
            assert!(matches!(err, ApiError::InvalidUrl(_)));
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn created_response_parses_id_and_token() {
        let json = r#"{"data": {"id": "t-1", "status": "draft"}, "access": {"token": "secret"}}"#;
        let created: Created = serde_json::from_str(json).unwrap();
        assert_eq!(created.data.id, "t-1");
        assert_eq!(created.access.unwrap().token, "secret");

        let json = r#"{"data": {"id": "bid-1"}}"#;
        let created: Created = serde_json::from_str(json).unwrap();
        assert!(created.access.is_none());
    }
}
