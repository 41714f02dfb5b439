//! Platform API client.
//!
//! [`PlatformApi`] is the seam between account logic and the merchant
//! platform; [`HttpPlatformApi`] is the production implementation over
//! reqwest. Tests substitute in-process fakes.

pub mod node;
pub mod types;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use types::{
    BackupData, BackupPayload, BusinessCreated, ChallengeGrant, Envelope, NewBusinessForm,
    NodeStatusSnapshot, NonceData, PeerHint, PriceQuote,
};

/// Operations the merchant platform exposes to the client.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    async fn register_user(&self, name: &str, email: &str, handle: &str) -> Result<()>;

    /// Ask for a fresh challenge nonce for the given user.
    async fn request_nonce(&self, email: &str, handle: &str) -> Result<String>;

    /// Submit the signed nonce; on success the platform grants a session.
    /// The nonce is echoed back so the platform can match the signature to
    /// its outstanding challenge.
    async fn submit_challenge(
        &self,
        email: &str,
        handle: &str,
        signature: &str,
        nonce: &str,
    ) -> Result<ChallengeGrant>;

    async fn fetch_backup(&self, token: &str, handle: &str) -> Result<String>;

    async fn put_backup(&self, token: &str, handle: &str, name: &str, backup: &str) -> Result<()>;

    async fn delete_user(&self, token: &str, handle: &str) -> Result<()>;

    async fn get_price(&self, token: &str, currency: &str) -> Result<PriceQuote>;

    /// Register a business; returns the platform-assigned business id.
    async fn new_business(&self, token: &str, form: &NewBusinessForm) -> Result<String>;

    async fn node_status(&self, token: &str, business_id: &str) -> Result<NodeStatusSnapshot>;

    async fn start_node(&self, token: &str, business_id: &str) -> Result<()>;

    async fn stop_node(&self, token: &str, business_id: &str) -> Result<()>;

    /// Hand the invoice macaroon to the platform; returns a suggested peer.
    async fn post_macaroon(&self, token: &str, business_id: &str, macaroon: &str)
        -> Result<PeerHint>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

pub struct HttpPlatformApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPlatformApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl PlatformApi for HttpPlatformApi {
    async fn register_user(&self, name: &str, email: &str, handle: &str) -> Result<()> {
        debug!(email = %email, "registering user");
        let response: Envelope<serde_json::Value> = self
            .client
            .post(self.url("u/new"))
            .json(&json!({ "name": name, "email": email, "pubkey": handle }))
            .send()
            .await?
            .json()
            .await?;
        response.check()
    }

    async fn request_nonce(&self, email: &str, handle: &str) -> Result<String> {
        let response: Envelope<NonceData> = self
            .client
            .get(self.url("challenge"))
            .query(&[("email", email), ("pubkey", handle)])
            .send()
            .await?
            .json()
            .await?;
        Ok(response.into_result()?.nonce)
    }

    async fn submit_challenge(
        &self,
        email: &str,
        handle: &str,
        signature: &str,
        nonce: &str,
    ) -> Result<ChallengeGrant> {
        let response: Envelope<ChallengeGrant> = self
            .client
            .post(self.url("challenge"))
            .json(&json!({
                "email": email,
                "pubkey": handle,
                "signature": signature,
                "nonce": nonce,
            }))
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    async fn fetch_backup(&self, token: &str, handle: &str) -> Result<String> {
        let response: Envelope<BackupData> = self
            .client
            .get(self.url(&format!("u/{handle}")))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;
        Ok(response.into_result()?.backup)
    }

    async fn put_backup(&self, token: &str, handle: &str, name: &str, backup: &str) -> Result<()> {
        let payload = BackupPayload {
            name: name.to_string(),
            backup: backup.to_string(),
        };
        let response: Envelope<serde_json::Value> = self
            .client
            .put(self.url(&format!("u/{handle}")))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;
        response.check()
    }

    async fn delete_user(&self, token: &str, handle: &str) -> Result<()> {
        let response: Envelope<serde_json::Value> = self
            .client
            .delete(self.url(&format!("u/{handle}")))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;
        response.check()
    }

    async fn get_price(&self, token: &str, currency: &str) -> Result<PriceQuote> {
        let response: Envelope<PriceQuote> = self
            .client
            .get(self.url("price"))
            .query(&[("currency", currency)])
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    async fn new_business(&self, token: &str, form: &NewBusinessForm) -> Result<String> {
        let response: Envelope<BusinessCreated> = self
            .client
            .post(self.url("b/new"))
            .bearer_auth(token)
            .json(form)
            .send()
            .await?
            .json()
            .await?;
        Ok(response.into_result()?.business_id)
    }

    async fn node_status(&self, token: &str, business_id: &str) -> Result<NodeStatusSnapshot> {
        let response: Envelope<NodeStatusSnapshot> = self
            .client
            .get(self.url(&format!("b/{business_id}/ln/status")))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    async fn start_node(&self, token: &str, business_id: &str) -> Result<()> {
        let response: Envelope<serde_json::Value> = self
            .client
            .get(self.url(&format!("b/{business_id}/ln/startNode")))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;
        response.check()
    }

    async fn stop_node(&self, token: &str, business_id: &str) -> Result<()> {
        let response: Envelope<serde_json::Value> = self
            .client
            .get(self.url(&format!("b/{business_id}/ln/stopNode")))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await?;
        response.check()
    }

    async fn post_macaroon(
        &self,
        token: &str,
        business_id: &str,
        macaroon: &str,
    ) -> Result<PeerHint> {
        let response: Envelope<PeerHint> = self
            .client
            .post(self.url(&format!("b/{business_id}/ln/macaroon")))
            .bearer_auth(token)
            .json(&json!({ "macaroon": macaroon }))
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(Error::Remote(
                response.message.unwrap_or_else(|| "request rejected".into()),
            ));
        }
        // Older platform deployments return no peer hint.
        Ok(response.data.unwrap_or_default())
    }
}
