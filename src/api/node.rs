//! Node-local wallet API.
//!
//! Once the platform assigns a node, wallet setup talks to the node's own
//! REST interface directly: seed generation, wallet init/unlock, macaroon
//! baking, and peer connection. Authenticated calls carry the admin macaroon
//! in the `Grpc-Metadata-Macaroon` header.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use super::types::{BakedMacaroon, GenSeed, InitWalletResponse, INVOICE_MACAROON_PERMISSIONS};

const MACAROON_HEADER: &str = "Grpc-Metadata-Macaroon";

/// Operations the node's wallet API exposes.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Generate a fresh aezeed mnemonic on the node.
    async fn gen_seed(&self, node_url: &str) -> Result<GenSeed>;

    /// Initialize the wallet; returns the base64 admin macaroon.
    async fn init_wallet(
        &self,
        node_url: &str,
        wallet_password: &str,
        mnemonic: &[String],
    ) -> Result<String>;

    async fn unlock_wallet(&self, node_url: &str, wallet_password: &str) -> Result<()>;

    /// Bake the invoice macaroon. Returns `None` while the node is still
    /// starting and not yet able to bake.
    async fn bake_macaroon(&self, node_url: &str, admin_macaroon: &str) -> Result<Option<String>>;

    async fn connect_peer(&self, node_url: &str, admin_macaroon: &str, pubkey: &str, host: &str)
        -> Result<()>;
}

pub struct HttpNodeApi {
    client: reqwest::Client,
    port: u16,
}

impl HttpNodeApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            port: config.node_port,
        })
    }

    fn url(&self, node_url: &str, path: &str) -> String {
        format!("https://{node_url}:{}/v1/{path}", self.port)
    }
}

#[async_trait]
impl NodeApi for HttpNodeApi {
    async fn gen_seed(&self, node_url: &str) -> Result<GenSeed> {
        debug!(node_url = %node_url, "generating wallet seed");
        let seed: GenSeed = self
            .client
            .get(self.url(node_url, "genseed"))
            .send()
            .await?
            .json()
            .await?;
        Ok(seed)
    }

    async fn init_wallet(
        &self,
        node_url: &str,
        wallet_password: &str,
        mnemonic: &[String],
    ) -> Result<String> {
        let response: InitWalletResponse = self
            .client
            .post(self.url(node_url, "initwallet"))
            .json(&json!({
                "wallet_password": wallet_password,
                "cipher_seed_mnemonic": mnemonic,
                "stateless_init": true,
            }))
            .send()
            .await?
            .json()
            .await?;
        Ok(response.admin_macaroon)
    }

    async fn unlock_wallet(&self, node_url: &str, wallet_password: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(node_url, "unlockwallet"))
            .json(&json!({
                "wallet_password": wallet_password,
                "stateless_init": true,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "wallet unlock failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn bake_macaroon(&self, node_url: &str, admin_macaroon: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(self.url(node_url, "macaroon"))
            .header(MACAROON_HEADER, admin_macaroon)
            .json(&json!({ "permissions": INVOICE_MACAROON_PERMISSIONS }))
            .send()
            .await?;
        if !response.status().is_success() {
            // The node answers errors while still spinning up; the caller
            // polls until it bakes.
            return Ok(None);
        }
        let baked: BakedMacaroon = response.json().await?;
        Ok(baked.macaroon)
    }

    async fn connect_peer(
        &self,
        node_url: &str,
        admin_macaroon: &str,
        pubkey: &str,
        host: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url(node_url, "peers"))
            .header(MACAROON_HEADER, admin_macaroon)
            .json(&json!({
                "addr": { "pubkey": pubkey, "host": host },
                "perm": true,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "peer connection failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[test]
    fn test_node_url_uses_configured_port() {
        let api = HttpNodeApi::new(&ClientConfig::default()).unwrap();
        assert_eq!(
            api.url("node-1.example.com", "genseed"),
            "https://node-1.example.com:8080/v1/genseed"
        );
    }
}
