//! Account orchestrator.
//!
//! [`Account`] ties the pieces together: passphrase-derived identity,
//! encrypted state backups, session management, business registration, and
//! lightning-node lifecycle. Every public operation reports progress through
//! the status hub, and failures are pushed into the rolling error log before
//! they propagate to the caller.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};

use crate::api::node::{HttpNodeApi, NodeApi};
use crate::api::types::{NewBusinessForm, NodeStatus, NodeStatusSnapshot, PriceQuote};
use crate::api::{HttpPlatformApi, PlatformApi};
use crate::config::ClientConfig;
use crate::crypto::{kdf, vault};
use crate::error::{Error, ErrorLog, RecordedError, Result};
use crate::identity::Identity;
use crate::session::SessionManager;
use crate::state::{Role, StateRecord};
use crate::status::{Status, StatusHub};

pub struct Account {
    config: ClientConfig,
    api: Arc<dyn PlatformApi>,
    node: Arc<dyn NodeApi>,
    identity: Option<Identity>,
    session: SessionManager,
    state: StateRecord,
    hub: StatusHub,
    errors: ErrorLog,
    registered: bool,
}

impl Account {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = Arc::new(HttpPlatformApi::new(&config)?);
        let node = Arc::new(HttpNodeApi::new(&config)?);
        Ok(Self::with_collaborators(config, api, node))
    }

    /// Build an account around explicit API implementations.
    pub fn with_collaborators(
        config: ClientConfig,
        api: Arc<dyn PlatformApi>,
        node: Arc<dyn NodeApi>,
    ) -> Self {
        let session = SessionManager::new(config.session_margin);
        let errors = ErrorLog::new(config.error_log_capacity);
        Self {
            config,
            api,
            node,
            identity: None,
            session,
            state: StateRecord::default(),
            hub: StatusHub::new(),
            errors,
            registered: false,
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Register a status observer. Observers are invoked synchronously, in
    /// registration order, for every status change.
    pub fn subscribe<F>(&mut self, f: F)
    where
        F: Fn(Status) + Send + Sync + 'static,
    {
        self.hub.subscribe(f);
    }

    pub fn status(&self) -> Status {
        self.hub.current()
    }

    /// The user's platform handle, once an identity is loaded.
    pub fn handle(&self) -> Option<&str> {
        self.identity.as_ref().map(Identity::handle)
    }

    /// True once keys have been derived (signup or login started).
    pub fn is_initiated(&self) -> bool {
        self.identity.is_some()
    }

    /// True once the user is known to the platform.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// True once the platform has assigned a node to the user's business.
    pub fn has_node(&self) -> bool {
        self.state.business.has_node()
    }

    pub fn recent_errors(&self) -> Vec<RecordedError> {
        self.errors.recent().cloned().collect()
    }

    // =========================================================================
    // Identity lifecycle
    // =========================================================================

    /// Create a brand-new platform user from a passphrase.
    pub async fn signup(&mut self, name: &str, email: &str, passphrase: &str) -> Result<()> {
        let result = self.signup_inner(name, email, passphrase).await;
        self.finish(result)
    }

    async fn signup_inner(&mut self, name: &str, email: &str, passphrase: &str) -> Result<()> {
        self.hub.notify(Status::StartingSignup);
        if name.is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        if email.is_empty() {
            return Err(Error::Validation("email must not be empty".into()));
        }

        let identity = self.derive_identity(email, passphrase)?;
        self.state = StateRecord::default();
        self.state.private_key = identity.private_key().clone();
        self.state.totp_key = identity.totp_key().clone();
        self.state.public_key = identity.public_key_hex();
        self.state.name = name.to_string();
        self.state.email = email.to_string();

        self.hub.notify(Status::RegisteringUser);
        self.api
            .register_user(name, email, identity.handle())
            .await?;
        self.hub.notify(Status::UserRegistered);
        info!(handle = %identity.handle(), "user registered");

        self.identity = Some(identity);
        self.renew_session().await?;
        self.registered = true;
        self.push_backup().await?;
        self.hub.notify(Status::UserCreated);
        Ok(())
    }

    /// Reconstruct an existing account from its passphrase and the encrypted
    /// backup held by the platform.
    pub async fn login(&mut self, email: &str, passphrase: &str) -> Result<()> {
        let result = self.login_inner(email, passphrase).await;
        self.finish(result)
    }

    async fn login_inner(&mut self, email: &str, passphrase: &str) -> Result<()> {
        self.hub.notify(Status::StartingLogin);
        if email.is_empty() {
            return Err(Error::Validation("email must not be empty".into()));
        }

        let identity = self.derive_identity(email, passphrase)?;
        self.identity = Some(identity);
        self.state.email = email.to_string();
        self.renew_session().await?;

        let identity = self.current_identity()?;
        let envelope = self
            .api
            .fetch_backup(self.session.token(), identity.handle())
            .await?;

        self.hub.notify(Status::Decrypting);
        let mut record = vault::open(identity.private_key().as_bytes(), &envelope)?;
        self.hub.notify(Status::Decrypted);

        // The freshly granted session always wins over sealed session fields.
        record.bearer_token = self.session.token().to_string();
        record.challenge_expires = self.session.expires_at_ms();
        self.state = record;
        self.registered = true;
        self.hub.notify(Status::LoggedIn);
        Ok(())
    }

    /// Remove the user from the platform and wipe local state.
    pub async fn delete_user(&mut self) -> Result<()> {
        let result = self.delete_user_inner().await;
        self.finish(result)
    }

    async fn delete_user_inner(&mut self) -> Result<()> {
        self.ensure_session().await?;
        let identity = self.current_identity()?;
        self.api
            .delete_user(self.session.token(), identity.handle())
            .await?;
        self.identity = None;
        self.session.clear();
        self.state = StateRecord::default();
        self.registered = false;
        Ok(())
    }

    // =========================================================================
    // Backup
    // =========================================================================

    /// Seal the current state and store it with the platform.
    pub async fn backup(&mut self) -> Result<()> {
        let result = self.push_backup().await;
        self.finish(result)
    }

    async fn push_backup(&mut self) -> Result<()> {
        self.ensure_session().await?;
        self.hub.notify(Status::BackingUp);

        // Sync the live session into the record before sealing.
        self.state.bearer_token = self.session.token().to_string();
        self.state.challenge_expires = self.session.expires_at_ms();

        let identity = self.current_identity()?;
        self.hub.notify(Status::Encrypting);
        let envelope = vault::seal(identity.private_key().as_bytes(), &self.state)?;
        self.hub.notify(Status::Encrypted);

        self.hub.notify(Status::Saving);
        self.api
            .put_backup(
                self.session.token(),
                identity.handle(),
                &self.state.name,
                &envelope,
            )
            .await?;
        self.hub.notify(Status::Saved);
        Ok(())
    }

    // =========================================================================
    // Business & pricing
    // =========================================================================

    /// Register a business; the caller becomes its merchant.
    pub async fn register_business(&mut self, form: &NewBusinessForm) -> Result<()> {
        let result = self.register_business_inner(form).await;
        self.finish(result)
    }

    async fn register_business_inner(&mut self, form: &NewBusinessForm) -> Result<()> {
        if form.business_name.is_empty() {
            return Err(Error::Validation("business name must not be empty".into()));
        }
        self.ensure_session().await?;
        self.hub.notify(Status::RegisteringBusiness);
        let business_id = self.api.new_business(self.session.token(), form).await?;
        self.state.business.business_id = business_id;
        self.state.business.business_name = form.business_name.clone();
        self.state.business.role = Some(Role::Merchant);
        self.hub.notify(Status::BusinessRegistered);
        self.push_backup().await?;
        Ok(())
    }

    /// Fetch the current bitcoin price in `currency`.
    pub async fn get_price(&mut self, currency: &str) -> Result<PriceQuote> {
        let result = self.get_price_inner(currency).await;
        self.finish(result)
    }

    async fn get_price_inner(&mut self, currency: &str) -> Result<PriceQuote> {
        if currency.is_empty() {
            return Err(Error::Validation("currency must not be empty".into()));
        }
        self.ensure_session().await?;
        self.hub.notify(Status::FetchingPrice);
        let quote = self.api.get_price(self.session.token(), currency).await?;
        self.hub.notify(Status::PriceFetched);
        Ok(quote)
    }

    // =========================================================================
    // Node lifecycle
    // =========================================================================

    /// Poll the platform for node status, folding newly assigned node
    /// details into the state and unlocking the wallet when asked to.
    pub async fn get_node_status(&mut self) -> Result<NodeStatusSnapshot> {
        let result = self.get_node_status_inner().await;
        self.finish(result)
    }

    async fn get_node_status_inner(&mut self) -> Result<NodeStatusSnapshot> {
        let business_id = self.require_business_id()?;
        self.ensure_session().await?;
        let snapshot = self
            .api
            .node_status(self.session.token(), &business_id)
            .await?;

        // Node details are folded in once, on first assignment; an already
        // recorded node is never silently rebound.
        let mut changed = false;
        if self.state.business.node_id.is_empty() && !snapshot.node_id.is_empty() {
            self.state.business.node_id = snapshot.node_id.clone();
            changed = true;
        }
        if self.state.business.node_url.is_empty() && !snapshot.node_url.is_empty() {
            self.state.business.node_url = snapshot.node_url.clone();
            changed = true;
        }

        if snapshot.status == NodeStatus::WaitingUnlock {
            if self.state.business.node_password.is_empty() {
                return Err(Error::Validation(
                    "node awaits unlock but no wallet password is on record".into(),
                ));
            }
            debug!(node_id = %self.state.business.node_id, "unlocking wallet");
            self.node
                .unlock_wallet(
                    &self.state.business.node_url,
                    &self.state.business.node_password,
                )
                .await?;
        }

        if changed {
            self.push_backup().await?;
        }
        Ok(snapshot)
    }

    /// Initialize the wallet on a freshly assigned node: generate a seed,
    /// init the wallet, bake the invoice macaroon and hand it to the
    /// platform, then connect to the suggested peer.
    pub async fn init_node(&mut self) -> Result<()> {
        let result = self.init_node_inner().await;
        self.finish(result)
    }

    async fn init_node_inner(&mut self) -> Result<()> {
        let business_id = self.require_business_id()?;
        if !self.state.business.has_node() {
            return Err(Error::Validation(
                "no node has been assigned to this business yet".into(),
            ));
        }
        self.ensure_session().await?;
        self.hub.notify(Status::InitializingNode);

        let node_url = self.state.business.node_url.clone();
        let seed = self.node.gen_seed(&node_url).await?;
        self.state.business.mnemonic = seed.cipher_seed_mnemonic.join(" ");
        self.state.business.enciphered_seed = seed.enciphered_seed.clone();

        let mut password_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut password_bytes);
        let wallet_password = STANDARD.encode(password_bytes);
        self.state.business.node_password = wallet_password.clone();

        let admin_b64 = self
            .node
            .init_wallet(&node_url, &wallet_password, &seed.cipher_seed_mnemonic)
            .await?;
        let admin_raw = STANDARD
            .decode(&admin_b64)
            .map_err(|_| Error::Remote("admin macaroon is not valid base64".into()))?;
        let admin_hex = hex::encode(admin_raw);
        self.state.business.macaroon = admin_hex.clone();
        self.hub.notify(Status::NodeInitialized);
        info!(node_id = %self.state.business.node_id, "wallet initialized");

        // Secrets first: the seed and password must survive a crash during
        // the macaroon wait.
        self.push_backup().await?;

        self.hub.notify(Status::BakingMacaroon);
        let node = Arc::clone(&self.node);
        let bake_url = node_url;
        let bake_admin = admin_hex;
        let retry = self.config.macaroon_retry.clone();
        let invoice_macaroon = retry
            .poll(move |attempt| {
                let node = Arc::clone(&node);
                let url = bake_url.clone();
                let admin = bake_admin.clone();
                async move {
                    debug!(attempt, "requesting invoice macaroon");
                    node.bake_macaroon(&url, &admin).await
                }
            })
            .await?;
        self.hub.notify(Status::MacaroonBaked);

        self.ensure_session().await?;
        let peer = self
            .api
            .post_macaroon(self.session.token(), &business_id, &invoice_macaroon)
            .await?;
        // The suggested peer is only reported; connecting is a separate,
        // explicitly requested operation.
        if !peer.pubkey.is_empty() {
            info!(pubkey = %peer.pubkey, host = %peer.host, "platform suggested a peer");
        }

        self.push_backup().await?;
        Ok(())
    }

    pub async fn start_node(&mut self) -> Result<()> {
        let result = self.start_node_inner().await;
        self.finish(result)
    }

    async fn start_node_inner(&mut self) -> Result<()> {
        let business_id = self.require_business_id()?;
        self.ensure_session().await?;
        self.hub.notify(Status::StartingNode);
        self.api
            .start_node(self.session.token(), &business_id)
            .await?;
        self.hub.notify(Status::NodeStarted);
        Ok(())
    }

    pub async fn stop_node(&mut self) -> Result<()> {
        let result = self.stop_node_inner().await;
        self.finish(result)
    }

    async fn stop_node_inner(&mut self) -> Result<()> {
        let business_id = self.require_business_id()?;
        self.ensure_session().await?;
        self.hub.notify(Status::StoppingNode);
        self.api
            .stop_node(self.session.token(), &business_id)
            .await?;
        self.hub.notify(Status::NodeStopped);
        Ok(())
    }

    /// Connect the business node to an explicit lightning peer.
    pub async fn connect_peer(&mut self, pubkey: &str, host: &str) -> Result<()> {
        let result = self.connect_peer_inner(pubkey, host).await;
        self.finish(result)
    }

    async fn connect_peer_inner(&mut self, pubkey: &str, host: &str) -> Result<()> {
        if pubkey.is_empty() || host.is_empty() {
            return Err(Error::Validation("peer pubkey and host are required".into()));
        }
        if !self.state.business.has_node() || self.state.business.macaroon.is_empty() {
            return Err(Error::Validation(
                "node must be initialized before connecting peers".into(),
            ));
        }
        self.hub.notify(Status::ConnectingPeer);
        self.node
            .connect_peer(
                &self.state.business.node_url,
                &self.state.business.macaroon,
                pubkey,
                host,
            )
            .await?;
        self.hub.notify(Status::PeerConnected);
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn derive_identity(&self, email: &str, passphrase: &str) -> Result<Identity> {
        self.hub.notify(Status::GeneratingKeys);
        let keys = kdf::derive_identity(email, passphrase)?;
        Identity::from_parts(&keys.private_key, &keys.totp_key)
    }

    fn current_identity(&self) -> Result<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| Error::Validation("no identity loaded; signup or login first".into()))
    }

    fn require_business_id(&self) -> Result<String> {
        if self.state.business.business_id.is_empty() {
            return Err(Error::Validation("no business is registered".into()));
        }
        Ok(self.state.business.business_id.clone())
    }

    async fn ensure_session(&mut self) -> Result<()> {
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| Error::Validation("no identity loaded; signup or login first".into()))?;
        self.session
            .ensure(self.api.as_ref(), identity, &self.state.email, &self.hub)
            .await
    }

    async fn renew_session(&mut self) -> Result<()> {
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| Error::Validation("no identity loaded; signup or login first".into()))?;
        self.session
            .renew(self.api.as_ref(), identity, &self.state.email, &self.hub)
            .await
    }

    /// Close out an operation: success returns to `Ready`, failure is
    /// recorded and reported before the error propagates.
    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.hub.notify(Status::Ready);
                Ok(value)
            }
            Err(err) => {
                self.errors.push(&err);
                self.hub.notify(Status::Error);
                Err(err)
            }
        }
    }
}
