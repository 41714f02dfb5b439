//! Signed-nonce session protocol.
//!
//! A session is obtained by fetching a nonce for the user, signing it with
//! the identity key, and exchanging the signature for a bearer token. The
//! granted expiry is shortened by a safety margin so a token is never
//! presented moments before the platform rejects it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::DateTime;
use tracing::{debug, info};

use crate::api::PlatformApi;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::status::{Status, StatusHub};

/// Current time in epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Shorten a granted expiry by the session margin, saturating at zero.
pub fn expiry_with_margin(expires_ms: u64, margin: Duration) -> u64 {
    expires_ms.saturating_sub(margin.as_millis() as u64)
}

// =============================================================================
// Session
// =============================================================================

/// A granted bearer session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: String,
    /// Margin-adjusted expiry in epoch milliseconds. Zero means no session.
    pub expires_at_ms: u64,
}

impl Session {
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        self.expires_at_ms != 0 && now_ms < self.expires_at_ms
    }
}

// =============================================================================
// Session manager
// =============================================================================

/// Tracks the current session and re-runs the challenge when it lapses.
#[derive(Debug)]
pub struct SessionManager {
    session: Session,
    margin: Duration,
}

impl SessionManager {
    pub fn new(margin: Duration) -> Self {
        Self {
            session: Session::default(),
            margin,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn token(&self) -> &str {
        &self.session.token
    }

    pub fn expires_at_ms(&self) -> u64 {
        self.session.expires_at_ms
    }

    /// Restore a previously granted session, re-applying validity at use.
    pub fn restore(&mut self, token: String, expires_at_ms: u64) {
        self.session = Session {
            token,
            expires_at_ms,
        };
    }

    pub fn clear(&mut self) {
        self.session = Session::default();
    }

    /// Ensure a valid session exists, running the challenge if needed.
    pub async fn ensure(
        &mut self,
        api: &dyn PlatformApi,
        identity: &Identity,
        email: &str,
        hub: &StatusHub,
    ) -> Result<()> {
        hub.notify(Status::CheckingExpiry);
        if self.session.is_valid_at(now_ms()) {
            debug!("session still valid, skipping challenge");
            return Ok(());
        }
        self.renew(api, identity, email, hub).await
    }

    /// Run the full signed-nonce challenge unconditionally.
    pub async fn renew(
        &mut self,
        api: &dyn PlatformApi,
        identity: &Identity,
        email: &str,
        hub: &StatusHub,
    ) -> Result<()> {
        if email.is_empty() {
            return Err(Error::Validation("email is required for a session".into()));
        }

        hub.notify(Status::StartingChallenge);
        let nonce = api.request_nonce(email, identity.handle()).await?;
        if nonce.is_empty() {
            return Err(Error::Remote("platform issued an empty nonce".into()));
        }

        hub.notify(Status::SigningChallenge);
        let nonce_bytes = decode_nonce(&nonce)?;
        let signature = identity.sign(&nonce_bytes)?;
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

        hub.notify(Status::SendingChallenge);
        let grant = api
            .submit_challenge(email, identity.handle(), &signature_b64, &nonce)
            .await?;

        let expires_ms = parse_expiry(&grant.expires)?;
        self.session = Session {
            token: grant.token,
            expires_at_ms: expiry_with_margin(expires_ms, self.margin),
        };
        info!(expires_at_ms = self.session.expires_at_ms, "session granted");
        hub.notify(Status::ChallengeComplete);
        Ok(())
    }
}

/// Decode a base64url nonce, tolerating both padded and unpadded forms.
fn decode_nonce(nonce: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(nonce)
        .or_else(|_| URL_SAFE.decode(nonce))
        .map_err(|_| Error::Remote("challenge nonce is not valid base64".into()))
}

fn parse_expiry(expires: &str) -> Result<u64> {
    let parsed = DateTime::parse_from_rfc3339(expires)
        .map_err(|_| Error::Remote(format!("unparseable session expiry: {expires}")))?;
    Ok(parsed.timestamp_millis().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_boundaries() {
        let session = Session {
            token: "t".into(),
            expires_at_ms: 1_000,
        };
        assert!(session.is_valid_at(999));
        assert!(!session.is_valid_at(1_000));
        assert!(!session.is_valid_at(1_001));
    }

    #[test]
    fn test_empty_session_is_never_valid() {
        assert!(!Session::default().is_valid_at(0));
    }

    #[test]
    fn test_margin_is_subtracted() {
        assert_eq!(
            expiry_with_margin(1_000_000, Duration::from_secs(60)),
            940_000
        );
    }

    #[test]
    fn test_margin_saturates_at_zero() {
        assert_eq!(expiry_with_margin(5_000, Duration::from_secs(60)), 0);
    }

    #[test]
    fn test_decode_nonce_accepts_both_paddings() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef, 0x01];
        let unpadded = URL_SAFE_NO_PAD.encode(&bytes);
        let padded = URL_SAFE.encode(&bytes);
        assert_eq!(decode_nonce(&unpadded).unwrap(), bytes);
        assert_eq!(decode_nonce(&padded).unwrap(), bytes);
        assert!(decode_nonce("not base64!!").is_err());
    }

    #[test]
    fn test_parse_expiry_rfc3339() {
        let ms = parse_expiry("2026-01-01T00:00:00Z").unwrap();
        assert_eq!(ms, 1_767_225_600_000);
        assert!(parse_expiry("tomorrow").is_err());
    }
}
