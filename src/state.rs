//! The persistent account state record.
//!
//! `StateRecord` is the mutable superset of everything an account needs to
//! resume work after a restart: identity material, session fields, profile,
//! and the business/node sub-record. It is persisted server-side only inside
//! the encrypted vault (see `crypto::vault`).
//!
//! Raw secret fields use [`SecretBytes`], which serializes as an explicit
//! discriminated wrapper (`{"bytes": "<hex>"}`) so binary fields survive the
//! JSON round trip without relying on string-prefix sniffing.

use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

// =============================================================================
// SecretBytes
// =============================================================================

/// Raw secret bytes, zeroized on drop and redacted from debug output.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<[u8; 32]> for SecretBytes {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes({} bytes)", self.0.len())
    }
}

impl Serialize for SecretBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Discriminated wrapper: plain text can never be mistaken for bytes.
        let mut s = serializer.serialize_struct("SecretBytes", 1)?;
        s.serialize_field("bytes", &hex::encode(&self.0))?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for SecretBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Tagged {
            bytes: String,
        }
        let tagged = Tagged::deserialize(deserializer)?;
        let bytes = hex::decode(&tagged.bytes).map_err(D::Error::custom)?;
        Ok(Self(bytes))
    }
}

// =============================================================================
// Roles
// =============================================================================

/// A user's role within a business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Merchant,
    Manager,
    Cashier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Merchant => "merchant",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }
}

// =============================================================================
// Business sub-record
// =============================================================================

/// Business linkage and node-operational fields.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub business_name: String,
    pub business_id: String,
    /// Public key of the business as issued by the platform.
    pub business_pub: String,
    pub role: Option<Role>,
    pub node_id: String,
    pub node_url: String,
    pub node_password: String,
    /// Hex-encoded admin macaroon of the business node.
    pub macaroon: String,
    pub mnemonic: String,
    pub enciphered_seed: String,
}

impl BusinessRecord {
    /// True once the platform has assigned a node to this business.
    pub fn has_node(&self) -> bool {
        !self.node_id.is_empty() && !self.node_url.is_empty()
    }
}

impl fmt::Debug for BusinessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusinessRecord")
            .field("business_name", &self.business_name)
            .field("business_id", &self.business_id)
            .field("role", &self.role)
            .field("node_id", &self.node_id)
            .field("node_url", &self.node_url)
            .field("node_password", &"<redacted>")
            .field("macaroon", &"<redacted>")
            .field("mnemonic", &"<redacted>")
            .field("enciphered_seed", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// State record
// =============================================================================

/// Everything the account needs to resume work, persisted encrypted.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// User's private signing key.
    pub private_key: SecretBytes,
    /// User's TOTP key, reserved for a second factor.
    pub totp_key: SecretBytes,
    /// Hex-encoded x-only public key.
    pub public_key: String,
    pub name: String,
    pub email: String,
    /// Session expiry in epoch milliseconds. Overwritten from the live
    /// session after decryption; never trusted from the ciphertext.
    pub challenge_expires: u64,
    pub bearer_token: String,
    /// Public key of the platform counterparty.
    pub platform_pub: String,
    pub business: BusinessRecord,
}

impl fmt::Debug for StateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRecord")
            .field("private_key", &self.private_key)
            .field("totp_key", &self.totp_key)
            .field("public_key", &self.public_key)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("challenge_expires", &self.challenge_expires)
            .field("bearer_token", &"<redacted>")
            .field("business", &self.business)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_bytes_tagged_round_trip() {
        let secret = SecretBytes::from_slice(&[1, 2, 3, 255]);
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, r#"{"bytes":"010203ff"}"#);

        let back: SecretBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_secret_bytes_empty_round_trip() {
        let secret = SecretBytes::default();
        let json = serde_json::to_string(&secret).unwrap();
        let back: SecretBytes = serde_json::from_str(&json).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_secret_bytes_rejects_bad_hex() {
        let result: Result<SecretBytes, _> = serde_json::from_str(r#"{"bytes":"zz"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut record = StateRecord::default();
        record.bearer_token = "token-abc".into();
        record.business.node_password = "hunter2".into();
        record.business.mnemonic = "abandon ability able".into();

        let debug = format!("{record:?}");
        assert!(!debug.contains("token-abc"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("abandon"));
    }

    #[test]
    fn test_state_record_json_round_trip() {
        let mut record = StateRecord::default();
        record.private_key = SecretBytes::from_slice(&[7u8; 32]);
        record.name = "Alice".into();
        record.challenge_expires = 1_700_000_000_000;
        record.business.role = Some(Role::Merchant);
        record.business.node_id = "node-1".into();

        let json = serde_json::to_string(&record).unwrap();
        let back: StateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.challenge_expires, 1_700_000_000_000);
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Merchant).unwrap(), "\"merchant\"");
        assert_eq!(Role::Cashier.as_str(), "cashier");
    }

    #[test]
    fn test_has_node() {
        let mut business = BusinessRecord::default();
        assert!(!business.has_node());
        business.node_id = "node-1".into();
        assert!(!business.has_node());
        business.node_url = "node-1.example.com".into();
        assert!(business.has_node());
    }
}
