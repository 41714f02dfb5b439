//! Wire types for the platform and node APIs.

use serde::{Deserialize, Serialize};

// =============================================================================
// Platform envelope
// =============================================================================

/// Standard platform response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning a platform-side failure into an error.
    pub fn into_result(self) -> crate::error::Result<T> {
        if !self.ok {
            return Err(crate::error::Error::Remote(
                self.message.unwrap_or_else(|| "request rejected".into()),
            ));
        }
        self.data
            .ok_or_else(|| crate::error::Error::Remote("response carried no data".into()))
    }

    /// Check success for responses whose payload is irrelevant.
    pub fn check(self) -> crate::error::Result<()> {
        if !self.ok {
            return Err(crate::error::Error::Remote(
                self.message.unwrap_or_else(|| "request rejected".into()),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NonceData {
    pub nonce: String,
}

/// Result of a completed signed-nonce challenge.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeGrant {
    pub token: String,
    /// RFC 3339 expiry timestamp.
    pub expires: String,
}

// =============================================================================
// User & business
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BackupPayload {
    #[serde(default)]
    pub name: String,
    pub backup: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupData {
    #[serde(default)]
    pub backup: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceQuote {
    /// Decimal price as the platform formats it, e.g. `"58000.00"`.
    pub price: String,
    pub symbol: String,
}

/// Business registration form, camelCase on the wire.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBusinessForm {
    pub name: String,
    pub address: String,
    pub business_name: String,
    pub phone: String,
    pub email: String,
    pub annual_revenue: u64,
    pub website: String,
    pub channel_size: u64,
    pub activation_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessCreated {
    pub business_id: String,
}

// =============================================================================
// Node lifecycle
// =============================================================================

/// Lifecycle states the platform reports for a lightning node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Provisioning,
    WaitingInit,
    WaitingUnlock,
    WaitingStart,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Provisioning => "provisioning",
            NodeStatus::WaitingInit => "waiting_init",
            NodeStatus::WaitingUnlock => "waiting_unlock",
            NodeStatus::WaitingStart => "waiting_start",
            NodeStatus::Starting => "starting",
            NodeStatus::Running => "running",
            NodeStatus::Stopping => "stopping",
            NodeStatus::Stopped => "stopped",
        }
    }
}

/// Node status report from the platform, camelCase on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusSnapshot {
    pub status: NodeStatus,
    /// True when a node software update is pending.
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub block_tip: u64,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub node_url: String,
}

/// Peer suggested by the platform for an inbound channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeerHint {
    #[serde(default)]
    pub pubkey: String,
    #[serde(default)]
    pub host: String,
}

// =============================================================================
// Node-local wallet API
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GenSeed {
    pub cipher_seed_mnemonic: Vec<String>,
    pub enciphered_seed: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitWalletResponse {
    pub admin_macaroon: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BakedMacaroon {
    #[serde(default)]
    pub macaroon: Option<String>,
}

/// One entity/action pair in a macaroon permission list.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MacaroonPermission {
    pub entity: &'static str,
    pub action: &'static str,
}

/// Permissions baked into the invoice macaroon handed to the platform.
pub const INVOICE_MACAROON_PERMISSIONS: [MacaroonPermission; 10] = [
    MacaroonPermission { entity: "invoices", action: "read" },
    MacaroonPermission { entity: "invoices", action: "write" },
    MacaroonPermission { entity: "info", action: "read" },
    MacaroonPermission { entity: "info", action: "write" },
    MacaroonPermission { entity: "address", action: "read" },
    MacaroonPermission { entity: "address", action: "write" },
    MacaroonPermission { entity: "onchain", action: "read" },
    MacaroonPermission { entity: "peers", action: "read" },
    MacaroonPermission { entity: "peers", action: "write" },
    MacaroonPermission { entity: "offchain", action: "read" },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_envelope_unwraps_data() {
        let envelope: Envelope<NonceData> =
            serde_json::from_str(r#"{"ok":true,"data":{"nonce":"abc"}}"#).unwrap();
        assert_eq!(envelope.into_result().unwrap().nonce, "abc");
    }

    #[test]
    fn test_envelope_failure_carries_message() {
        let envelope: Envelope<NonceData> =
            serde_json::from_str(r#"{"ok":false,"message":"user not found"}"#).unwrap();
        match envelope.into_result() {
            Err(Error::Remote(message)) => assert_eq!(message, "user not found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_envelope_missing_data_is_remote_error() {
        let envelope: Envelope<NonceData> = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(matches!(envelope.into_result(), Err(Error::Remote(_))));
    }

    #[test]
    fn test_node_status_wire_names() {
        for (wire, status) in [
            ("provisioning", NodeStatus::Provisioning),
            ("waiting_init", NodeStatus::WaitingInit),
            ("waiting_unlock", NodeStatus::WaitingUnlock),
            ("waiting_start", NodeStatus::WaitingStart),
            ("starting", NodeStatus::Starting),
            ("running", NodeStatus::Running),
            ("stopping", NodeStatus::Stopping),
            ("stopped", NodeStatus::Stopped),
        ] {
            let parsed: NodeStatus = serde_json::from_str(&format!("\"{wire}\"")).unwrap();
            assert_eq!(parsed, status);
            assert_eq!(status.as_str(), wire);
        }
    }

    #[test]
    fn test_snapshot_camel_case() {
        let snapshot: NodeStatusSnapshot = serde_json::from_str(
            r#"{"status":"stopping","update":false,"synced":true,"blockHeight":100,"blockTip":100,"nodeId":"n1","nodeUrl":"n1.example.com"}"#,
        )
        .unwrap();
        assert_eq!(snapshot.status, NodeStatus::Stopping);
        assert!(!snapshot.update);
        assert_eq!(snapshot.block_height, 100);
        assert_eq!(snapshot.node_url, "n1.example.com");
    }

    #[test]
    fn test_price_quote_decimal_string() {
        let quote: PriceQuote =
            serde_json::from_str(r#"{"price":"58000.00","symbol":"$"}"#).unwrap();
        assert_eq!(quote.price, "58000.00");
        assert_eq!(quote.symbol, "$");
    }

    #[test]
    fn test_business_form_camel_case() {
        let form = NewBusinessForm {
            business_name: "Satchel Coffee".into(),
            annual_revenue: 100_000,
            ..NewBusinessForm::default()
        };
        let json = serde_json::to_string(&form).unwrap();
        assert!(json.contains("\"businessName\":\"Satchel Coffee\""));
        assert!(json.contains("\"annualRevenue\":100000"));
    }

    #[test]
    fn test_macaroon_permission_serialization() {
        let json = serde_json::to_string(&INVOICE_MACAROON_PERMISSIONS[0]).unwrap();
        assert_eq!(json, r#"{"entity":"invoices","action":"read"}"#);
        assert_eq!(INVOICE_MACAROON_PERMISSIONS.len(), 10);
    }
}
