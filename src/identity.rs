//! Signing identity derived from passphrase material.
//!
//! An [`Identity`] wraps a secp256k1 key pair used for BIP340 Schnorr
//! signatures. The public half is an x-only 32-byte key; its URL-safe base64
//! form is the user's handle on the platform.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use secp256k1::{Keypair, Secp256k1, XOnlyPublicKey};

use crate::error::{Error, Result};
use crate::state::SecretBytes;

pub struct Identity {
    private_key: SecretBytes,
    totp_key: SecretBytes,
    public_key: [u8; 32],
    handle: String,
}

impl Identity {
    /// Build an identity from 32-byte private and TOTP keys.
    pub fn from_parts(private_key: &[u8], totp_key: &[u8]) -> Result<Self> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, private_key)
            .map_err(|e| Error::Crypto(format!("invalid private key: {e}")))?;
        let public_key = keypair.x_only_public_key().0.serialize();
        let handle = URL_SAFE_NO_PAD.encode(public_key);

        Ok(Self {
            private_key: SecretBytes::from_slice(private_key),
            totp_key: SecretBytes::from_slice(totp_key),
            public_key,
            handle,
        })
    }

    /// X-only public key bytes.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Hex form of the public key, as stored in the state record.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    /// URL-safe base64 handle used to address this user on the platform.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn private_key(&self) -> &SecretBytes {
        &self.private_key
    }

    pub fn totp_key(&self) -> &SecretBytes {
        &self.totp_key
    }

    /// Produce a BIP340 Schnorr signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64]> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, self.private_key.as_bytes())
            .map_err(|e| Error::Crypto(format!("invalid private key: {e}")))?;
        let signature = secp.sign_schnorr(message, &keypair);
        Ok(*signature.as_ref())
    }

    /// Verify a BIP340 Schnorr signature against an x-only public key.
    pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
        let secp = Secp256k1::new();
        let Ok(pubkey) = XOnlyPublicKey::from_slice(public_key) else {
            return false;
        };
        let Ok(sig) = secp256k1::schnorr::Signature::from_slice(signature) else {
            return false;
        };
        secp.verify_schnorr(&sig, message, &pubkey).is_ok()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf;

    fn test_identity() -> Identity {
        let keys = kdf::derive_identity("alice@example.com", "correct horse").unwrap();
        Identity::from_parts(&keys.private_key, &keys.totp_key).unwrap()
    }

    #[test]
    fn test_handle_is_unpadded_base64_of_public_key() {
        let identity = test_identity();
        assert_eq!(identity.handle().len(), 43);
        assert!(!identity.handle().contains('='));
        let decoded = URL_SAFE_NO_PAD.decode(identity.handle()).unwrap();
        assert_eq!(decoded, identity.public_key());
    }

    #[test]
    fn test_same_credentials_same_handle() {
        let a = test_identity();
        let b = test_identity();
        assert_eq!(a.handle(), b.handle());
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let identity = test_identity();
        let message = b"challenge nonce bytes";
        let signature = identity.sign(message).unwrap();
        assert!(Identity::verify(identity.public_key(), message, &signature));
    }

    #[test]
    fn test_verify_rejects_wrong_message() {
        let identity = test_identity();
        let signature = identity.sign(b"message one").unwrap();
        assert!(!Identity::verify(
            identity.public_key(),
            b"message two",
            &signature
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let identity = test_identity();
        let keys = kdf::derive_identity("bob@example.com", "other horse").unwrap();
        let other = Identity::from_parts(&keys.private_key, &keys.totp_key).unwrap();
        let signature = identity.sign(b"message").unwrap();
        assert!(!Identity::verify(other.public_key(), b"message", &signature));
    }

    #[test]
    fn test_rejects_invalid_private_key() {
        assert!(Identity::from_parts(&[0u8; 32], &[1u8; 32]).is_err());
        assert!(Identity::from_parts(&[1u8; 16], &[1u8; 32]).is_err());
    }
}
