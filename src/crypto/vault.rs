//! Authenticated encryption of the state record.
//!
//! The vault envelope is `hex(nonce || ciphertext)` where the ciphertext is
//! ChaCha20-Poly1305 over the JSON-serialized [`StateRecord`] with a fresh
//! random 12-byte nonce. Tampering or a wrong key surfaces as
//! [`Error::Decryption`]; a malformed envelope as [`Error::Validation`].

use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{AeadCore, ChaCha20Poly1305, Key, Nonce};

use crate::error::{Error, Result};
use crate::state::StateRecord;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encrypt `record` under `key`, returning the hex envelope.
pub fn seal(key: &[u8], record: &StateRecord) -> Result<String> {
    let cipher = cipher_for(key)?;
    let plaintext = serde_json::to_vec(record)?;

    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_ref())
        .map_err(|_| Error::Crypto("encryption failed".into()))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(nonce.as_slice());
    envelope.extend_from_slice(&ciphertext);
    Ok(hex::encode(envelope))
}

/// Decrypt a hex envelope produced by [`seal`].
pub fn open(key: &[u8], envelope: &str) -> Result<StateRecord> {
    let cipher = cipher_for(key)?;
    let raw = hex::decode(envelope)
        .map_err(|_| Error::Validation("vault envelope is not valid hex".into()))?;
    if raw.len() < NONCE_LEN {
        return Err(Error::Validation("vault envelope is too short".into()));
    }

    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            Error::Decryption("authentication failed (wrong key or corrupted data)".into())
        })?;

    Ok(serde_json::from_slice(&plaintext)?)
}

fn cipher_for(key: &[u8]) -> Result<ChaCha20Poly1305> {
    if key.len() != KEY_LEN {
        return Err(Error::Validation(format!(
            "vault key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Ok(ChaCha20Poly1305::new(Key::from_slice(key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SecretBytes;

    fn sample_record() -> StateRecord {
        let mut record = StateRecord::default();
        record.private_key = SecretBytes::from_slice(&[9u8; 32]);
        record.name = "Alice".into();
        record.email = "alice@example.com".into();
        record.business.business_id = "biz-1".into();
        record
    }

    #[test]
    fn test_seal_open_round_trip() {
        let key = [1u8; 32];
        let envelope = seal(&key, &sample_record()).unwrap();
        let back = open(&key, &envelope).unwrap();
        assert_eq!(back, sample_record());
    }

    #[test]
    fn test_nonce_varies_between_seals() {
        let key = [1u8; 32];
        let a = seal(&key, &sample_record()).unwrap();
        let b = seal(&key, &sample_record()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_record_round_trip() {
        let key = [2u8; 32];
        let envelope = seal(&key, &StateRecord::default()).unwrap();
        let back = open(&key, &envelope).unwrap();
        assert_eq!(back, StateRecord::default());
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let envelope = seal(&[1u8; 32], &sample_record()).unwrap();
        assert!(matches!(
            open(&[2u8; 32], &envelope),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_decryption() {
        let key = [1u8; 32];
        let envelope = seal(&key, &sample_record()).unwrap();
        // Flip one nibble past the nonce.
        let mut chars: Vec<char> = envelope.chars().collect();
        let i = NONCE_LEN * 2 + 3;
        chars[i] = if chars[i] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        assert!(matches!(open(&key, &tampered), Err(Error::Decryption(_))));
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(matches!(
            open(&[1u8; 32], "not-hex!"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_short_envelope_rejected() {
        assert!(matches!(
            open(&[1u8; 32], "0011"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_bad_key_length_rejected() {
        assert!(matches!(
            seal(&[1u8; 16], &StateRecord::default()),
            Err(Error::Validation(_))
        ));
    }
}
