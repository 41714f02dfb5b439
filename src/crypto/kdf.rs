//! Deterministic key derivation from a passphrase and identifier.
//!
//! A single Argon2id pass stretches the passphrase into a 32-byte root, with
//! the identifier hashed into the salt. Child scalars are then drawn from the
//! root with HMAC-SHA256 and reduced into the secp256k1 group order, so the
//! same credentials always reproduce the same signing key on any device.

use argon2::{Algorithm, Argon2, Params, Version};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Domain prefix mixed into both KDF inputs.
const APP_PREFIX: &str = "satchel";

/// Argon2id cost parameters: 64 MiB, 3 iterations, 4 lanes.
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_LANES: u32 = 4;

/// secp256k1 group order `n`, big-endian.
const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
    0x41, 0x41,
];

/// Secret material derived from a passphrase, ready to back an identity.
pub struct DerivedKeys {
    pub private_key: [u8; 32],
    pub totp_key: [u8; 32],
}

impl Drop for DerivedKeys {
    fn drop(&mut self) {
        self.private_key.zeroize();
        self.totp_key.zeroize();
    }
}

/// Derive the identity key pair material for `identifier` + `passphrase`.
///
/// Both inputs must be non-empty. Deterministic: the same inputs always
/// yield the same keys.
pub fn derive_identity(identifier: &str, passphrase: &str) -> Result<DerivedKeys> {
    if identifier.is_empty() {
        return Err(Error::Validation("identifier must not be empty".into()));
    }
    if passphrase.is_empty() {
        return Err(Error::Validation("passphrase must not be empty".into()));
    }

    let salt: [u8; 32] = Sha256::digest(format!("{APP_PREFIX}/id:{identifier}").as_bytes()).into();
    let secret = format!("{APP_PREFIX}/pass:{passphrase}");

    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, Some(32))
        .map_err(|e| Error::Crypto(format!("argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut root = [0u8; 32];
    argon2
        .hash_password_into(secret.as_bytes(), &salt, &mut root)
        .map_err(|e| Error::Crypto(format!("argon2 derivation: {e}")))?;

    let keys = DerivedKeys {
        private_key: child_scalar(&root, 0)?,
        totp_key: child_scalar(&root, 1)?,
    };
    root.zeroize();
    Ok(keys)
}

/// Derive child scalar `index` from the root, rejecting zero by bumping a
/// counter byte and retrying.
fn child_scalar(root: &[u8; 32], index: u32) -> Result<[u8; 32]> {
    for counter in 0u8..=255 {
        let mut mac = HmacSha256::new_from_slice(root)
            .map_err(|e| Error::Crypto(format!("hmac key: {e}")))?;
        mac.update(b"ecc");
        mac.update(&index.to_be_bytes());
        mac.update(&[counter]);
        let digest: [u8; 32] = mac.finalize().into_bytes().into();

        let scalar = reduce_mod_order(digest);
        if scalar != [0u8; 32] {
            return Ok(scalar);
        }
    }
    Err(Error::Crypto("could not derive a non-zero scalar".into()))
}

/// Reduce a 256-bit candidate into `[0, n)`.
///
/// `n > 2^255`, so a candidate is at most `2n - 1` and a single conditional
/// subtraction of the order suffices.
fn reduce_mod_order(candidate: [u8; 32]) -> [u8; 32] {
    if !ge(&candidate, &CURVE_ORDER) {
        return candidate;
    }
    let mut out = [0u8; 32];
    let mut borrow = 0u16;
    for i in (0..32).rev() {
        let lhs = candidate[i] as u16;
        let rhs = CURVE_ORDER[i] as u16 + borrow;
        if lhs >= rhs {
            out[i] = (lhs - rhs) as u8;
            borrow = 0;
        } else {
            out[i] = (lhs + 256 - rhs) as u8;
            borrow = 1;
        }
    }
    out
}

/// Big-endian unsigned comparison: `a >= b`.
fn ge(a: &[u8; 32], b: &[u8; 32]) -> bool {
    for i in 0..32 {
        if a[i] != b[i] {
            return a[i] > b[i];
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_identity("alice@example.com", "correct horse").unwrap();
        let b = derive_identity("alice@example.com", "correct horse").unwrap();
        assert_eq!(a.private_key, b.private_key);
        assert_eq!(a.totp_key, b.totp_key);
    }

    #[test]
    fn test_inputs_change_keys() {
        let base = derive_identity("alice@example.com", "correct horse").unwrap();
        let other_pass = derive_identity("alice@example.com", "wrong horse").unwrap();
        let other_id = derive_identity("bob@example.com", "correct horse").unwrap();
        assert_ne!(base.private_key, other_pass.private_key);
        assert_ne!(base.private_key, other_id.private_key);
    }

    #[test]
    fn test_child_keys_are_distinct() {
        let keys = derive_identity("alice@example.com", "correct horse").unwrap();
        assert_ne!(keys.private_key, keys.totp_key);
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(matches!(
            derive_identity("", "pass"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            derive_identity("alice", ""),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_reduce_below_order_is_identity() {
        let candidate = [0x42u8; 32];
        assert_eq!(reduce_mod_order(candidate), candidate);
    }

    #[test]
    fn test_reduce_order_maps_to_zero() {
        assert_eq!(reduce_mod_order(CURVE_ORDER), [0u8; 32]);
    }

    #[test]
    fn test_reduce_order_plus_one() {
        let mut candidate = CURVE_ORDER;
        candidate[31] = candidate[31].wrapping_add(1);
        let mut expected = [0u8; 32];
        expected[31] = 1;
        assert_eq!(reduce_mod_order(candidate), expected);
    }

    #[test]
    fn test_reduce_max_candidate() {
        // 2^256 - 1 minus n leaves the known complement of the order.
        let candidate = [0xffu8; 32];
        let reduced = reduce_mod_order(candidate);
        assert!(ge(&CURVE_ORDER, &reduced));
        assert_ne!(reduced, candidate);
        // Adding n back reproduces the candidate (mod 2^256).
        let mut sum = [0u8; 32];
        let mut carry = 0u16;
        for i in (0..32).rev() {
            let v = reduced[i] as u16 + CURVE_ORDER[i] as u16 + carry;
            sum[i] = (v & 0xff) as u8;
            carry = v >> 8;
        }
        assert_eq!(sum, candidate);
    }

    #[test]
    fn test_derived_scalars_are_in_range() {
        let keys = derive_identity("alice@example.com", "correct horse").unwrap();
        assert!(!ge(&keys.private_key, &CURVE_ORDER));
        assert_ne!(keys.private_key, [0u8; 32]);
    }
}
