//! Key derivation and vault encryption.

pub mod kdf;
pub mod vault;
