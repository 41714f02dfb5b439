//! Satchel — client-side identity and session SDK for a custodial-lite
//! bitcoin merchant platform.
//!
//! The crate derives a signing identity deterministically from a user's
//! passphrase, keeps all account state in a client-encrypted vault stored
//! with the platform, authenticates via a signed-nonce challenge instead of
//! stored passwords, and orchestrates the lifecycle of the business's
//! lightning node.
//!
//! The main entry point is [`Account`]:
//!
//! ```no_run
//! use satchel::{Account, ClientConfig};
//!
//! # async fn run() -> satchel::Result<()> {
//! let mut account = Account::new(ClientConfig::new("https://platform.example.com/api/v1"))?;
//! account.subscribe(|status| println!("{status}"));
//! account.login("alice@example.com", "correct horse battery staple").await?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod retry;
pub mod session;
pub mod state;
pub mod status;

pub use account::Account;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use status::Status;
