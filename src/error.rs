//! Error taxonomy and the bounded rolling error log.
//!
//! Every public `Account` operation converts internal failures into one of
//! these variants, records it in the [`ErrorLog`], and emits an error status
//! before propagating. Callers inspect the returned `Result`; the log exists
//! so a failure deep inside a multi-step provisioning chain still leaves a
//! diagnostic trail.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

/// Default capacity of the rolling error log.
pub const ERROR_LOG_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing caller input, detected before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The remote collaborator returned an error payload or a non-success status.
    #[error("remote API error: {0}")]
    Remote(String),

    /// Vault authentication failure: wrong key or corrupted ciphertext.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A bounded retry loop exhausted its attempt budget.
    #[error("provisioning timed out after {attempts} attempts")]
    ProvisioningTimeout { attempts: u32 },

    /// HTTP transport failure (connection, timeout, malformed body).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// State record could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cryptographic primitive failure (invalid scalar, cipher error).
    #[error("crypto error: {0}")]
    Crypto(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A captured operation failure and the time it was observed.
#[derive(Debug, Clone)]
pub struct RecordedError {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Bounded most-recent-first error history. Oldest entries are evicted once
/// the capacity is reached.
pub struct ErrorLog {
    entries: VecDeque<RecordedError>,
    capacity: usize,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a failure, evicting the oldest entry when full.
    pub fn push(&mut self, err: &Error) {
        warn!(error = %err, "operation failed");
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(RecordedError {
            at: Utc::now(),
            message: err.to_string(),
        });
    }

    /// Recorded errors, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &RecordedError> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(ERROR_LOG_CAPACITY)
    }
}
