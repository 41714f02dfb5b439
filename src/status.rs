//! Lifecycle status notifications.
//!
//! Every public operation reports human-readable statuses at its entry and
//! exit points. Subscribers are notified synchronously, in registration
//! order, on the orchestrator's own control-flow path: handlers must not
//! perform blocking work.

use std::fmt;
use std::sync::Mutex;

/// Lifecycle status of the account orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    StartingSignup,
    UserCreated,
    StartingLogin,
    LoggedIn,
    GeneratingKeys,
    RegisteringUser,
    UserRegistered,
    CheckingExpiry,
    StartingChallenge,
    SigningChallenge,
    SendingChallenge,
    ChallengeComplete,
    BackingUp,
    Encrypting,
    Encrypted,
    Decrypting,
    Decrypted,
    Saving,
    Saved,
    FetchingPrice,
    PriceFetched,
    RegisteringBusiness,
    BusinessRegistered,
    InitializingNode,
    NodeInitialized,
    BakingMacaroon,
    MacaroonBaked,
    StartingNode,
    NodeStarted,
    StoppingNode,
    NodeStopped,
    ConnectingPeer,
    PeerConnected,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ready => "Ready",
            Status::StartingSignup => "Starting signup",
            Status::UserCreated => "New user created",
            Status::StartingLogin => "Starting login",
            Status::LoggedIn => "User logged in",
            Status::GeneratingKeys => "Generating keys",
            Status::RegisteringUser => "Registering new user",
            Status::UserRegistered => "User registered",
            Status::CheckingExpiry => "Checking session expiry",
            Status::StartingChallenge => "Starting challenge",
            Status::SigningChallenge => "Signing challenge",
            Status::SendingChallenge => "Sending challenge",
            Status::ChallengeComplete => "Challenge completed",
            Status::BackingUp => "Backing up",
            Status::Encrypting => "Encrypting state",
            Status::Encrypted => "State encrypted",
            Status::Decrypting => "Decrypting state",
            Status::Decrypted => "State decrypted",
            Status::Saving => "Saving state",
            Status::Saved => "State saved",
            Status::FetchingPrice => "Fetching price",
            Status::PriceFetched => "Price fetched",
            Status::RegisteringBusiness => "Registering business",
            Status::BusinessRegistered => "Business registered",
            Status::InitializingNode => "Initializing lightning node",
            Status::NodeInitialized => "Lightning node initialized",
            Status::BakingMacaroon => "Baking macaroon",
            Status::MacaroonBaked => "Macaroon baked",
            Status::StartingNode => "Starting lightning node",
            Status::NodeStarted => "Lightning node started",
            Status::StoppingNode => "Stopping lightning node",
            Status::NodeStopped => "Lightning node stopped",
            Status::ConnectingPeer => "Connecting peer",
            Status::PeerConnected => "Peer connected",
            Status::Error => "Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Subscriber = Box<dyn Fn(Status) + Send + Sync>;

/// Observer registry for status notifications.
///
/// Delivery order equals registration order. Delivery is synchronous and
/// reentrant with respect to the calling operation.
pub struct StatusHub {
    current: Mutex<Status>,
    subscribers: Vec<Subscriber>,
}

impl StatusHub {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Status::Ready),
            subscribers: Vec::new(),
        }
    }

    /// Register a status observer.
    pub fn subscribe<F>(&mut self, f: F)
    where
        F: Fn(Status) + Send + Sync + 'static,
    {
        self.subscribers.push(Box::new(f));
    }

    /// Record the new status and deliver it to every subscriber.
    pub fn notify(&self, status: Status) {
        match self.current.lock() {
            Ok(mut current) => *current = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
        for subscriber in &self.subscribers {
            subscriber(status);
        }
    }

    /// The most recently reported status.
    pub fn current(&self) -> Status {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_notify_updates_current() {
        let hub = StatusHub::new();
        assert_eq!(hub.current(), Status::Ready);

        hub.notify(Status::BackingUp);
        assert_eq!(hub.current(), Status::BackingUp);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hub = StatusHub::new();

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            hub.subscribe(move |_| seen.lock().unwrap().push(tag));
        }

        hub.notify(Status::Ready);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(Status::Ready.to_string(), "Ready");
        assert_eq!(Status::BakingMacaroon.to_string(), "Baking macaroon");
    }
}
