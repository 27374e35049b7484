//! Connect / authenticate / subscribe exchange
//!
//! The state machine is transport-free: it consumes inbound payloads and
//! tells the caller what to send. Acknowledgements are recognised through an
//! [`AckMatcher`] so the loose substring matching can be swapped out without
//! touching the transitions.

use crate::error::{FeedError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Marker in the provider's connection acknowledgement
pub const CONNECTED_ACK: &str = "Connected Successfully";
/// Marker in the provider's authentication acknowledgement
pub const AUTHENTICATED_ACK: &str = "authenticated";
/// Marker in the provider's subscription acknowledgement
pub const SUBSCRIBED_ACK: &str = "subscribed to";
/// Every per-second aggregate
pub const AGGREGATE_SUBSCRIPTION: &str = "A.*";

/// Client connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Connected,
    Authenticated,
    Subscribed,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Init => write!(f, "init"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Authenticated => write!(f, "authenticated"),
            ConnectionState::Subscribed => write!(f, "subscribed"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Recognises control acknowledgements
#[cfg_attr(test, mockall::automock)]
pub trait AckMatcher: Send + Sync {
    fn is_connected(&self, payload: &str) -> bool;
    fn is_authenticated(&self, payload: &str) -> bool;
    fn is_subscribed(&self, payload: &str) -> bool;
}

/// Matches acknowledgements by substring, as the provider's acks vary in shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringAckMatcher;

impl AckMatcher for SubstringAckMatcher {
    fn is_connected(&self, payload: &str) -> bool {
        payload.contains(CONNECTED_ACK)
    }

    fn is_authenticated(&self, payload: &str) -> bool {
        payload.contains(AUTHENTICATED_ACK)
    }

    fn is_subscribed(&self, payload: &str) -> bool {
        payload.contains(SUBSCRIBED_ACK)
    }
}

/// `{"action":"auth","params":"<secret>"}`
pub fn auth_message(secret: &str) -> String {
    serde_json::json!({ "action": "auth", "params": secret }).to_string()
}

/// `{"action":"subscribe","params":"A.*"}`
pub fn subscribe_message() -> String {
    serde_json::json!({ "action": "subscribe", "params": AGGREGATE_SUBSCRIPTION }).to_string()
}

/// What the caller must do after a payload was consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send this control message
    Reply(String),
    /// The subscription was acknowledged
    Subscribed,
    /// Streaming payload, hand it to the registered handlers
    Forward,
}

pub struct Handshake {
    state: ConnectionState,
    secret: String,
    matcher: Arc<dyn AckMatcher>,
}

impl Handshake {
    pub fn new(secret: impl Into<String>, matcher: Arc<dyn AckMatcher>) -> Self {
        Self {
            state: ConnectionState::Init,
            secret: secret.into(),
            matcher,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Mark the exchange as failed (transport error, send failure).
    pub fn fail(&mut self) {
        self.state = ConnectionState::Failed;
    }

    /// Consume one inbound payload.
    ///
    /// A payload that does not carry the acknowledgement expected in the
    /// current state moves to `Failed` and returns the matching error.
    pub fn advance(&mut self, payload: &str) -> Result<Step> {
        match self.state {
            ConnectionState::Init => {
                if self.matcher.is_connected(payload) {
                    info!("Data client is successfully connected");
                    self.state = ConnectionState::Connected;
                    Ok(Step::Reply(auth_message(&self.secret)))
                } else {
                    error!(payload = %payload, "Data client connection failed");
                    self.reject(FeedError::Protocol(format!("Unexpected message: {}", payload)))
                }
            }
            ConnectionState::Connected => {
                if self.matcher.is_authenticated(payload) {
                    info!("Data client authenticated");
                    self.state = ConnectionState::Authenticated;
                    Ok(Step::Reply(subscribe_message()))
                } else {
                    error!(payload = %payload, "Data client authentication failed");
                    self.reject(FeedError::Authentication(format!(
                        "Unexpected message: {}",
                        payload
                    )))
                }
            }
            ConnectionState::Authenticated => {
                if self.matcher.is_subscribed(payload) {
                    info!("Data subscription succeeded");
                    self.state = ConnectionState::Subscribed;
                    Ok(Step::Subscribed)
                } else {
                    error!(payload = %payload, "Data subscription failed");
                    self.reject(FeedError::Protocol(format!("Unexpected message: {}", payload)))
                }
            }
            ConnectionState::Subscribed => Ok(Step::Forward),
            ConnectionState::Failed => Err(FeedError::Protocol(
                "payload received after the handshake failed".to_string(),
            )),
        }
    }

    fn reject(&mut self, err: FeedError) -> Result<Step> {
        self.state = ConnectionState::Failed;
        Err(err)
    }
}
