//! Market data feed client
//!
//! Owns one streaming connection to the aggregate feed:
//! - Handshake: connect, authenticate, subscribe
//! - Streaming: every inbound payload goes to the registered handlers, inline
//!   on the receive loop
//!
//! No reconnect is attempted; any handshake or transport error ends `run()`.

mod handshake;
mod transport;

pub use handshake::{
    auth_message, subscribe_message, AckMatcher, ConnectionState, Handshake, Step,
    SubstringAckMatcher, AGGREGATE_SUBSCRIPTION,
};
pub use transport::{FeedTransport, WsTransport};

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Payload handler invoked for every streaming message
pub type Handler = Box<dyn FnMut(&str) + Send>;

/// Closes a client's connection from another task
///
/// The request is sticky: a shutdown issued before `run()` starts, or while
/// it is still connecting, ends that run as soon as it begins.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

pub struct MarketDataClient {
    config: FeedConfig,
    credential: Option<String>,
    matcher: Arc<dyn AckMatcher>,
    handlers: Registry<Handler>,
    state: ConnectionState,
    shutdown: CancellationToken,
}

impl MarketDataClient {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            credential: config.api_key.clone(),
            config,
            matcher: Arc::new(SubstringAckMatcher),
            handlers: Registry::new(),
            state: ConnectionState::Init,
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the acknowledgement matcher
    pub fn with_ack_matcher(mut self, matcher: impl AckMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Set the feed credential. Must be called before `run()` unless the
    /// config carried one.
    pub fn set_credentials(&mut self, secret: impl Into<String>) {
        self.credential = Some(secret.into());
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Handle that closes the connection of the current or any later `run()`.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    pub fn register_handler<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.handlers.register(name, Box::new(handler))?;
        debug!(name = %name, "Registered payload handler");
        Ok(())
    }

    pub fn unregister_handler(&mut self, name: &str) -> Result<()> {
        self.handlers.unregister(name)?;
        debug!(name = %name, "Unregistered payload handler");
        Ok(())
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.names()
    }

    /// Connect to the configured endpoint and run until the connection ends.
    pub async fn run(&mut self) -> Result<()> {
        self.require_credential()?;

        info!(url = %self.config.url, "Initializing data client");
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let shutdown = self.shutdown.clone();
        let connected = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested before the data connection was established");
                return Ok(());
            }
            connected = WsTransport::connect(&self.config.url, connect_timeout) => connected,
        };
        let transport = match connected {
            Ok(transport) => transport,
            Err(e) => {
                error!("Could not connect to data supplier: {}", e);
                self.state = ConnectionState::Failed;
                return Err(e);
            }
        };

        self.run_with(transport).await
    }

    /// Run the handshake and streaming phase over an established transport.
    ///
    /// Returns `Ok(())` when the connection ends after the subscription was
    /// acknowledged (peer close, shutdown, or `close_after_subscribe`). A
    /// shutdown is a normal termination in any state, so `state()` may still
    /// report a handshake state afterwards.
    pub async fn run_with<T: FeedTransport>(&mut self, mut transport: T) -> Result<()> {
        let secret = self.require_credential()?;
        let mut handshake = Handshake::new(secret, Arc::clone(&self.matcher));
        let shutdown = self.shutdown.clone();
        self.state = ConnectionState::Init;

        let outcome = loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    if handshake.state() == ConnectionState::Subscribed {
                        info!("Shutdown requested, closing data connection");
                    } else {
                        warn!(
                            state = %handshake.state(),
                            "Shutdown requested before the subscription completed"
                        );
                    }
                    break Ok(());
                }
                frame = transport.next_text() => frame,
            };

            let payload = match frame {
                Some(Ok(payload)) => payload,
                Some(Err(e)) => break Err(e),
                None if handshake.state() == ConnectionState::Subscribed => {
                    info!("Data connection closed");
                    break Ok(());
                }
                None => {
                    break Err(FeedError::Connection(format!(
                        "connection closed in state {}",
                        handshake.state()
                    )))
                }
            };

            match handshake.advance(&payload) {
                Ok(Step::Reply(message)) => {
                    if let Err(e) = transport.send_text(message).await {
                        break Err(e);
                    }
                }
                Ok(Step::Subscribed) => {
                    if self.config.close_after_subscribe {
                        info!("Closing data connection right after subscription");
                        self.state = handshake.state();
                        break Ok(());
                    }
                }
                Ok(Step::Forward) => self.dispatch(&payload),
                Err(e) => break Err(e),
            }
            self.state = handshake.state();
        };

        if let Err(e) = &outcome {
            handshake.fail();
            self.state = handshake.state();
            error!("Data client failure: {}", e);
        }
        if let Err(e) = transport.close().await {
            debug!("Closing transport: {}", e);
        }
        outcome
    }

    fn dispatch(&mut self, payload: &str) {
        if self.handlers.is_empty() {
            warn!("Streaming payload dropped, no handler registered");
            return;
        }
        for handler in self.handlers.values_mut() {
            handler(payload);
        }
    }

    fn require_credential(&self) -> Result<String> {
        match self.credential.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret.to_string()),
            _ => {
                error!("Authentication information not provided");
                Err(FeedError::Authentication(
                    "Authentication information not provided".to_string(),
                ))
            }
        }
    }
}
