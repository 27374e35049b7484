//! Test doubles shared across module tests
//!
//! Provides an in-memory feed transport that replays a fixed script of
//! inbound frames and records what the client sends.

use crate::client::FeedTransport;
use crate::error::{FeedError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const CONNECTED: &str =
    r#"[{"ev":"status","status":"connected","message":"Connected Successfully"}]"#;
pub const AUTHENTICATED: &str =
    r#"[{"ev":"status","status":"auth_success","message":"authenticated"}]"#;
pub const SUBSCRIBED: &str =
    r#"[{"ev":"status","status":"success","message":"subscribed to: A.*"}]"#;

/// Clones share the script and the recorded traffic.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inbound: Arc<Mutex<VecDeque<Result<String>>>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    pub fail_sends: bool,
    /// Keep the connection open once the script is exhausted
    pub hold_open: bool,
}

impl ScriptedTransport {
    pub fn new(frames: &[&str]) -> Self {
        let transport = Self::default();
        for frame in frames {
            transport.push_frame(frame);
        }
        transport
    }

    /// Script that completes the handshake and then delivers `frames`.
    pub fn subscribed(frames: &[&str]) -> Self {
        let transport = Self::new(&[CONNECTED, AUTHENTICATED, SUBSCRIBED]);
        for frame in frames {
            transport.push_frame(frame);
        }
        transport
    }

    pub fn push_frame(&self, frame: &str) {
        self.inbound.lock().push_back(Ok(frame.to_string()));
    }

    pub fn push_error(&self, err: FeedError) {
        self.inbound.lock().push_back(Err(err));
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.fail_sends {
            return Err(FeedError::Connection("broken pipe".to_string()));
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        let next = self.inbound.lock().pop_front();
        match next {
            Some(frame) => Some(frame),
            None if self.hold_open => std::future::pending().await,
            None => None,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
