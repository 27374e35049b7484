//! Momentum chasing in the pre-market session
//!
//! Enters when a ticker jumps by the configured ratio across the last two
//! 10-second bars on a volume burst. Only one ticker is traded at a time.

use super::{EntrySignal, Strategy};
use crate::aggregate::Bar;
use crate::config::MomentumConfig;
use crate::error::{FeedError, Result};
use crate::handler::{DataHandler, Resolution};
use chrono::DateTime;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Callback name registered with the data handler
pub const MOMENTUM_CALLBACK: &str = "chase_momentum_process_new_data";

const LOOKBACK_MS: i64 = 5 * 60 * 1000;

pub struct ChaseMomentumStrategy {
    inner: Arc<Evaluator>,
}

struct Evaluator {
    handler: Weak<DataHandler>,
    config: MomentumConfig,
    trading: Mutex<Option<String>>,
    signals: mpsc::UnboundedSender<EntrySignal>,
}

impl ChaseMomentumStrategy {
    /// Build the strategy and the receiving end of its entry signals.
    pub fn new(
        handler: &Arc<DataHandler>,
        config: MomentumConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EntrySignal>)> {
        if config.session_start >= config.session_end {
            return Err(FeedError::Config(format!(
                "empty session window {} - {}",
                config.session_start, config.session_end
            )));
        }

        let (signals, rx) = mpsc::unbounded_channel();
        let inner = Evaluator {
            handler: Arc::downgrade(handler),
            config,
            trading: Mutex::new(None),
            signals,
        };
        Ok((Self { inner: Arc::new(inner) }, rx))
    }

    pub fn is_entry_point(&self, ticker: &str) -> bool {
        match self.inner.handler.upgrade() {
            Some(handler) => self.inner.is_entry_point(&handler, ticker),
            None => false,
        }
    }

    /// Ticker currently held, if any
    pub fn trading(&self) -> Option<String> {
        self.inner.trading.lock().clone()
    }

    /// Forget the held ticker once its position is closed.
    pub fn release_position(&self) {
        if let Some(ticker) = self.inner.trading.lock().take() {
            info!(ticker = %ticker, "Position released");
        }
    }
}

impl Strategy for ChaseMomentumStrategy {
    fn name(&self) -> &str {
        "chase_momentum"
    }

    fn init(&self) -> Result<()> {
        let handler = self
            .inner
            .handler
            .upgrade()
            .ok_or_else(|| FeedError::Config("data handler already dropped".to_string()))?;
        let evaluator = Arc::clone(&self.inner);
        handler.register_callback(MOMENTUM_CALLBACK, move |ticker: &str| {
            evaluator.process_new_data(ticker)
        })?;
        info!(strategy = self.name(), "Strategy initialized");
        Ok(())
    }
}

impl Evaluator {
    fn process_new_data(&self, ticker: &str) {
        let Some(handler) = self.handler.upgrade() else {
            return;
        };
        let mut trading = self.trading.lock();
        match trading.as_deref() {
            None => {
                if let Some(signal) = self.entry_signal(&handler, ticker) {
                    info!(
                        ticker = %signal.ticker,
                        price = %signal.price,
                        limit = %signal.limit_price,
                        "Momentum entry"
                    );
                    if self.signals.send(signal).is_err() {
                        warn!(ticker = %ticker, "Entry signal dropped, no consumer");
                        return;
                    }
                    *trading = Some(ticker.to_string());
                }
            }
            Some(held) if held == ticker => debug!(ticker = %ticker, "Update on held position"),
            Some(_) => {}
        }
    }

    fn entry_signal(&self, handler: &DataHandler, ticker: &str) -> Option<EntrySignal> {
        if !self.is_entry_point(handler, ticker) {
            return None;
        }
        let bar = handler.latest(Resolution::TenSeconds, ticker)?;
        Some(EntrySignal {
            ticker: ticker.to_string(),
            price: bar.close,
            limit_price: bar.close + Decimal::new(5, 2),
            at: bar.end_time()?,
        })
    }

    fn is_entry_point(&self, handler: &DataHandler, ticker: &str) -> bool {
        let ten_sec = handler.get_data(Resolution::TenSeconds, ticker);
        let one_min = handler.get_data(Resolution::OneMinute, ticker);
        let (Some(bar), Some(minute)) = (ten_sec.first(), one_min.first()) else {
            return false;
        };
        if !self.in_session(bar.end) {
            return false;
        }

        let open = reference_open(&ten_sec);
        let window_start = minute.start - LOOKBACK_MS;
        let recent_volume: i64 = one_min
            .iter()
            .take_while(|b| b.start >= window_start)
            .map(|b| b.volume)
            .sum();

        let cfg = &self.config;
        bar.close > cfg.gain_ratio * open
            && bar.close > cfg.min_price
            && bar.close < cfg.max_price
            && minute.volume > cfg.min_minute_volume
            && Decimal::from(bar.volume) < cfg.volume_ratio * Decimal::from(recent_volume)
    }

    fn in_session(&self, ts_ms: i64) -> bool {
        let Some(ts) = DateTime::from_timestamp_millis(ts_ms) else {
            return false;
        };
        let local = ts.with_timezone(&self.config.timezone).time();
        local >= self.config.session_start && local < self.config.session_end
    }
}

/// Open of the previous 10s bar when it runs straight into the newest one
fn reference_open(ten_sec: &[Bar]) -> Decimal {
    match ten_sec {
        [bar, prev, ..] if prev.end == bar.start => prev.open,
        [bar, ..] => bar.open,
        [] => Decimal::ZERO,
    }
}
