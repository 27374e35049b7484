//! Fixed-window OHLCV aggregation
//!
//! Each store covers one window duration and keeps, per ticker, a bounded
//! newest-first history of bars:
//! - A tick starting a full window or more after the open bar's start opens
//!   a new bar whose start is aligned down to a window multiple
//! - Any other tick is merged into the open bar
//! - Closure of a window is reported exactly once


use crate::error::{FeedError, Result};
use crate::types::{Tick, MILLIS_PER_SECOND};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Default number of bars kept per ticker
pub const DEFAULT_HISTORY_LEN: usize = 30;

/// Newest-first bar sequence for one ticker
pub type History = VecDeque<Bar>;

static EMPTY_HISTORY: History = VecDeque::new();

/// One aggregate window for one ticker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: String,
    /// Volume absorbed into this window
    pub volume: i64,
    /// Day volume as of the last absorbed tick
    pub accumulated_volume: i64,
    pub day_open: Decimal,
    pub vwap: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Inclusive window start, epoch milliseconds
    pub start: i64,
    /// Exclusive edge of the data absorbed so far, epoch milliseconds
    pub end: i64,
    /// Set once the closure of this window has been signalled.
    #[serde(skip)]
    closure_reported: bool,
}

impl PartialEq for Bar {
    fn eq(&self, other: &Self) -> bool {
        self.ticker == other.ticker
            && self.volume == other.volume
            && self.accumulated_volume == other.accumulated_volume
            && self.day_open == other.day_open
            && self.vwap == other.vwap
            && self.open == other.open
            && self.close == other.close
            && self.high == other.high
            && self.low == other.low
            && self.start == other.start
            && self.end == other.end
    }
}

impl From<&Tick> for Bar {
    fn from(tick: &Tick) -> Self {
        Self {
            ticker: tick.ticker.clone(),
            volume: tick.volume,
            accumulated_volume: tick.accumulated_volume,
            day_open: tick.day_open,
            vwap: tick.vwap,
            open: tick.open,
            close: tick.close,
            high: tick.high,
            low: tick.low,
            start: tick.start,
            end: tick.end,
            closure_reported: false,
        }
    }
}

impl Bar {
    /// Fold a tick of the same ticker into this bar.
    ///
    /// Volume accumulates, high/low widen, and the day volume, vwap, close
    /// and end take the tick's values. A ticker mismatch leaves the bar
    /// untouched.
    pub fn update_with(&mut self, tick: &Tick) -> Result<()> {
        if self.ticker != tick.ticker {
            return Err(FeedError::PreconditionViolation(format!(
                "cannot merge {} tick into {} bar",
                tick.ticker, self.ticker
            )));
        }
        self.volume += tick.volume;
        self.accumulated_volume = tick.accumulated_volume;
        self.vwap = tick.vwap;
        self.close = tick.close;
        self.high = self.high.max(tick.high);
        self.low = self.low.min(tick.low);
        self.end = tick.end;
        Ok(())
    }

    /// Span of data absorbed so far
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    /// A bar is closed once it spans exactly one window.
    pub fn is_closed(&self, window_ms: i64) -> bool {
        self.duration_ms() == window_ms
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.end)
    }
}

/// Bars for every ticker at one window duration
#[derive(Debug, Clone)]
pub struct AggregationStore {
    window_secs: i64,
    history_len: usize,
    data: HashMap<String, History>,
}

impl AggregationStore {
    pub fn new(window_secs: i64, history_len: usize) -> Self {
        Self {
            window_secs,
            history_len,
            data: HashMap::new(),
        }
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    pub fn window_ms(&self) -> i64 {
        self.window_secs * MILLIS_PER_SECOND
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Absorb a tick. Returns true when a window closed as a result.
    ///
    /// Opening a new bar reports the previous bar's closure if it was never
    /// reported, so at most two windows close in one call. A bar that closes
    /// on creation is not reported again when its successor opens.
    ///
    /// A rejected tick leaves the store unchanged.
    pub fn add_data(&mut self, tick: &Tick) -> Result<bool> {
        tick.validate()?;
        let window_ms = self.window_ms();

        if let Some(front) = self.data.get_mut(&tick.ticker).and_then(|h| h.front_mut()) {
            if tick.start - front.start < window_ms {
                return Self::merge_into(front, tick, window_ms);
            }
        }

        let mut bar = Bar::from(tick);
        bar.start = self.window_start(tick.start);
        if bar.duration_ms() > window_ms {
            return Err(FeedError::PreconditionViolation(format!(
                "{} tick [{}, {}) overruns the {}s window starting at {}",
                tick.ticker, tick.start, tick.end, self.window_secs, bar.start
            )));
        }
        let closed = bar.is_closed(window_ms);
        bar.closure_reported = closed;

        let history = self.data.entry(tick.ticker.clone()).or_default();
        let previous_pending = history
            .front_mut()
            .map_or(false, |prev| !std::mem::replace(&mut prev.closure_reported, true));
        history.push_front(bar);
        history.truncate(self.history_len);

        if previous_pending {
            debug!(ticker = %tick.ticker, window_secs = self.window_secs, "window closed by successor");
        }
        Ok(closed || previous_pending)
    }

    fn merge_into(front: &mut Bar, tick: &Tick, window_ms: i64) -> Result<bool> {
        if tick.start < front.start {
            return Err(FeedError::PreconditionViolation(format!(
                "{} tick starting at {} predates the open window at {}",
                tick.ticker, tick.start, front.start
            )));
        }
        if tick.end - front.start > window_ms {
            return Err(FeedError::PreconditionViolation(format!(
                "{} tick ending at {} overruns the window [{}, {})",
                tick.ticker,
                tick.end,
                front.start,
                front.start + window_ms
            )));
        }
        front.update_with(tick)?;

        let closed = front.is_closed(window_ms);
        if closed {
            front.closure_reported = true;
        }
        Ok(closed)
    }

    /// Start of the window containing `start`
    fn window_start(&self, start: i64) -> i64 {
        start - start.rem_euclid(self.window_ms())
    }

    /// History for a ticker, empty if none has been seen.
    pub fn get_data(&self, ticker: &str) -> &History {
        self.data.get(ticker).unwrap_or(&EMPTY_HISTORY)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Drop every history
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
