//! Batch decoding and fan-out
//!
//! Owns one aggregation store per resolution. Every aggregate tick of a
//! batch is fed to all stores, then every registered callback is told the
//! tick's ticker. Callbacks read bars back through [`DataHandler::get_data`].


use crate::aggregate::{AggregationStore, Bar};
use crate::client::MarketDataClient;
use crate::config::AggregationConfig;
use crate::error::{FeedError, Result};
use crate::registry::Registry;
use crate::types::{Tick, AGGREGATE_EVENT};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Name under which the handler registers with the feed client
pub const PROCESS_MESSAGE_HANDLER: &str = "data_handler_process_message";

/// Consumer notified with the ticker of every absorbed tick
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Bar resolution, in store order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    OneSecond,
    TenSeconds,
    OneMinute,
    FiveMinutes,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::OneSecond,
        Resolution::TenSeconds,
        Resolution::OneMinute,
        Resolution::FiveMinutes,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::OneSecond => write!(f, "1s"),
            Resolution::TenSeconds => write!(f, "10s"),
            Resolution::OneMinute => write!(f, "1m"),
            Resolution::FiveMinutes => write!(f, "5m"),
        }
    }
}

pub struct DataHandler {
    stores: RwLock<Vec<AggregationStore>>,
    callbacks: Mutex<Registry<Callback>>,
}

impl Default for DataHandler {
    fn default() -> Self {
        Self::new(&AggregationConfig::default())
    }
}

impl DataHandler {
    pub fn new(config: &AggregationConfig) -> Self {
        let stores = config
            .resolutions_secs
            .iter()
            .map(|secs| AggregationStore::new(*secs, config.history_len))
            .collect();
        Self {
            stores: RwLock::new(stores),
            callbacks: Mutex::new(Registry::new()),
        }
    }

    /// Register `process_message` as a payload handler on the client.
    pub fn attach(self: &Arc<Self>, client: &mut MarketDataClient) -> Result<()> {
        let handler = Arc::clone(self);
        client.register_handler(PROCESS_MESSAGE_HANDLER, move |payload: &str| {
            if let Err(e) = handler.process_message(payload) {
                error!("Dropping feed message: {}", e);
            }
        })
    }

    /// Decode one batch and apply its aggregate ticks in order.
    ///
    /// Records of another event kind are skipped, and an aggregate that fails
    /// to decode or validate is dropped; the rest of the batch still goes
    /// through. Returns the number of ticks applied.
    pub fn process_message(&self, raw: &str) -> Result<usize> {
        debug!(len = raw.len(), "Processing message");
        let records: Vec<Value> = serde_json::from_str(raw)?;
        if records.is_empty() {
            return Err(FeedError::EmptyBatch);
        }

        let callbacks: Vec<Callback> = self.callbacks.lock().values().cloned().collect();
        let mut applied = 0;
        for record in records {
            let event = record.get("ev").and_then(Value::as_str).unwrap_or_default();
            if event != AGGREGATE_EVENT {
                debug!(event = %event, "Skipping non-aggregate record");
                continue;
            }
            let tick: Tick = match serde_json::from_value(record) {
                Ok(tick) => tick,
                Err(e) => {
                    warn!("Dropping malformed aggregate: {}", e);
                    continue;
                }
            };
            if let Err(e) = tick.validate() {
                warn!(ticker = %tick.ticker, "Dropping tick: {}", e);
                continue;
            }

            self.add_data(&tick);
            for callback in &callbacks {
                callback(&tick.ticker);
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Feed one tick to every store. A store rejecting it does not stop the others.
    fn add_data(&self, tick: &Tick) {
        let mut stores = self.stores.write();
        for store in stores.iter_mut() {
            match store.add_data(tick) {
                Ok(true) => debug!(
                    ticker = %tick.ticker,
                    window_secs = store.window_secs(),
                    "Window closed"
                ),
                Ok(false) => {}
                Err(e) => warn!(
                    ticker = %tick.ticker,
                    window_secs = store.window_secs(),
                    "Tick rejected: {}",
                    e
                ),
            }
        }
    }

    /// Newest-first copy of a ticker's bars at one resolution
    pub fn get_data(&self, resolution: Resolution, ticker: &str) -> Vec<Bar> {
        let stores = self.stores.read();
        stores
            .get(resolution.index())
            .map(|store| store.get_data(ticker).iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Newest bar of a ticker at one resolution
    pub fn latest(&self, resolution: Resolution, ticker: &str) -> Option<Bar> {
        let stores = self.stores.read();
        stores
            .get(resolution.index())
            .and_then(|store| store.get_data(ticker).front().cloned())
    }

    pub fn window_secs(&self, resolution: Resolution) -> i64 {
        self.stores.read()[resolution.index()].window_secs()
    }

    /// Register a consumer. Takes effect from the next message.
    pub fn register_callback<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.lock().register(name, Arc::new(callback))
    }

    pub fn unregister_callback(&self, name: &str) -> Result<()> {
        self.callbacks.lock().unregister(name).map(|_| ())
    }

    /// Forget every bar, e.g. before reconnecting
    pub fn clear(&self) {
        for store in self.stores.write().iter_mut() {
            store.clear();
        }
    }
}
