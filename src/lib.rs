//! Pasta Trader
//!
//! Streams per-second aggregate bars from a market data feed, rolls them up
//! into 1s/10s/1m/5m bars per ticker and notifies strategies on every update.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod strategy;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{AggregationStore, Bar};
pub use client::{ConnectionState, MarketDataClient, ShutdownHandle};
pub use config::Config;
pub use error::{FeedError, Result};
pub use handler::{DataHandler, Resolution};
pub use strategy::{ChaseMomentumStrategy, EntrySignal, Strategy};
pub use types::Tick;
