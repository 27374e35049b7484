//! Consumers of aggregated bars
//!
//! A strategy holds a non-owning reference to the [`DataHandler`], registers
//! a callback in `init` and reads bars back whenever a ticker updates.
//!
//! [`DataHandler`]: crate::handler::DataHandler

pub mod momentum;

pub use momentum::{ChaseMomentumStrategy, MOMENTUM_CALLBACK};

use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Hook the strategy up to its data source.
    fn init(&self) -> Result<()>;
}

/// Entry decision handed to the order side
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    pub ticker: String,
    /// Close of the 10-second bar that triggered the entry
    pub price: Decimal,
    pub limit_price: Decimal,
    /// End of the triggering bar
    pub at: DateTime<Utc>,
}
