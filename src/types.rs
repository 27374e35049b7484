//! Feed record types

use crate::error::{FeedError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event kind carried by per-second aggregate records
pub const AGGREGATE_EVENT: &str = "A";

pub const MILLIS_PER_SECOND: i64 = 1000;

/// One aggregate update as sent by the feed.
///
/// Fields the engine does not use (today's average price, average trade
/// size) are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Event kind, `"A"` for aggregates
    #[serde(rename = "ev")]
    pub event: String,
    #[serde(rename = "sym")]
    pub ticker: String,
    /// Volume traded inside this tick's window
    #[serde(rename = "v")]
    pub volume: i64,
    /// Accumulated volume for the day
    #[serde(rename = "av")]
    pub accumulated_volume: i64,
    #[serde(rename = "op")]
    pub day_open: Decimal,
    #[serde(rename = "vw")]
    pub vwap: Decimal,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    /// Window start, epoch milliseconds
    #[serde(rename = "s")]
    pub start: i64,
    /// Window end, epoch milliseconds
    #[serde(rename = "e")]
    pub end: i64,
}

impl Tick {
    pub fn is_aggregate(&self) -> bool {
        self.event == AGGREGATE_EVENT
    }

    /// Reject records the aggregation engine cannot absorb.
    pub fn validate(&self) -> Result<()> {
        if !self.is_aggregate() {
            return Err(FeedError::PreconditionViolation(format!(
                "expected event kind {}, got {} for {}",
                AGGREGATE_EVENT, self.event, self.ticker
            )));
        }
        if self.end <= self.start {
            return Err(FeedError::PreconditionViolation(format!(
                "tick for {} ends at {} which is not after its start {}",
                self.ticker, self.end, self.start
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Tick builders shared by the unit tests.

    use super::*;

    /// JSON record in the wire layout, including the fields the engine ignores.
    #[allow(clippy::too_many_arguments)]
    pub fn agg_json(
        sym: &str,
        v: i64,
        av: i64,
        vw: &str,
        o: &str,
        c: &str,
        h: &str,
        l: &str,
        s: i64,
        e: i64,
    ) -> String {
        format!(
            r#"{{"ev":"A","sym":"{sym}","v":{v},"av":{av},"op":25.66,"vw":{vw},"o":{o},"c":{c},"h":{h},"l":{l},"a":25.4014,"z":50,"s":{s},"e":{e}}}"#
        )
    }

    pub fn tick_from(json: &str) -> Tick {
        serde_json::from_str(json).expect("fixture decodes")
    }

    /// Three contiguous one-second SPCE ticks.
    pub fn spce_ticks() -> Vec<Tick> {
        vec![
            tick_from(&agg_json(
                "SPCE", 200, 8642007, "25.3981", "25.39", "25.45", "25.57", "25.35",
                1610144868000, 1610144869000,
            )),
            tick_from(&agg_json(
                "SPCE", 100, 8642107, "25.3980", "25.43", "25.47", "25.49", "25.30",
                1610144869000, 1610144870000,
            )),
            tick_from(&agg_json(
                "SPCE", 600, 8642707, "25.3983", "25.45", "25.54", "25.61", "25.44",
                1610144870000, 1610144871000,
            )),
        ]
    }

    /// A one-second AAPL tick overlapping the second SPCE tick.
    pub fn aapl_tick() -> Tick {
        tick_from(&agg_json(
            "AAPL", 100, 8642107, "25.3980", "25.43", "25.47", "25.49", "25.30",
            1610144869000, 1610144870000,
        ))
    }

    /// A one-second SPCE tick ten seconds after the first batch.
    pub fn spce_later_tick() -> Tick {
        tick_from(&agg_json(
            "SPCE", 900, 8642707, "25.3983", "25.39", "25.54", "25.61", "25.30",
            1610144880000, 1610144881000,
        ))
    }

    /// Wrap records into a batch payload as the feed sends it.
    pub fn batch(records: &[String]) -> String {
        format!("[{}]", records.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_wire_record() {
        let tick = spce_ticks().remove(0);
        assert_eq!(tick.event, "A");
        assert_eq!(tick.ticker, "SPCE");
        assert_eq!(tick.volume, 200);
        assert_eq!(tick.accumulated_volume, 8642007);
        assert_eq!(tick.day_open, dec!(25.66));
        assert_eq!(tick.vwap, dec!(25.3981));
        assert_eq!(tick.high, dec!(25.57));
        assert_eq!(tick.low, dec!(25.35));
        assert_eq!(tick.start, 1610144868000);
        assert_eq!(tick.end, 1610144869000);
        assert!(tick.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_other_events() {
        let mut tick = aapl_tick();
        tick.event = "status".to_string();
        assert!(!tick.is_aggregate());
        assert!(matches!(tick.validate(), Err(FeedError::PreconditionViolation(_))));
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let mut tick = aapl_tick();
        tick.end = tick.start;
        assert!(tick.validate().is_err());
    }

    #[test]
    fn test_missing_field_fails() {
        let result = serde_json::from_str::<Tick>(r#"{"ev":"A","sym":"X"}"#);
        assert!(result.is_err());
    }
}
