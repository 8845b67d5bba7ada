//! Point-in-time price reading for one symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::bar::BarSeries;

/// Current price plus previous close for one symbol, as observed by a provider.
///
/// `observed_at` is the provider-reported time of the latest observation, not the
/// time the request was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub price: f64,
    pub previous_close: f64,
    pub name: String,
    pub observed_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Builds a snapshot from the latest and second-latest closes of `series`.
    ///
    /// With a single bar the previous close equals the current price. Returns
    /// `None` for an empty series.
    pub fn from_series(series: &BarSeries, name: &str) -> Option<Self> {
        let (latest, previous) = series.latest_pair()?;
        Some(Self {
            symbol: series.symbol.clone(),
            price: latest.close,
            previous_close: previous.map_or(latest.close, |b| b.close),
            name: name.to_string(),
            observed_at: latest.timestamp,
        })
    }

    /// Absolute change against the previous close.
    pub fn change(&self) -> f64 {
        self.price - self.previous_close
    }

    /// Percent change against the previous close.
    pub fn change_percent(&self) -> f64 {
        self.change() / self.previous_close * 100.0
    }

    /// `false` when either price is non-finite or the previous close is not
    /// strictly positive, in which case the percent change is undefined.
    pub fn is_sane(&self) -> bool {
        self.price.is_finite() && self.previous_close.is_finite() && self.previous_close > 0.0
    }
}
