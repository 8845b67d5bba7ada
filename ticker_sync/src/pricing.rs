//! Derived price fields.
//!
//! `change` and `change_percent` are never computed anywhere else, so every write
//! of a price goes through [`PriceFields::derive`] and carries all four values.

use market_data_ingestor::models::snapshot::PriceSnapshot;

/// Price, previous close and the two values derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceFields {
    /// Current price.
    pub price: f64,
    /// Previous close.
    pub previous_close: f64,
    /// `price - previous_close`.
    pub change: f64,
    /// `change / previous_close * 100`.
    pub change_percent: f64,
}

impl PriceFields {
    /// Computes the derived values, or `None` if the inputs are not finite or the
    /// previous close is not strictly positive.
    pub fn derive(price: f64, previous_close: f64) -> Option<Self> {
        if !(price.is_finite() && previous_close.is_finite() && previous_close > 0.0) {
            return None;
        }
        let change = price - previous_close;
        Some(Self {
            price,
            previous_close,
            change,
            change_percent: change / previous_close * 100.0,
        })
    }

    /// Same as [`PriceFields::derive`] for a provider snapshot.
    pub fn from_snapshot(snapshot: &PriceSnapshot) -> Option<Self> {
        Self::derive(snapshot.price, snapshot.previous_close)
    }
}
