use chrono::{DateTime, Utc};

use crate::{models::timeframe::TimeFrame, providers::alpaca_rest::params::AlpacaBarsParams};

/// Universal parameters for requesting time-series bar data from a market data provider.
///
/// It is the standard input for all [`DataProvider`](crate::providers::DataProvider)
/// implementations.
#[derive(Clone, Debug)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["AAPL", "MSFT"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider implementation,
    /// according to their own API rules.**
    pub timeframe: TimeFrame,

    /// Start of the requested time range (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the requested time range (UTC).
    pub end: DateTime<Utc>,

    /// Optional, provider-specific parameters.
    pub provider_specific: ProviderParams,
}

/// An enum to hold provider-specific request parameters.
///
/// This allows callers to specify detailed, per-request options for a
/// particular provider without cluttering the universal `BarsRequestParams`.
#[derive(Clone, Debug, Default)]
pub enum ProviderParams {
    #[default]
    None,
    Alpaca(AlpacaBarsParams),
}
