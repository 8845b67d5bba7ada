//! Provider abstraction for market data sources.
//!
//! Two traits live here:
//!
//! - [`DataProvider`] fetches raw time-series bars, the building block vendors expose.
//! - [`QuoteProvider`] is what the dashboard consumes: batched price snapshots, news
//!   and asset metadata for a list of symbols.
//!
//! Both are designed for async usage and support dynamic dispatch
//! (`Arc<dyn QuoteProvider>`) so callers can pick a live vendor or the simulator at
//! runtime.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use indexmap::IndexMap;
//! use market_data_ingestor::models::{asset::Asset, news::NewsArticle, snapshot::PriceSnapshot};
//! use market_data_ingestor::providers::{ProviderError, QuoteProvider};
//!
//! struct SilentProvider;
//!
//! #[async_trait]
//! impl QuoteProvider for SilentProvider {
//!     async fn fetch_snapshots(
//!         &self,
//!         _symbols: &[String],
//!     ) -> Result<IndexMap<String, PriceSnapshot>, ProviderError> {
//!         Ok(IndexMap::new())
//!     }
//!
//!     async fn fetch_news(&self, _symbols: &[String]) -> Result<Vec<NewsArticle>, ProviderError> {
//!         Ok(vec![])
//!     }
//!
//!     async fn fetch_assets(&self) -> Result<IndexMap<String, Asset>, ProviderError> {
//!         Ok(IndexMap::new())
//!     }
//! }
//! ```

pub mod alpaca_rest;
pub mod simulated;

use async_trait::async_trait;
use indexmap::IndexMap;
use snafu::{Backtrace, Snafu};

use crate::models::{
    asset::Asset, bar::BarSeries, news::NewsArticle, request_params::BarsRequestParams,
    snapshot::PriceSnapshot,
};

/// Trait for fetching time-series bar data from a market data provider.
#[async_trait]
pub trait DataProvider {
    /// Fetches time-series bar data for the given request parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BarSeries>)` - One series per symbol the vendor had data for.
    /// * `Err(ProviderError)` - If the request fails.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError>;
}

/// Snapshot/news/asset contract shared by the live client and the simulator.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Latest price and previous close for each symbol the provider knows about.
    ///
    /// Symbols without data (unknown ticker, nothing in the lookback window) are
    /// left out of the map rather than reported as errors.
    async fn fetch_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<IndexMap<String, PriceSnapshot>, ProviderError>;

    /// News articles concerning any of `symbols`.
    async fn fetch_news(&self, symbols: &[String]) -> Result<Vec<NewsArticle>, ProviderError>;

    /// Tradable assets keyed by symbol.
    async fn fetch_assets(&self) -> Result<IndexMap<String, Asset>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// A credential was empty.
    #[snafu(display("Missing credential: {name}"))]
    MissingCredential {
        name: &'static str,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"), context(false))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"), context(false))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a provider implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout, bad JSON).
    #[snafu(display("API request failed: {source}"), context(false))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API answered with a non-success status (e.g., invalid API key).
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"), context(false))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}
