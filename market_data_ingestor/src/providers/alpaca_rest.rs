//! Alpaca REST client: market data (bars, news) and trading (assets, account) endpoints.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{AlpacaConfig, AlpacaProvider};
