//! Market data access for the ticker dashboard.
//!
//! - [`models`] holds the vendor-agnostic types exchanged with callers: bars,
//!   price snapshots, news articles and asset metadata.
//! - [`providers`] defines the [`QuoteProvider`](providers::QuoteProvider) contract
//!   and its two implementations: the Alpaca REST client and an in-memory
//!   simulator for demos and development.

pub mod models;
pub mod providers;
