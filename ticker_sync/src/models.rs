//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`]:
//! - [`crate::schema::tracked_symbols`]: symbols to refresh plus their last known prices
//! - [`crate::schema::api_credentials`]: stored Alpaca key pairs, newest wins
//! - [`crate::schema::engine_kv`]: small runtime settings (desired source mode)
//!
//! Timestamps are RFC3339 UTC text; see [`crate::tz::to_rfc3339_micros`].

use diesel::prelude::*;

use crate::schema::*;

/// A row in [`crate::schema::tracked_symbols`].
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = tracked_symbols, check_for_backend(diesel::sqlite::Sqlite))]
pub struct TrackedSymbolRow {
    /// Database primary key.
    pub id: i32,
    /// Upper-case ticker, unique.
    pub symbol: String,
    /// Display name, filled from the first snapshot that carries one.
    pub name: Option<String>,
    /// Last known price.
    pub last_price: Option<f64>,
    /// Previous close paired with `last_price`.
    pub previous_close: Option<f64>,
    /// `last_price - previous_close`.
    pub price_change: Option<f64>,
    /// `price_change / previous_close * 100`.
    pub price_change_percent: Option<f64>,
    /// Observation time of the last applied snapshot (RFC3339 UTC).
    pub last_updated: Option<String>,
    /// Row creation timestamp (RFC3339 UTC).
    pub created_at: String,
}

/// Insertable form of [`TrackedSymbolRow`]; price fields start out NULL.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tracked_symbols)]
pub struct NewTrackedSymbol<'a> {
    /// Upper-case ticker.
    pub symbol: &'a str,
    /// Optional display name.
    pub name: Option<&'a str>,
}

/// Price columns written by one refresh; always set together.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tracked_symbols)]
pub struct PriceChangeset<'a> {
    /// Display name (only present when the row had none).
    pub name: Option<&'a str>,
    /// New price.
    pub last_price: f64,
    /// New previous close.
    pub previous_close: f64,
    /// Derived absolute change.
    pub price_change: f64,
    /// Derived percent change.
    pub price_change_percent: f64,
    /// New refresh timestamp (RFC3339 UTC).
    pub last_updated: &'a str,
}

/// A row in [`crate::schema::api_credentials`].
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = api_credentials, check_for_backend(diesel::sqlite::Sqlite))]
pub struct ApiCredentialRow {
    /// Database primary key.
    pub id: i32,
    /// Alpaca key id.
    pub api_key: String,
    /// Alpaca secret.
    pub secret_key: String,
    /// When this pair was saved (RFC3339 UTC).
    pub updated_at: String,
}

/// Insertable form of [`ApiCredentialRow`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = api_credentials)]
pub struct NewApiCredential<'a> {
    /// Alpaca key id.
    pub api_key: &'a str,
    /// Alpaca secret.
    pub secret_key: &'a str,
    /// Save time (RFC3339 UTC).
    pub updated_at: &'a str,
}
