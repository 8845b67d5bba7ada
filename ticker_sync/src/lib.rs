//! Stock ticker dashboard backend.
//!
//! Tracks a list of symbols in SQLite and keeps their prices fresh from Alpaca or a
//! built-in simulator:
//! - [`source::QuoteSource`] hides which provider is active and never surfaces provider errors.
//! - [`refresh::Refresher`] runs one list → fetch → persist cycle;
//!   [`refresh::scheduler::RefreshLoop`] repeats it with exponential backoff.
//! - [`tracked::TrackedSymbolStore`] is the persistence seam, implemented by
//!   [`tracked::SqliteStore`].
//! - [`admin`] and [`view`] back the `ticker-sync` operator commands.

#![deny(missing_docs)]

pub mod admin;
pub mod config;
pub mod credentials;
pub mod db;
pub mod models;
pub mod pricing;
pub mod refresh;
#[allow(missing_docs)]
pub mod schema;
pub mod source;
pub mod tracked;
pub mod tz;
pub mod view;
