//! Tracked symbols, stored credentials and runtime settings.
//!
//! [`TrackedSymbolStore`] is the portable surface the refresh loop and operator
//! actions talk to; the SQLite implementation lives in [`repo`].
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::{credentials::Credentials, pricing::PriceFields, source::SourceMode};

pub mod repo;

pub use repo::SqliteStore;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while interacting with the store.
pub enum RepoError {
    #[error("{symbol} is already being tracked")]
    /// Insert of a symbol that exists.
    AlreadyTracked {
        /// The duplicate symbol.
        symbol: String,
    },
    #[error("{symbol} not found")]
    /// Delete of a symbol that does not exist.
    NotTracked {
        /// The missing symbol.
        symbol: String,
    },
    #[error("stored value for {key} is invalid: {value}")]
    /// A setting in `engine_kv` that does not parse.
    BadSetting {
        /// Setting key.
        key: String,
        /// Raw stored value.
        value: String,
    },
    #[error("blocking store task failed: {0}")]
    /// The `spawn_blocking` task panicked or was cancelled.
    Join(#[from] tokio::task::JoinError),
}

/// Result type used throughout the store for fallible operations.
pub type RepoResult<T> = anyhow::Result<T>;

/// A symbol being tracked, with its last known prices.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSymbol {
    /// Upper-case ticker.
    pub symbol: String,
    /// Display name, if one has been seen.
    pub name: Option<String>,
    /// Price fields, `None` until the first refresh.
    pub prices: Option<PriceFields>,
    /// Observation time of the last applied snapshot.
    pub last_updated: Option<DateTime<Utc>>,
}

/// One symbol's new prices from a refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    /// Target symbol.
    pub symbol: String,
    /// Display name to set if the row has none.
    pub name: Option<String>,
    /// New price values.
    pub prices: PriceFields,
    /// Provider-reported observation time.
    pub observed_at: DateTime<Utc>,
}

/// A saved key pair and when it was saved.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    /// The key pair.
    pub credentials: Credentials,
    /// Save time.
    pub updated_at: DateTime<Utc>,
}

/// Portable store surface used by the refresh loop and operator actions.
#[async_trait]
pub trait TrackedSymbolStore: Send + Sync {
    /// All tracked symbols ordered by symbol.
    async fn list_tracked(&self) -> RepoResult<Vec<TrackedSymbol>>;

    /// Applies every update in one transaction; on any error none of them is kept.
    ///
    /// For each update the display name is only set when absent, the four price fields
    /// are written together, and `last_updated` never moves backwards. Updates for
    /// symbols that are no longer tracked are ignored. Returns the number of rows written.
    async fn apply_price_updates(&self, updates: &[PriceUpdate]) -> RepoResult<usize>;

    /// Starts tracking `symbol`. Fails with [`RepoError::AlreadyTracked`] on duplicates.
    async fn add_symbol(&self, symbol: &str, name: Option<&str>) -> RepoResult<TrackedSymbol>;

    /// Stops tracking `symbol`. Fails with [`RepoError::NotTracked`] if absent.
    async fn remove_symbol(&self, symbol: &str) -> RepoResult<()>;

    /// Inserts any of `symbols` not yet tracked; returns how many were added.
    async fn seed_symbols(&self, symbols: &[String]) -> RepoResult<usize>;

    /// Saves a new key pair; it becomes the active one.
    async fn save_credentials(&self, credentials: &Credentials) -> RepoResult<()>;

    /// Most recently saved key pair.
    async fn active_credentials(&self) -> RepoResult<Option<StoredCredentials>>;

    /// Mode requested by the operator, if any.
    async fn desired_mode(&self) -> RepoResult<Option<SourceMode>>;

    /// Records the mode the running loop should switch to.
    async fn set_desired_mode(&self, mode: SourceMode) -> RepoResult<()>;
}

/// Last stored price per tracked symbol; symbols never refreshed are left out.
pub async fn last_known_prices(store: &dyn TrackedSymbolStore) -> RepoResult<IndexMap<String, f64>> {
    Ok(store
        .list_tracked()
        .await?
        .into_iter()
        .filter_map(|t| t.prices.map(|p| (t.symbol, p.price)))
        .collect())
}
