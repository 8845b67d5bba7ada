//! SQLite implementation of [`TrackedSymbolStore`](crate::tracked::TrackedSymbolStore).
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{SqliteConnection, prelude::*};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::{
    credentials::Credentials,
    db::{connection::connect_sqlite, migrate},
    models::{ApiCredentialRow, NewApiCredential, NewTrackedSymbol, PriceChangeset, TrackedSymbolRow},
    pricing::PriceFields,
    schema::{api_credentials, engine_kv, tracked_symbols},
    source::SourceMode,
    tracked::{
        PriceUpdate, RepoError, RepoResult, StoredCredentials, TrackedSymbol, TrackedSymbolStore,
    },
    tz,
};

use crate::schema::tracked_symbols::dsl as ts;

const SOURCE_MODE_KEY: &str = "source_mode";

/// SQLite-backed [`TrackedSymbolStore`].
///
/// Every call opens its own connection on the blocking pool, so the store can be
/// shared freely and several processes may use the same file. Writes run inside
/// `BEGIN IMMEDIATE` and queue on the busy timeout rather than interleaving.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    database_url: String,
}

impl SqliteStore {
    /// Store over an already migrated database.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Applies pending migrations, then returns a store over the file.
    pub async fn open(database_url: impl Into<String>) -> RepoResult<Self> {
        let url: String = database_url.into();
        let migrate_url = url.clone();
        tokio::task::spawn_blocking(move || migrate::run_sqlite(&migrate_url))
            .await
            .map_err(RepoError::from)??;
        Ok(Self::new(url))
    }

    /// Path or URL of the database file.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    async fn with_conn<T, F>(&self, f: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> RepoResult<T> + Send + 'static,
    {
        let url = self.database_url.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = connect_sqlite(&url)?;
            f(&mut conn)
        })
        .await
        .map_err(RepoError::from)?
    }
}

fn to_domain(row: TrackedSymbolRow) -> RepoResult<TrackedSymbol> {
    let prices = match (
        row.last_price,
        row.previous_close,
        row.price_change,
        row.price_change_percent,
    ) {
        (Some(price), Some(previous_close), Some(change), Some(change_percent)) => {
            Some(PriceFields {
                price,
                previous_close,
                change,
                change_percent,
            })
        }
        _ => None,
    };
    let last_updated = row
        .last_updated
        .as_deref()
        .map(tz::parse_ts_to_utc)
        .transpose()
        .with_context(|| format!("last_updated of {}", row.symbol))?;

    Ok(TrackedSymbol {
        symbol: row.symbol,
        name: row.name,
        prices,
        last_updated,
    })
}

fn apply_one(conn: &mut SqliteConnection, update: &PriceUpdate) -> RepoResult<usize> {
    let existing: Option<(Option<String>, Option<String>)> = ts::tracked_symbols
        .filter(ts::symbol.eq(&update.symbol))
        .select((ts::name, ts::last_updated))
        .first(conn)
        .optional()?;

    let Some((name, last_updated)) = existing else {
        debug!(symbol = %update.symbol, "symbol removed before update, skipping");
        return Ok(0);
    };

    // last_updated only moves forward
    let stamp = match last_updated.as_deref() {
        Some(raw) => tz::parse_ts_to_utc(raw)?.max(update.observed_at),
        None => update.observed_at,
    };
    let stamp = tz::to_rfc3339_micros(stamp);

    let new_name = match name {
        Some(_) => None,
        None => update.name.as_deref().filter(|n| !n.trim().is_empty()),
    };

    let changeset = PriceChangeset {
        name: new_name,
        last_price: update.prices.price,
        previous_close: update.prices.previous_close,
        price_change: update.prices.change,
        price_change_percent: update.prices.change_percent,
        last_updated: &stamp,
    };

    let written = diesel::update(ts::tracked_symbols.filter(ts::symbol.eq(&update.symbol)))
        .set(&changeset)
        .execute(conn)?;
    Ok(written)
}

#[async_trait]
impl TrackedSymbolStore for SqliteStore {
    async fn list_tracked(&self) -> RepoResult<Vec<TrackedSymbol>> {
        self.with_conn(|conn| {
            let rows: Vec<TrackedSymbolRow> = ts::tracked_symbols
                .order(ts::symbol.asc())
                .select(TrackedSymbolRow::as_select())
                .load(conn)?;
            rows.into_iter().map(to_domain).collect()
        })
        .await
    }

    async fn apply_price_updates(&self, updates: &[PriceUpdate]) -> RepoResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let updates = updates.to_vec();
        self.with_conn(move |conn| {
            conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
                let mut written = 0;
                for update in &updates {
                    written += apply_one(conn, update)?;
                }
                Ok(written)
            })
        })
        .await
    }

    async fn add_symbol(&self, symbol: &str, name: Option<&str>) -> RepoResult<TrackedSymbol> {
        let symbol = symbol.to_string();
        let name = name.map(str::to_string);
        self.with_conn(move |conn| {
            conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
                let exists: i64 = ts::tracked_symbols
                    .filter(ts::symbol.eq(&symbol))
                    .count()
                    .get_result(conn)?;
                if exists > 0 {
                    return Err(RepoError::AlreadyTracked { symbol }.into());
                }

                let row: TrackedSymbolRow = diesel::insert_into(tracked_symbols::table)
                    .values(&NewTrackedSymbol {
                        symbol: &symbol,
                        name: name.as_deref(),
                    })
                    .returning(TrackedSymbolRow::as_returning())
                    .get_result(conn)?;
                to_domain(row)
            })
        })
        .await
    }

    async fn remove_symbol(&self, symbol: &str) -> RepoResult<()> {
        let symbol = symbol.to_string();
        self.with_conn(move |conn| {
            let deleted = diesel::delete(ts::tracked_symbols.filter(ts::symbol.eq(&symbol)))
                .execute(conn)?;
            if deleted == 0 {
                return Err(RepoError::NotTracked { symbol }.into());
            }
            Ok(())
        })
        .await
    }

    async fn seed_symbols(&self, symbols: &[String]) -> RepoResult<usize> {
        let symbols = symbols.to_vec();
        self.with_conn(move |conn| {
            conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
                let mut added = 0;
                for symbol in &symbols {
                    added += diesel::insert_or_ignore_into(tracked_symbols::table)
                        .values(&NewTrackedSymbol {
                            symbol: symbol.as_str(),
                            name: None,
                        })
                        .execute(conn)?;
                }
                Ok(added)
            })
        })
        .await
    }

    async fn save_credentials(&self, credentials: &Credentials) -> RepoResult<()> {
        let credentials = credentials.clone();
        self.with_conn(move |conn| {
            let now = tz::to_rfc3339_micros(Utc::now());
            diesel::insert_into(api_credentials::table)
                .values(&NewApiCredential {
                    api_key: credentials.api_key().expose_secret(),
                    secret_key: credentials.secret_key().expose_secret(),
                    updated_at: &now,
                })
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn active_credentials(&self) -> RepoResult<Option<StoredCredentials>> {
        self.with_conn(|conn| {
            use crate::schema::api_credentials::dsl as ac;

            let row: Option<ApiCredentialRow> = ac::api_credentials
                .order((ac::updated_at.desc(), ac::id.desc()))
                .select(ApiCredentialRow::as_select())
                .first(conn)
                .optional()?;

            row.map(|row| -> RepoResult<StoredCredentials> {
                Ok(StoredCredentials {
                    updated_at: tz::parse_ts_to_utc(&row.updated_at)?,
                    credentials: Credentials::new(row.api_key, row.secret_key),
                })
            })
            .transpose()
        })
        .await
    }

    async fn desired_mode(&self) -> RepoResult<Option<SourceMode>> {
        self.with_conn(|conn| {
            use crate::schema::engine_kv::dsl as kv;

            let raw: Option<String> = kv::engine_kv
                .filter(kv::k.eq(SOURCE_MODE_KEY))
                .select(kv::v)
                .first(conn)
                .optional()?;

            raw.map(|value| -> RepoResult<SourceMode> {
                value.parse::<SourceMode>().map_err(|_| {
                    anyhow::Error::from(RepoError::BadSetting {
                        key: SOURCE_MODE_KEY.to_string(),
                        value,
                    })
                })
            })
            .transpose()
        })
        .await
    }

    async fn set_desired_mode(&self, mode: SourceMode) -> RepoResult<()> {
        self.with_conn(move |conn| {
            diesel::insert_into(engine_kv::table)
                .values((
                    engine_kv::k.eq(SOURCE_MODE_KEY),
                    engine_kv::v.eq(mode.as_str()),
                ))
                .on_conflict(engine_kv::k)
                .do_update()
                .set(engine_kv::v.eq(mode.as_str()))
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}
