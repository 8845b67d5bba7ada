#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use indexmap::IndexMap;
use market_data_ingestor::{
    models::{asset::Asset, news::NewsArticle, snapshot::PriceSnapshot},
    providers::{InternalSnafu, ProviderError, QuoteProvider},
};
use tempfile::TempDir;
use ticker_sync::db::{connection, migrate};
use ticker_sync::tracked::SqliteStore;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

/// Migrated temp database plus a store over it.
pub fn setup_store() -> (TestDb, SqliteStore) {
    let (db, conn) = setup_db();
    drop(conn);
    let store = SqliteStore::new(db.path.clone());
    (db, store)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn syms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn snapshot(symbol: &str, price: f64, previous_close: f64, at: DateTime<Utc>) -> PriceSnapshot {
    PriceSnapshot {
        symbol: symbol.to_string(),
        price,
        previous_close,
        name: format!("{symbol} Corp"),
        observed_at: at,
    }
}

/// Provider with a fixed answer that can be switched to failing mid-test.
#[derive(Default)]
pub struct ScriptedProvider {
    pub snapshots: Mutex<IndexMap<String, PriceSnapshot>>,
    pub fail: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with(snapshots: Vec<PriceSnapshot>) -> Arc<Self> {
        let p = Self::default();
        *p.snapshots.lock().unwrap() = snapshots
            .into_iter()
            .map(|s| (s.symbol.clone(), s))
            .collect();
        Arc::new(p)
    }

    pub fn failing() -> Arc<Self> {
        let p = Self::default();
        *p.fail.lock().unwrap() = true;
        Arc::new(p)
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for ScriptedProvider {
    async fn fetch_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<IndexMap<String, PriceSnapshot>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return InternalSnafu {
                message: "upstream unavailable",
            }
            .fail();
        }
        let all = self.snapshots.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| all.get(s).map(|snap| (s.clone(), snap.clone())))
            .collect())
    }

    async fn fetch_news(&self, _symbols: &[String]) -> Result<Vec<NewsArticle>, ProviderError> {
        Ok(vec![])
    }

    async fn fetch_assets(&self) -> Result<IndexMap<String, Asset>, ProviderError> {
        Ok(IndexMap::new())
    }
}
