use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ticker_sync::credentials::Credentials;
use ticker_sync::refresh::{
    RefreshError, Refresher,
    scheduler::{Intervals, RefreshLoop},
};
use ticker_sync::source::{QuoteSource, SourceMode};
use ticker_sync::tracked::{
    PriceUpdate, RepoResult, SqliteStore, StoredCredentials, TrackedSymbol, TrackedSymbolStore,
};

mod common;
use common::{ScriptedProvider, snapshot, syms};

const INTERVALS: Intervals = Intervals {
    live: Duration::from_secs(300),
    simulated: Duration::from_secs(30),
};
const CEILING: Duration = Duration::from_secs(900);

/// Delegates to a real store but fails every write.
struct ReadOnlyStore(SqliteStore);

#[async_trait]
impl TrackedSymbolStore for ReadOnlyStore {
    async fn list_tracked(&self) -> RepoResult<Vec<TrackedSymbol>> {
        self.0.list_tracked().await
    }
    async fn apply_price_updates(&self, _updates: &[PriceUpdate]) -> RepoResult<usize> {
        Err(anyhow!("disk I/O error"))
    }
    async fn add_symbol(&self, symbol: &str, name: Option<&str>) -> RepoResult<TrackedSymbol> {
        self.0.add_symbol(symbol, name).await
    }
    async fn remove_symbol(&self, symbol: &str) -> RepoResult<()> {
        self.0.remove_symbol(symbol).await
    }
    async fn seed_symbols(&self, symbols: &[String]) -> RepoResult<usize> {
        self.0.seed_symbols(symbols).await
    }
    async fn save_credentials(&self, credentials: &Credentials) -> RepoResult<()> {
        self.0.save_credentials(credentials).await
    }
    async fn active_credentials(&self) -> RepoResult<Option<StoredCredentials>> {
        self.0.active_credentials().await
    }
    async fn desired_mode(&self) -> RepoResult<Option<SourceMode>> {
        self.0.desired_mode().await
    }
    async fn set_desired_mode(&self, mode: SourceMode) -> RepoResult<()> {
        self.0.set_desired_mode(mode).await
    }
}

fn refresher(store: Arc<dyn TrackedSymbolStore>, provider: Arc<ScriptedProvider>, mode: SourceMode) -> Refresher {
    Refresher::new(store, Arc::new(QuoteSource::with_provider(mode, provider)))
}

#[tokio::test]
async fn partial_answer_updates_only_returned_symbols() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL", "MSFT", "TSLA"])).await.unwrap();

    let at = Utc.with_ymd_and_hms(2024, 7, 1, 20, 0, 0).unwrap();
    let provider = ScriptedProvider::with(vec![
        snapshot("AAPL", 110.0, 100.0, at),
        snapshot("TSLA", 180.0, 200.0, at),
    ]);
    let store = Arc::new(store);
    let r = refresher(store.clone(), provider.clone(), SourceMode::Live);

    let report = r.refresh_cycle().await.expect("cycle");
    assert_eq!((report.requested, report.updated, report.skipped), (3, 2, 1));
    assert_eq!(provider.calls(), 1, "one batched provider call per cycle");

    let rows = store.list_tracked().await.unwrap();
    let msft = rows.iter().find(|t| t.symbol == "MSFT").unwrap();
    assert_eq!(msft.prices, None);
    assert_eq!(msft.last_updated, None);

    for row in rows.iter().filter(|t| t.symbol != "MSFT") {
        let p = row.prices.expect("updated");
        assert!((p.change - (p.price - p.previous_close)).abs() < 1e-9);
        assert!((p.change_percent - p.change / p.previous_close * 100.0).abs() < 1e-9);
        assert_eq!(row.last_updated, Some(at));
    }
    let tsla = rows.iter().find(|t| t.symbol == "TSLA").unwrap();
    assert_eq!(tsla.prices.unwrap().change_percent, -10.0);
}

#[tokio::test]
async fn unusable_snapshot_is_skipped() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL", "ZERO"])).await.unwrap();

    let provider = ScriptedProvider::with(vec![
        snapshot("AAPL", 110.0, 100.0, Utc::now()),
        snapshot("ZERO", 1.0, 0.0, Utc::now()),
    ]);
    let store = Arc::new(store);
    let report = refresher(store.clone(), provider, SourceMode::Live)
        .refresh_cycle()
        .await
        .unwrap();
    assert_eq!((report.updated, report.skipped), (1, 1));

    let zero = store
        .list_tracked()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.symbol == "ZERO")
        .unwrap();
    assert_eq!(zero.prices, None);
}

#[tokio::test]
async fn provider_fault_is_a_fetch_error_and_writes_nothing() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();
    let store = Arc::new(store);

    let err = refresher(store.clone(), ScriptedProvider::failing(), SourceMode::Live)
        .refresh_cycle()
        .await
        .unwrap_err();
    assert!(matches!(err, RefreshError::Fetch { .. }), "{err}");
    assert_eq!(store.list_tracked().await.unwrap()[0].prices, None);
}

#[tokio::test]
async fn empty_watch_list_succeeds_without_calling_provider() {
    let (_db, store) = common::setup_store();
    let provider = ScriptedProvider::with(vec![]);
    let report = refresher(Arc::new(store), provider.clone(), SourceMode::Live)
        .refresh_cycle()
        .await
        .unwrap();
    assert_eq!(report.requested, 0);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn failures_back_off_and_success_resets() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();

    let provider = ScriptedProvider::with(vec![snapshot("AAPL", 110.0, 100.0, Utc::now())]);
    provider.set_failing(true);
    let mut lp = RefreshLoop::new(
        refresher(Arc::new(store), provider.clone(), SourceMode::Live),
        INTERVALS,
        CEILING,
        None,
    );
    assert_eq!(lp.retry_delay().current(), Duration::from_secs(300));

    assert_eq!(lp.tick().await, Duration::from_secs(600));
    assert!(lp.retry_delay().is_backing_off());
    assert_eq!(lp.tick().await, Duration::from_secs(900));
    assert_eq!(lp.tick().await, Duration::from_secs(900), "capped at the ceiling");

    provider.set_failing(false);
    assert_eq!(lp.tick().await, Duration::from_secs(300));
    assert!(!lp.retry_delay().is_backing_off());
}

#[tokio::test]
async fn persistence_failure_backs_off() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();
    let store: Arc<dyn TrackedSymbolStore> = Arc::new(ReadOnlyStore(store));

    let provider = ScriptedProvider::with(vec![snapshot("AAPL", 110.0, 100.0, Utc::now())]);
    let r = refresher(store, provider, SourceMode::Simulated);

    let err = r.refresh_cycle().await.unwrap_err();
    assert!(matches!(err, RefreshError::Persistence(_)), "{err}");

    let mut lp = RefreshLoop::new(r, INTERVALS, CEILING, None);
    assert_eq!(lp.tick().await, Duration::from_secs(60));
}

#[tokio::test]
async fn manual_refresh_reports_and_leaves_backoff_alone() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL", "MSFT"])).await.unwrap();

    let provider = ScriptedProvider::with(vec![snapshot("AAPL", 110.0, 100.0, Utc::now())]);
    provider.set_failing(true);
    let mut lp = RefreshLoop::new(
        refresher(Arc::new(store), provider.clone(), SourceMode::Live),
        INTERVALS,
        CEILING,
        None,
    );
    lp.tick().await;
    let backing_off = *lp.retry_delay();

    let failed = lp.refresher().manual_refresh().await;
    assert!(!failed.success);
    assert!(failed.message.starts_with("Error updating stock prices: "), "{}", failed.message);

    provider.set_failing(false);
    let ok = lp.refresher().manual_refresh().await;
    assert!(ok.success);
    assert_eq!(ok.message, "Stock prices updated successfully (1 of 2 symbols)");

    assert_eq!(lp.retry_delay(), &backing_off);
}
