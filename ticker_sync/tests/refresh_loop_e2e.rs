use std::{sync::Arc, time::Duration};

use httpmock::prelude::*;
use market_data_ingestor::providers::{alpaca_rest::AlpacaConfig, simulated::SimulatedProvider};
use serde_json::json;
use ticker_sync::credentials::Credentials;
use ticker_sync::refresh::{
    Refresher,
    scheduler::{Intervals, RefreshLoop},
};
use ticker_sync::source::{QuoteSource, SourceMode};
use ticker_sync::tracked::{TrackedSymbolStore, last_known_prices};

mod common;
use common::syms;

const INTERVALS: Intervals = Intervals {
    live: Duration::from_secs(300),
    simulated: Duration::from_secs(30),
};
const CEILING: Duration = Duration::from_secs(900);

fn alpaca_for(server: &MockServer) -> AlpacaConfig {
    AlpacaConfig {
        data_url: server.base_url(),
        trading_url: server.base_url(),
        timeout: Duration::from_secs(2),
        ..AlpacaConfig::default()
    }
}

fn mock_empty_market(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/v2/assets");
        then.status(200).json_body(json!([
            { "symbol": "AAPL", "name": "Apple Inc. Common Stock", "class": "us_equity", "tradable": true }
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v2/stocks/bars");
        then.status(200)
            .json_body(json!({ "bars": null, "next_page_token": null }));
    })
}

#[tokio::test]
async fn simulated_loop_keeps_prices_in_band_and_timestamps_moving() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL", "GOOGL"])).await.unwrap();
    let store: Arc<dyn TrackedSymbolStore> = Arc::new(store);

    let sim = Arc::new(SimulatedProvider::seeded(42));
    let source = Arc::new(QuoteSource::with_provider(SourceMode::Simulated, sim.clone()));
    let mut lp = RefreshLoop::new(Refresher::new(store.clone(), source), INTERVALS, CEILING, None);

    let mut previous: Vec<chrono::DateTime<chrono::Utc>> = Vec::new();
    for round in 0..3 {
        assert_eq!(lp.tick().await, Duration::from_secs(30));

        let rows = store.list_tracked().await.unwrap();
        assert_eq!(rows.len(), 2);
        let stamps: Vec<_> = rows.iter().map(|r| r.last_updated.expect("stamped")).collect();
        for (i, (row, stamp)) in rows.iter().zip(&stamps).enumerate() {
            let p = row.prices.expect("priced");
            let base = sim.base_price(&row.symbol).unwrap();
            assert!(p.price >= base * 0.8 - 1e-9 && p.price <= base * 1.2 + 1e-9, "{p:?}");
            assert!((p.change - (p.price - p.previous_close)).abs() < 1e-9);
            assert!(row.name.is_some());
            if let Some(prev) = previous.get(i) {
                assert!(stamp > prev, "round {round}: {stamp} <= {prev}");
            }
        }
        previous = stamps;

        if round == 1 {
            let before = *lp.retry_delay();
            assert!(lp.refresher().manual_refresh().await.success);
            assert_eq!(*lp.retry_delay(), before);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn manual_refresh_from_a_new_source_continues_the_walk() {
    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL", "MSFT"])).await.unwrap();
    let store: Arc<dyn TrackedSymbolStore> = Arc::new(store);

    let source = Arc::new(QuoteSource::with_provider(
        SourceMode::Simulated,
        Arc::new(SimulatedProvider::seeded(9)),
    ));
    let mut lp = RefreshLoop::new(Refresher::new(store.clone(), source), INTERVALS, CEILING, None);
    for _ in 0..20 {
        lp.tick().await;
    }
    let last = last_known_prices(store.as_ref()).await.unwrap();
    assert_eq!(last.len(), 2);

    let fresh = QuoteSource::resumed(SourceMode::Simulated, None, AlpacaConfig::default(), &last)
        .unwrap();
    let outcome = Refresher::new(store.clone(), Arc::new(fresh)).manual_refresh().await;
    assert!(outcome.success, "{}", outcome.message);

    for row in store.list_tracked().await.unwrap() {
        let p = row.prices.expect("priced");
        assert_eq!(p.previous_close, last[&row.symbol], "{}", row.symbol);
        assert!((p.price - p.previous_close).abs() <= p.previous_close * 0.05, "{p:?}");
    }
}

#[tokio::test]
async fn switching_back_to_simulated_resumes_stored_prices() {
    let server = MockServer::start();
    let _bars = mock_empty_market(&server);

    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();
    store
        .save_credentials(&Credentials::new("PKTESTKEY1234", "test-secret"))
        .await
        .unwrap();
    let store: Arc<dyn TrackedSymbolStore> = Arc::new(store);

    let source = Arc::new(QuoteSource::with_provider(
        SourceMode::Simulated,
        Arc::new(SimulatedProvider::seeded(5)),
    ));
    let mut lp = RefreshLoop::new(
        Refresher::new(store.clone(), source.clone()),
        INTERVALS,
        CEILING,
        None,
    );
    for _ in 0..10 {
        lp.tick().await;
    }

    store.set_desired_mode(SourceMode::Live).await.unwrap();
    assert_eq!(lp.tick().await, Duration::from_secs(300));
    assert_eq!(source.mode(), SourceMode::Live);
    let before = last_known_prices(store.as_ref()).await.unwrap()["AAPL"];

    store.set_desired_mode(SourceMode::Simulated).await.unwrap();
    assert_eq!(lp.tick().await, Duration::from_secs(30));
    assert_eq!(source.mode(), SourceMode::Simulated);

    let row = &store.list_tracked().await.unwrap()[0];
    assert_eq!(row.prices.expect("priced").previous_close, before);
}

#[tokio::test]
async fn live_loop_with_no_bars_succeeds_without_writes() {
    let server = MockServer::start();
    let bars = mock_empty_market(&server);

    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();
    let store: Arc<dyn TrackedSymbolStore> = Arc::new(store);

    let creds = Credentials::new("PKTESTKEY1234", "test-secret");
    let source = QuoteSource::new(SourceMode::Live, Some(&creds), alpaca_for(&server)).unwrap();
    let mut lp = RefreshLoop::new(
        Refresher::new(store.clone(), Arc::new(source)),
        INTERVALS,
        CEILING,
        None,
    );

    assert_eq!(lp.tick().await, Duration::from_secs(300));
    assert!(!lp.retry_delay().is_backing_off());
    bars.assert_calls(1);

    let row = &store.list_tracked().await.unwrap()[0];
    assert_eq!(row.prices, None);
    assert_eq!(row.last_updated, None);
}

#[tokio::test]
async fn live_api_errors_back_off() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v2/stocks/bars");
        then.status(500).body("internal error");
    });

    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();

    let creds = Credentials::new("PKTESTKEY1234", "test-secret");
    let source = QuoteSource::new(SourceMode::Live, Some(&creds), alpaca_for(&server)).unwrap();
    let mut lp = RefreshLoop::new(
        Refresher::new(Arc::new(store), Arc::new(source)),
        INTERVALS,
        CEILING,
        None,
    );

    assert_eq!(lp.tick().await, Duration::from_secs(600));
}

#[tokio::test]
async fn requested_mode_is_applied_only_when_possible() {
    let server = MockServer::start();
    let bars = mock_empty_market(&server);

    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();
    let store: Arc<dyn TrackedSymbolStore> = Arc::new(store);

    let source = Arc::new(
        QuoteSource::new(SourceMode::Simulated, None, alpaca_for(&server)).unwrap(),
    );
    let mut lp = RefreshLoop::new(
        Refresher::new(store.clone(), source.clone()),
        INTERVALS,
        CEILING,
        None,
    );

    // no credentials anywhere: stay simulated
    store.set_desired_mode(SourceMode::Live).await.unwrap();
    assert_eq!(lp.tick().await, Duration::from_secs(30));
    assert_eq!(source.mode(), SourceMode::Simulated);
    bars.assert_calls(0);

    store
        .save_credentials(&Credentials::new("PKTESTKEY1234", "test-secret"))
        .await
        .unwrap();
    assert_eq!(lp.tick().await, Duration::from_secs(300));
    assert_eq!(source.mode(), SourceMode::Live);
    bars.assert_calls(1);

    store.set_desired_mode(SourceMode::Simulated).await.unwrap();
    assert_eq!(lp.tick().await, Duration::from_secs(30));
    assert_eq!(source.mode(), SourceMode::Simulated);
}

#[tokio::test]
async fn environment_credentials_take_precedence() {
    let server = MockServer::start();
    let env_bars = server.mock(|when, then| {
        when.method(GET)
            .path("/v2/stocks/bars")
            .header("APCA-API-KEY-ID", "PKFROMENV0001");
        then.status(200)
            .json_body(json!({ "bars": null, "next_page_token": null }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v2/assets");
        then.status(200).json_body(json!([]));
    });

    let (_db, store) = common::setup_store();
    store.seed_symbols(&syms(&["AAPL"])).await.unwrap();
    store
        .save_credentials(&Credentials::new("PKSTORED00001", "stored-secret"))
        .await
        .unwrap();
    store.set_desired_mode(SourceMode::Live).await.unwrap();
    let store: Arc<dyn TrackedSymbolStore> = Arc::new(store);

    let source = Arc::new(
        QuoteSource::new(SourceMode::Simulated, None, alpaca_for(&server)).unwrap(),
    );
    let mut lp = RefreshLoop::new(
        Refresher::new(store, source.clone()),
        INTERVALS,
        CEILING,
        Some(Credentials::new("PKFROMENV0001", "env-secret")),
    );

    assert_eq!(lp.tick().await, Duration::from_secs(300));
    assert_eq!(source.mode(), SourceMode::Live);
    env_bars.assert_calls(1);
}
