//! Read models for display: tracked stocks, market indexes and news by symbol.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use market_data_ingestor::models::news::NewsArticle;
use serde::Serialize;

use crate::{
    pricing::PriceFields,
    source::{QuoteSource, SnapshotBatch},
    tracked::{TrackedSymbol, TrackedSymbolStore},
    tz,
};

/// Index ETFs shown on the dashboard, with their display names.
pub const MARKET_INDEXES: [(&str, &str); 4] = [
    ("SPY", "S&P 500"),
    ("DIA", "Dow Jones"),
    ("QQQ", "NASDAQ"),
    ("IWM", "Russell 2000"),
];

/// Index symbols whose news is shown next to tracked stocks.
pub const NEWS_INDEXES: [&str; 3] = ["SPY", "DIA", "QQQ"];

/// One row of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockView {
    /// Ticker.
    pub symbol: String,
    /// Display name, if known.
    pub name: Option<String>,
    /// Last known price.
    pub current_price: Option<f64>,
    /// Previous close.
    pub previous_close: Option<f64>,
    /// Absolute change.
    pub price_change: Option<f64>,
    /// Percent change.
    pub price_change_percent: Option<f64>,
    /// Last refresh in New York time.
    pub last_updated: Option<String>,
    /// "Just now", "5 minutes ago" or "Never".
    pub friendly_time: String,
    /// Whether current news mentions this symbol.
    pub has_news: bool,
}

/// A market index tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexView {
    /// ETF ticker.
    pub symbol: String,
    /// Index name.
    pub name: String,
    /// Price and derived change.
    pub current_price: f64,
    /// Previous close.
    pub previous_close: f64,
    /// Absolute change.
    pub price_change: f64,
    /// Percent change.
    pub price_change_percent: f64,
    /// Observation time in New York time.
    pub last_updated: String,
    /// Age label.
    pub friendly_time: String,
    /// Whether current news mentions this index.
    pub has_news: bool,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Tracked stocks.
    pub stocks: Vec<StockView>,
    /// Index tiles that had data.
    pub indexes: Vec<IndexView>,
}

fn symbols_with_news(articles: &[NewsArticle]) -> HashSet<&str> {
    articles
        .iter()
        .flat_map(|a| a.symbols.iter().map(String::as_str))
        .collect()
}

/// Builds stock rows from tracked symbols and current news.
pub fn stock_views(
    tracked: &[TrackedSymbol],
    news: &[NewsArticle],
    now: DateTime<Utc>,
) -> Vec<StockView> {
    let with_news = symbols_with_news(news);
    tracked
        .iter()
        .map(|t| {
            let p = t.prices;
            StockView {
                symbol: t.symbol.clone(),
                name: t.name.clone(),
                current_price: p.map(|p| p.price),
                previous_close: p.map(|p| p.previous_close),
                price_change: p.map(|p| p.change),
                price_change_percent: p.map(|p| p.change_percent),
                last_updated: t.last_updated.map(tz::format_market_time),
                friendly_time: t
                    .last_updated
                    .map_or_else(|| "Never".to_string(), |ts| tz::friendly_age(ts, now)),
                has_news: with_news.contains(t.symbol.as_str()),
            }
        })
        .collect()
}

/// Builds index tiles from a snapshot batch, computing the change on the fly.
///
/// Indexes without a usable snapshot are left out.
pub fn index_views(
    batch: &SnapshotBatch,
    news: &[NewsArticle],
    now: DateTime<Utc>,
) -> Vec<IndexView> {
    let with_news = symbols_with_news(news);
    MARKET_INDEXES
        .iter()
        .filter_map(|&(symbol, name)| {
            let snap = batch.get(symbol)?;
            let prices = PriceFields::from_snapshot(snap)?;
            Some(IndexView {
                symbol: symbol.to_string(),
                name: name.to_string(),
                current_price: prices.price,
                previous_close: prices.previous_close,
                price_change: prices.change,
                price_change_percent: prices.change_percent,
                last_updated: tz::format_market_time(snap.observed_at),
                friendly_time: tz::friendly_age(snap.observed_at, now),
                has_news: with_news.contains(symbol),
            })
        })
        .collect()
}

/// Groups articles under each requested symbol they mention, in request order.
///
/// Symbols without articles are omitted; an article tagged with two requested
/// symbols appears under both.
pub fn group_news(
    articles: &[NewsArticle],
    symbols: &[String],
) -> IndexMap<String, Vec<NewsArticle>> {
    let mut grouped: IndexMap<String, Vec<NewsArticle>> = IndexMap::new();
    for symbol in symbols {
        let matching: Vec<NewsArticle> = articles
            .iter()
            .filter(|a| a.mentions(symbol))
            .cloned()
            .collect();
        if !matching.is_empty() {
            grouped.insert(symbol.clone(), matching);
        }
    }
    grouped
}

fn index_symbols() -> Vec<String> {
    MARKET_INDEXES.iter().map(|(s, _)| s.to_string()).collect()
}

/// Loads tracked stocks, index tiles and news flags.
pub async fn dashboard(
    store: &dyn TrackedSymbolStore,
    source: &QuoteSource,
    now: DateTime<Utc>,
) -> anyhow::Result<Dashboard> {
    let tracked = store.list_tracked().await?;
    let active = source.current();

    let indexes = index_symbols();
    let index_batch = active.snapshots(&indexes).await;

    let mut news_symbols: Vec<String> = tracked.iter().map(|t| t.symbol.clone()).collect();
    news_symbols.extend(indexes);
    let news = active.news(&news_symbols).await;

    Ok(Dashboard {
        stocks: stock_views(&tracked, &news, now),
        indexes: index_views(&index_batch, &news, now),
    })
}

/// News for tracked symbols plus the headline indexes, grouped by symbol.
pub async fn news_by_symbol(
    store: &dyn TrackedSymbolStore,
    source: &QuoteSource,
) -> anyhow::Result<IndexMap<String, Vec<NewsArticle>>> {
    let mut symbols: Vec<String> = store
        .list_tracked()
        .await?
        .into_iter()
        .map(|t| t.symbol)
        .collect();
    for index in NEWS_INDEXES {
        if !symbols.iter().any(|s| s == index) {
            symbols.push(index.to_string());
        }
    }

    let articles = source.news(&symbols).await;
    Ok(group_news(&articles, &symbols))
}
