//! In-memory price generator used when no live vendor is configured.
//!
//! Every known symbol carries a fixed base (anchor) price and a current price.
//! Each snapshot request moves the current price by a random step of at most
//! 2% plus a pull of 10% of the distance back toward the base, then clamps the
//! result to `[0.8 × base, 1.2 × base]`. The price before the step is reported
//! as the previous close.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    models::{
        asset::{Asset, AssetClass},
        news::NewsArticle,
        snapshot::PriceSnapshot,
    },
    providers::{ProviderError, QuoteProvider},
};

/// Largest random move per step, as a fraction of the current price.
pub const MAX_STEP_FRACTION: f64 = 0.02;
/// Share of the distance to the base price recovered per step.
pub const REVERSION_FACTOR: f64 = 0.1;
/// Lower clamp, as a fraction of the base price.
pub const LOWER_BOUND_FACTOR: f64 = 0.8;
/// Upper clamp, as a fraction of the base price.
pub const UPPER_BOUND_FACTOR: f64 = 1.2;
/// Chance that a known symbol gets an article on a news request.
pub const NEWS_PROBABILITY: f64 = 0.3;

const UNIVERSE: &[(&str, &str, f64)] = &[
    ("AAPL", "Apple Inc.", 175.0),
    ("GOOGL", "Alphabet Inc.", 140.0),
    ("MSFT", "Microsoft Corporation", 400.0),
    ("AMZN", "Amazon.com Inc.", 175.0),
    ("META", "Meta Platforms Inc.", 485.0),
    ("SPY", "SPDR S&P 500 ETF Trust", 510.0),
    ("DIA", "SPDR Dow Jones Industrial Average ETF", 385.0),
    ("QQQ", "Invesco QQQ Trust", 430.0),
];

const HEADLINES: &[&str] = &[
    "Company Reports Strong Quarterly Results",
    "Analysts Upgrade Stock Rating",
    "New Product Launch Announced",
    "Strategic Partnership Formed",
    "Market Share Increases",
    "Innovation Award Received",
    "Expansion Plans Revealed",
    "Industry Recognition Achievement",
];

#[derive(Debug, Clone)]
struct SimulatedAsset {
    name: &'static str,
    base: f64,
    current: f64,
}

struct SimState {
    assets: IndexMap<String, SimulatedAsset>,
    rng: StdRng,
}

/// Next simulated price.
///
/// `draw` is a uniform sample in `[-1, 1]` scaling the random part of the move.
/// The result is rounded to cents and clamped to the band around `base`.
pub fn step_price(current: f64, base: f64, draw: f64) -> f64 {
    let movement = draw * MAX_STEP_FRACTION * current + (base - current) * REVERSION_FACTOR;
    let rounded = ((current + movement) * 100.0).round() / 100.0;
    rounded.clamp(base * LOWER_BOUND_FACTOR, base * UPPER_BOUND_FACTOR)
}

/// Randomized provider over a fixed universe of eight tickers.
pub struct SimulatedProvider {
    state: Mutex<SimState>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    /// Provider seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Provider with a reproducible draw sequence.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let assets = UNIVERSE
            .iter()
            .map(|&(symbol, name, base)| {
                let asset = SimulatedAsset {
                    name,
                    base,
                    current: base,
                };
                (symbol.to_string(), asset)
            })
            .collect();
        Self {
            state: Mutex::new(SimState { assets, rng }),
        }
    }

    /// Symbols the simulator knows about, in universe order.
    pub fn symbols(&self) -> Vec<String> {
        self.lock().assets.keys().cloned().collect()
    }

    /// Anchor price of `symbol`, `None` if unknown.
    pub fn base_price(&self, symbol: &str) -> Option<f64> {
        self.lock().assets.get(symbol).map(|a| a.base)
    }

    /// Current price of `symbol`, `None` if unknown.
    pub fn current_price(&self, symbol: &str) -> Option<f64> {
        self.lock().assets.get(symbol).map(|a| a.current)
    }

    /// Continues the walk from previously observed prices.
    ///
    /// Each known symbol in `last_prices` becomes the current price, clamped to the
    /// band around its base. Unknown symbols and prices that are not positive and
    /// finite are ignored. Returns how many symbols were picked up.
    pub fn resume(&self, last_prices: &IndexMap<String, f64>) -> usize {
        let mut state = self.lock();
        let mut adopted = 0;
        for (symbol, &price) in last_prices {
            let Some(asset) = state.assets.get_mut(symbol) else {
                continue;
            };
            if !price.is_finite() || price <= 0.0 {
                continue;
            }
            asset.current = price.clamp(
                asset.base * LOWER_BOUND_FACTOR,
                asset.base * UPPER_BOUND_FACTOR,
            );
            adopted += 1;
        }
        adopted
    }

    /// Advances every requested known symbol by one step and returns the snapshots.
    ///
    /// Unknown symbols are left out.
    pub fn tick(&self, symbols: &[String]) -> IndexMap<String, PriceSnapshot> {
        let mut state = self.lock();
        let SimState { assets, rng } = &mut *state;
        let now = Utc::now();

        let mut out = IndexMap::new();
        for symbol in symbols {
            let Some(asset) = assets.get_mut(symbol) else {
                continue;
            };
            let previous = asset.current;
            let draw: f64 = rng.random_range(-1.0..=1.0);
            asset.current = step_price(previous, asset.base, draw);

            out.insert(
                symbol.clone(),
                PriceSnapshot {
                    symbol: symbol.clone(),
                    price: asset.current,
                    previous_close: previous,
                    name: asset.name.to_string(),
                    observed_at: now,
                },
            );
        }
        out
    }

    /// Rolls for one synthetic article per requested known symbol.
    pub fn generate_news(&self, symbols: &[String]) -> Vec<NewsArticle> {
        let mut state = self.lock();
        let SimState { assets, rng } = &mut *state;
        let now = Utc::now();

        let mut articles = Vec::new();
        for symbol in symbols {
            let Some(asset) = assets.get(symbol) else {
                continue;
            };
            if !rng.random_bool(NEWS_PROBABILITY) {
                continue;
            }
            let Some(headline) = HEADLINES.choose(rng) else {
                continue;
            };
            articles.push(NewsArticle {
                headline: format!("{} {}", asset.name, headline),
                summary: format!(
                    "Latest updates about {} and its market performance.",
                    asset.name
                ),
                author: "Market Analyst".to_string(),
                url: format!("http://example.com/news/{}", symbol.to_lowercase()),
                updated_at: now,
                symbols: vec![symbol.clone()],
            });
        }
        articles
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl QuoteProvider for SimulatedProvider {
    async fn fetch_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<IndexMap<String, PriceSnapshot>, ProviderError> {
        Ok(self.tick(symbols))
    }

    async fn fetch_news(&self, symbols: &[String]) -> Result<Vec<NewsArticle>, ProviderError> {
        Ok(self.generate_news(symbols))
    }

    async fn fetch_assets(&self) -> Result<IndexMap<String, Asset>, ProviderError> {
        Ok(self
            .lock()
            .assets
            .iter()
            .map(|(symbol, a)| {
                let asset = Asset {
                    symbol: symbol.clone(),
                    name: a.name.to_string(),
                    class: AssetClass::UsEquity,
                    tradable: true,
                };
                (symbol.clone(), asset)
            })
            .collect())
    }
}
