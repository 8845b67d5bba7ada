//! Quote source facade: one interface over the live Alpaca provider and the simulator.
//!
//! The active provider is kept behind an [`ArcSwap`], so readers take a cheap
//! snapshot ([`QuoteSource::current`]) and keep using it for a whole refresh cycle
//! even if [`QuoteSource::reconfigure`] swaps in a new provider meanwhile.
//!
//! Provider failures never leave this module as errors. [`ActiveSource::snapshots`]
//! returns a [`SnapshotBatch`] whose `fault` is set when the provider call failed;
//! display paths ignore it and the refresh loop turns it into backoff.

use std::{fmt, str::FromStr, sync::Arc};

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use market_data_ingestor::{
    models::{news::NewsArticle, snapshot::PriceSnapshot},
    providers::{
        QuoteProvider,
        alpaca_rest::{AlpacaConfig, AlpacaProvider},
        simulated::SimulatedProvider,
    },
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::credentials::Credentials;

/// Which provider backs the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceMode {
    /// In-memory random walk.
    Simulated,
    /// Alpaca REST APIs.
    Live,
}

impl SourceMode {
    /// Stable lowercase name, also the stored form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Simulated => "simulated",
            SourceMode::Live => "live",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceMode {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "simulation" => Ok(SourceMode::Simulated),
            "live" => Ok(SourceMode::Live),
            other => Err(SourceError::UnknownMode(other.to_string())),
        }
    }
}

/// Facade errors. Only construction and mode switches can fail.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The provider for the requested mode cannot be built (missing or malformed credentials).
    #[error("configuration error: {message}")]
    Configuration {
        /// Why the provider could not be built.
        message: String,
    },
    /// A mode name that is neither `simulated` nor `live`.
    #[error("unknown source mode: {0}")]
    UnknownMode(String),
}

/// Result of one batched snapshot request.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBatch {
    /// Usable snapshots keyed by symbol. Symbols without data are absent.
    pub snapshots: IndexMap<String, PriceSnapshot>,
    /// Set when the provider call failed; `snapshots` is then empty.
    pub fault: Option<String>,
}

impl SnapshotBatch {
    /// `true` if the provider call failed.
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Snapshot for `symbol`, if any.
    pub fn get(&self, symbol: &str) -> Option<&PriceSnapshot> {
        self.snapshots.get(symbol)
    }
}

/// The provider in use together with its mode.
pub struct ActiveSource {
    mode: SourceMode,
    provider: Arc<dyn QuoteProvider>,
}

impl ActiveSource {
    /// Mode of this provider.
    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Fetches snapshots for `symbols` in one call.
    ///
    /// Snapshots whose percent change would be undefined (non-finite values or a
    /// previous close that is not positive) are dropped like missing symbols.
    pub async fn snapshots(&self, symbols: &[String]) -> SnapshotBatch {
        if symbols.is_empty() {
            return SnapshotBatch::default();
        }

        match self.provider.fetch_snapshots(symbols).await {
            Ok(map) => {
                let snapshots = map
                    .into_iter()
                    .filter(|(symbol, snap)| {
                        let sane = snap.is_sane();
                        if !sane {
                            debug!(%symbol, price = snap.price, previous_close = snap.previous_close, "dropping unusable snapshot");
                        }
                        sane
                    })
                    .collect();
                SnapshotBatch {
                    snapshots,
                    fault: None,
                }
            }
            Err(e) => {
                warn!(mode = %self.mode, error = %e, "snapshot fetch failed");
                SnapshotBatch {
                    snapshots: IndexMap::new(),
                    fault: Some(e.to_string()),
                }
            }
        }
    }

    /// News for `symbols`; empty on failure.
    pub async fn news(&self, symbols: &[String]) -> Vec<NewsArticle> {
        if symbols.is_empty() {
            return vec![];
        }

        match self.provider.fetch_news(symbols).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!(mode = %self.mode, error = %e, "news fetch failed");
                vec![]
            }
        }
    }
}

/// Mode-switchable facade.
pub struct QuoteSource {
    active: ArcSwap<ActiveSource>,
    alpaca: AlpacaConfig,
}

impl QuoteSource {
    /// Builds the facade in `mode`. Live mode needs `credentials`.
    pub fn new(
        mode: SourceMode,
        credentials: Option<&Credentials>,
        alpaca: AlpacaConfig,
    ) -> Result<Self, SourceError> {
        Self::resumed(mode, credentials, alpaca, &IndexMap::new())
    }

    /// Like [`QuoteSource::new`], but a simulator continues from `last_prices`
    /// instead of starting at its base prices. Ignored in live mode.
    pub fn resumed(
        mode: SourceMode,
        credentials: Option<&Credentials>,
        alpaca: AlpacaConfig,
        last_prices: &IndexMap<String, f64>,
    ) -> Result<Self, SourceError> {
        let provider = build_provider(mode, credentials, &alpaca, last_prices)?;
        info!(%mode, "quote source ready");
        Ok(Self {
            active: ArcSwap::from_pointee(ActiveSource { mode, provider }),
            alpaca,
        })
    }

    /// Simulated facade with default Alpaca settings for later switches.
    pub fn simulated() -> Self {
        Self::with_provider(SourceMode::Simulated, Arc::new(SimulatedProvider::new()))
    }

    /// Facade around an already built provider.
    pub fn with_provider(mode: SourceMode, provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            active: ArcSwap::from_pointee(ActiveSource { mode, provider }),
            alpaca: AlpacaConfig::default(),
        }
    }

    /// Current mode.
    pub fn mode(&self) -> SourceMode {
        self.active.load().mode
    }

    /// The provider in use right now. Later mode switches do not affect the returned handle.
    pub fn current(&self) -> Arc<ActiveSource> {
        self.active.load_full()
    }

    /// Discards the current provider and builds a fresh one for `mode`.
    ///
    /// On error nothing changes.
    pub fn reconfigure(
        &self,
        mode: SourceMode,
        credentials: Option<&Credentials>,
    ) -> Result<(), SourceError> {
        self.reconfigure_resumed(mode, credentials, &IndexMap::new())
    }

    /// [`QuoteSource::reconfigure`] where a new simulator continues from `last_prices`.
    pub fn reconfigure_resumed(
        &self,
        mode: SourceMode,
        credentials: Option<&Credentials>,
        last_prices: &IndexMap<String, f64>,
    ) -> Result<(), SourceError> {
        let provider = build_provider(mode, credentials, &self.alpaca, last_prices)?;
        let previous = self.mode();
        self.active
            .store(Arc::new(ActiveSource { mode, provider }));
        info!(from = %previous, to = %mode, "quote source reconfigured");
        Ok(())
    }

    /// See [`ActiveSource::snapshots`].
    pub async fn snapshots(&self, symbols: &[String]) -> SnapshotBatch {
        self.current().snapshots(symbols).await
    }

    /// See [`ActiveSource::news`].
    pub async fn news(&self, symbols: &[String]) -> Vec<NewsArticle> {
        self.current().news(symbols).await
    }
}

fn build_provider(
    mode: SourceMode,
    credentials: Option<&Credentials>,
    alpaca: &AlpacaConfig,
    last_prices: &IndexMap<String, f64>,
) -> Result<Arc<dyn QuoteProvider>, SourceError> {
    match mode {
        SourceMode::Simulated => {
            let simulator = SimulatedProvider::new();
            let adopted = simulator.resume(last_prices);
            if adopted > 0 {
                debug!(adopted, "simulation continues from stored prices");
            }
            Ok(Arc::new(simulator))
        }
        SourceMode::Live => {
            let creds = credentials.ok_or_else(|| SourceError::Configuration {
                message: "live mode requires an API key and a secret key".into(),
            })?;
            let provider = AlpacaProvider::with_config(
                SecretString::new(creds.api_key().expose_secret().into()),
                SecretString::new(creds.secret_key().expose_secret().into()),
                alpaca.clone(),
            )
            .map_err(|e| SourceError::Configuration {
                message: e.to_string(),
            })?;
            Ok(Arc::new(provider))
        }
    }
}
