use std::{
    num::NonZeroU32,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indexmap::IndexMap;
use nonzero_ext::nonzero;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use snafu::ensure;
use tracing::{debug, warn};

use crate::{
    models::{
        asset::Asset,
        bar::{Bar, BarSeries},
        news::NewsArticle,
        request_params::{BarsRequestParams, ProviderParams},
        snapshot::PriceSnapshot,
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{
        ApiSnafu, DataProvider, MissingCredentialSnafu, ProviderError, ProviderInitError,
        QuoteProvider,
        alpaca_rest::{
            params::{AlpacaBarsParams, Adjustment, Feed, Sort, construct_params, validate_timeframe},
            response::{AlpacaAccount, AlpacaAsset, AlpacaBar, AlpacaBarsResponse, AlpacaNewsResponse},
        },
    },
};

const DATA_BASE_URL: &str = "https://data.alpaca.markets";
const PAPER_TRADING_BASE_URL: &str = "https://paper-api.alpaca.markets";

/// Endpoints and client limits for [`AlpacaProvider`].
#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    /// Market data host (bars, news).
    pub data_url: String,
    /// Trading host (assets, account). Defaults to the paper environment.
    pub trading_url: String,
    /// Per-request timeout; a hung call surfaces as a request error.
    pub timeout: Duration,
    /// Client-side request budget.
    pub requests_per_minute: NonZeroU32,
    /// How far back to look for daily bars when building snapshots.
    pub lookback: chrono::Duration,
    /// Bars feed; `None` lets the API pick based on the subscription.
    pub feed: Option<Feed>,
    /// Maximum number of articles per news request.
    pub news_limit: u32,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            data_url: DATA_BASE_URL.to_string(),
            trading_url: PAPER_TRADING_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            requests_per_minute: nonzero!(200u32),
            lookback: chrono::Duration::days(2),
            feed: None,
            news_limit: 50,
        }
    }
}

pub struct AlpacaProvider {
    client: Client,
    config: AlpacaConfig,
    limiter: DefaultDirectRateLimiter,
    // Display names from the asset list, refilled when a symbol is missing.
    asset_names: Mutex<IndexMap<String, String>>,
    _api_key: SecretString,
    _secret_key: SecretString,
}

impl AlpacaProvider {
    /// Creates a new Alpaca provider from an explicit key pair with default endpoints.
    pub fn new(api_key: SecretString, secret_key: SecretString) -> Result<Self, ProviderInitError> {
        Self::with_config(api_key, secret_key, AlpacaConfig::default())
    }

    /// Creates a provider with explicit endpoints and limits.
    ///
    /// Both credentials must be non-empty.
    pub fn with_config(
        api_key: SecretString,
        secret_key: SecretString,
        config: AlpacaConfig,
    ) -> Result<Self, ProviderInitError> {
        ensure!(
            !api_key.expose_secret().trim().is_empty(),
            MissingCredentialSnafu { name: "api key" }
        );
        ensure!(
            !secret_key.expose_secret().trim().is_empty(),
            MissingCredentialSnafu { name: "secret key" }
        );

        let mut headers = header::HeaderMap::new();
        let mut key_value = header::HeaderValue::from_str(api_key.expose_secret())?;
        key_value.set_sensitive(true);
        let mut secret_value = header::HeaderValue::from_str(secret_key.expose_secret())?;
        secret_value.set_sensitive(true);
        headers.insert("APCA-API-KEY-ID", key_value);
        headers.insert("APCA-API-SECRET-KEY", secret_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let limiter = RateLimiter::direct(Quota::per_minute(config.requests_per_minute));

        Ok(Self {
            client,
            config,
            limiter,
            asset_names: Mutex::new(IndexMap::new()),
            _api_key: api_key,
            _secret_key: secret_key,
        })
    }

    /// Fetches the brokerage account, which fails unless the key pair is valid.
    pub async fn account(&self) -> Result<AlpacaAccount, ProviderError> {
        let url = format!("{}/v2/account", self.config.trading_url);
        self.get_json(&url, &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ProviderError> {
        self.limiter.until_ready().await;

        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu {
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        Ok(response.json::<T>().await?)
    }

    /// Names for `symbols`, from the asset list fetched at most once per call.
    ///
    /// The list is fetched again only when a symbol is missing from the cache. `Err`
    /// carries whatever the cache had when that fetch failed.
    async fn names_for(
        &self,
        symbols: &[String],
    ) -> Result<IndexMap<String, String>, IndexMap<String, String>> {
        let cached = self.cached_names(symbols);
        if cached.len() == symbols.len() {
            return Ok(cached);
        }

        match self.fetch_assets().await {
            Ok(assets) => {
                let fresh: IndexMap<String, String> =
                    assets.into_iter().map(|(symbol, a)| (symbol, a.name)).collect();
                debug!(count = fresh.len(), "asset names refreshed");
                *self.asset_names.lock().unwrap_or_else(PoisonError::into_inner) = fresh;
                Ok(self.cached_names(symbols))
            }
            Err(e) => {
                warn!(error = %e, "asset list unavailable, names may be missing");
                Err(cached)
            }
        }
    }

    fn cached_names(&self, symbols: &[String]) -> IndexMap<String, String> {
        let names = self.asset_names.lock().unwrap_or_else(PoisonError::into_inner);
        symbols
            .iter()
            .filter_map(|s| names.get(s).map(|n| (s.clone(), n.clone())))
            .collect()
    }

    fn daily_bars_request(&self, symbols: &[String]) -> BarsRequestParams {
        let end = Utc::now();
        BarsRequestParams {
            symbols: symbols.to_vec(),
            timeframe: TimeFrame::new(1, TimeFrameUnit::Day),
            start: end - self.config.lookback,
            end,
            provider_specific: ProviderParams::Alpaca(AlpacaBarsParams {
                adjustment: Some(Adjustment::All),
                feed: self.config.feed.clone(),
                sort: Some(Sort::Asc),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl DataProvider for AlpacaProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        // Validate the timeframe before proceeding.
        validate_timeframe(&params.timeframe)?;

        let url = format!("{}/v2/stocks/bars", self.config.data_url);
        let mut all_bars: IndexMap<String, Vec<AlpacaBar>> = IndexMap::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut query_params = construct_params(&params);
            if let Some(token) = &next_page_token {
                query_params.push(("page_token".to_string(), token.clone()));
            }

            let page: AlpacaBarsResponse = self.get_json(&url, &query_params).await?;

            // Merge the bars from the current page into our collection.
            for (symbol, bars) in page.bars.unwrap_or_default() {
                all_bars.entry(symbol).or_default().extend(bars);
            }

            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        let result = all_bars
            .into_iter()
            .map(|(symbol, alpaca_bars)| {
                let bars = alpaca_bars
                    .into_iter()
                    .map(|ab| Bar {
                        timestamp: ab.timestamp,
                        open: ab.open,
                        high: ab.high,
                        low: ab.low,
                        close: ab.close,
                        volume: ab.volume,
                        trade_count: ab.trade_count,
                        vwap: ab.vwap,
                    })
                    .collect();

                BarSeries {
                    symbol,
                    timeframe: params.timeframe.clone(),
                    bars,
                }
            })
            .collect();

        Ok(result)
    }
}

#[async_trait]
impl QuoteProvider for AlpacaProvider {
    async fn fetch_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<IndexMap<String, PriceSnapshot>, ProviderError> {
        if symbols.is_empty() {
            return Ok(IndexMap::new());
        }

        let series = self.fetch_bars(self.daily_bars_request(symbols)).await?;
        let mut by_symbol: IndexMap<String, BarSeries> =
            series.into_iter().map(|s| (s.symbol.clone(), s)).collect();

        let with_bars: Vec<String> = symbols
            .iter()
            .filter(|s| by_symbol.contains_key(s.as_str()))
            .cloned()
            .collect();
        if with_bars.is_empty() {
            return Ok(IndexMap::new());
        }
        let names = self.names_for(&with_bars).await;

        let mut out = IndexMap::new();
        for symbol in &with_bars {
            let name = match &names {
                // Symbols the broker does not list as assets are skipped, like missing bars.
                Ok(listed) => match listed.get(symbol) {
                    Some(name) => name.as_str(),
                    None => {
                        debug!(%symbol, "no asset metadata");
                        continue;
                    }
                },
                // Without the asset list, keep the price and leave the name blank.
                Err(cached) => cached.get(symbol).map_or("", String::as_str),
            };
            let Some(series) = by_symbol.swap_remove(symbol) else {
                continue;
            };
            if let Some(snapshot) = PriceSnapshot::from_series(&series, name) {
                out.insert(symbol.clone(), snapshot);
            }
        }
        Ok(out)
    }

    async fn fetch_news(&self, symbols: &[String]) -> Result<Vec<NewsArticle>, ProviderError> {
        if symbols.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/v1beta1/news", self.config.data_url);
        let query = vec![
            ("symbols".to_string(), symbols.join(",")),
            ("limit".to_string(), self.config.news_limit.to_string()),
        ];
        let page: AlpacaNewsResponse = self.get_json(&url, &query).await?;

        Ok(page
            .news
            .into_iter()
            .map(|n| NewsArticle {
                headline: n.headline,
                summary: n.summary,
                author: n.author,
                url: n.url.unwrap_or_default(),
                updated_at: n.updated_at,
                symbols: n.symbols,
            })
            .collect())
    }

    async fn fetch_assets(&self) -> Result<IndexMap<String, Asset>, ProviderError> {
        let url = format!("{}/v2/assets", self.config.trading_url);
        let query = vec![("status".to_string(), "active".to_string())];
        let assets: Vec<AlpacaAsset> = self.get_json(&url, &query).await?;

        Ok(assets
            .into_iter()
            .map(|a| {
                let asset = Asset {
                    symbol: a.symbol.clone(),
                    name: a.name,
                    class: a.class,
                    tradable: a.tradable,
                };
                (a.symbol, asset)
            })
            .collect())
    }
}
