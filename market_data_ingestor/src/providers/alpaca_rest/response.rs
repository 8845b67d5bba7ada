use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::models::asset::AssetClass;

#[derive(Deserialize, Debug)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct AlpacaBarsResponse {
    // The API sends `null` rather than `{}` when nothing matched.
    pub bars: Option<IndexMap<String, Vec<AlpacaBar>>>,
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AlpacaAsset {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub class: AssetClass,
    #[serde(default)]
    pub tradable: bool,
}

#[derive(Deserialize, Debug)]
pub struct AlpacaNews {
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct AlpacaNewsResponse {
    pub news: Vec<AlpacaNews>,
    pub next_page_token: Option<String>,
}

/// Subset of `/v2/account` used to prove a credential pair works.
#[derive(Deserialize, Debug, Clone)]
pub struct AlpacaAccount {
    pub id: String,
    #[serde(default)]
    pub account_number: String,
    pub status: String,
}
