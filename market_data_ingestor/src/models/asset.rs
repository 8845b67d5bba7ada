use serde::{Deserialize, Serialize};

/// Asset class reported by the brokerage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    UsEquity,
    UsOption,
    Crypto,
    #[serde(other)]
    Other,
}

/// Tradable-asset metadata. Only the display name matters to the dashboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub class: AssetClass,
    pub tradable: bool,
}
