use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A news article tagged with the symbols it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    /// The headline of the article.
    pub headline: String,
    /// Short summary, may be empty.
    pub summary: String,
    /// Author or desk name, may be empty.
    pub author: String,
    /// A direct link to the article.
    pub url: String,
    /// When the article was last updated.
    pub updated_at: DateTime<Utc>,
    /// Symbols the article is tagged with.
    pub symbols: Vec<String>,
}

impl NewsArticle {
    /// Whether the article is tagged with `symbol`.
    pub fn mentions(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }
}
