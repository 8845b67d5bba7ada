//! Operator actions: manage tracked symbols, credentials and the source mode.

use market_data_ingestor::providers::alpaca_rest::{
    AlpacaConfig, AlpacaProvider, response::AlpacaAccount,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::{
    credentials::Credentials,
    source::{QuoteSource, SourceMode},
    tracked::{RepoError, TrackedSymbol, TrackedSymbolStore},
};

/// Errors surfaced to the operator.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Blank symbol input.
    #[error("Stock symbol is required")]
    EmptySymbol,
    /// Symbol is tracked already.
    #[error("Stock {0} is already being tracked")]
    AlreadyTracked(String),
    /// Symbol is not tracked.
    #[error("Stock {0} not found")]
    NotTracked(String),
    /// The quote source returned no snapshot for the symbol.
    #[error("Could not fetch data for {0}")]
    UnknownSymbol(String),
    /// The quote source failed while validating the symbol.
    #[error("Could not validate {symbol}: {message}")]
    SourceUnavailable {
        /// Symbol being validated.
        symbol: String,
        /// Provider fault.
        message: String,
    },
    /// One half of the key pair was blank.
    #[error("Both API key and secret key are required")]
    MissingCredentials,
    /// Alpaca rejected the key pair.
    #[error("Invalid API credentials: {0}")]
    InvalidCredentials(String),
    /// Anything else from the store.
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for AdminError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RepoError>() {
            Some(RepoError::AlreadyTracked { symbol }) => AdminError::AlreadyTracked(symbol.clone()),
            Some(RepoError::NotTracked { symbol }) => AdminError::NotTracked(symbol.clone()),
            _ => AdminError::Store(err),
        }
    }
}

/// Trims and upper-cases user input; blank input is an error.
pub fn normalize_symbol(raw: &str) -> Result<String, AdminError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AdminError::EmptySymbol);
    }
    Ok(symbol)
}

/// Validates `raw` through the quote source and starts tracking it.
///
/// The display name comes from the validating snapshot; prices are filled by the next refresh.
pub async fn add_symbol(
    store: &dyn TrackedSymbolStore,
    source: &QuoteSource,
    raw: &str,
) -> Result<TrackedSymbol, AdminError> {
    let symbol = normalize_symbol(raw)?;

    if store
        .list_tracked()
        .await?
        .iter()
        .any(|t| t.symbol == symbol)
    {
        return Err(AdminError::AlreadyTracked(symbol));
    }

    let batch = source.snapshots(std::slice::from_ref(&symbol)).await;
    if let Some(message) = batch.fault {
        return Err(AdminError::SourceUnavailable { symbol, message });
    }
    let Some(snapshot) = batch.snapshots.get(&symbol) else {
        return Err(AdminError::UnknownSymbol(symbol));
    };

    let name = Some(snapshot.name.as_str()).filter(|n| !n.is_empty());
    let added = store.add_symbol(&symbol, name).await?;
    info!(%symbol, "symbol added");
    Ok(added)
}

/// Stops tracking `raw`.
pub async fn remove_symbol(store: &dyn TrackedSymbolStore, raw: &str) -> Result<String, AdminError> {
    let symbol = normalize_symbol(raw)?;
    store.remove_symbol(&symbol).await?;
    info!(%symbol, "symbol removed");
    Ok(symbol)
}

/// Inserts any default symbols not yet tracked, without validation.
pub async fn seed_defaults(
    store: &dyn TrackedSymbolStore,
    symbols: &[String],
) -> Result<usize, AdminError> {
    let normalized = symbols
        .iter()
        .map(|s| normalize_symbol(s))
        .collect::<Result<Vec<_>, _>>()?;
    let added = store.seed_symbols(&normalized).await?;
    if added > 0 {
        info!(added, "seeded default symbols");
    }
    Ok(added)
}

/// Checks a key pair against the account endpoint.
pub async fn validate_credentials(
    credentials: &Credentials,
    alpaca: &AlpacaConfig,
) -> Result<AlpacaAccount, AdminError> {
    if !credentials.is_complete() {
        return Err(AdminError::MissingCredentials);
    }
    let provider = AlpacaProvider::with_config(
        SecretString::new(credentials.api_key().expose_secret().into()),
        SecretString::new(credentials.secret_key().expose_secret().into()),
        alpaca.clone(),
    )
    .map_err(|e| AdminError::InvalidCredentials(e.to_string()))?;

    provider.account().await.map_err(|e| {
        warn!(key = %credentials.masked_key(), error = %e, "credential check failed");
        AdminError::InvalidCredentials(e.to_string())
    })
}

/// Validates and stores a new key pair, which becomes the active one.
pub async fn save_credentials(
    store: &dyn TrackedSymbolStore,
    alpaca: &AlpacaConfig,
    credentials: Credentials,
) -> Result<AlpacaAccount, AdminError> {
    let account = validate_credentials(&credentials, alpaca).await?;
    store.save_credentials(&credentials).await?;
    info!(key = %credentials.masked_key(), account = %account.account_number, "credentials updated");
    Ok(account)
}

/// Records the mode a running loop should switch to at its next cycle.
pub async fn request_mode(store: &dyn TrackedSymbolStore, mode: SourceMode) -> Result<(), AdminError> {
    store.set_desired_mode(mode).await?;
    info!(%mode, "mode change requested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_symbols() {
        assert_eq!(normalize_symbol("  aapl ").unwrap(), "AAPL");
        assert!(matches!(normalize_symbol("   "), Err(AdminError::EmptySymbol)));
    }

    #[test]
    fn repo_errors_map_to_operator_errors() {
        let err: AdminError = anyhow::Error::from(RepoError::NotTracked {
            symbol: "TSLA".into(),
        })
        .into();
        assert_eq!(err.to_string(), "Stock TSLA not found");

        let err: AdminError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, AdminError::Store(_)));
    }

    #[tokio::test]
    async fn blank_secret_is_rejected_before_any_request() {
        let creds = Credentials::new("PKTESTKEY1234", " ");
        let err = validate_credentials(&creds, &AlpacaConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::MissingCredentials));
    }
}
