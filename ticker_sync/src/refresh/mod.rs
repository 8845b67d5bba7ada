//! Price refresh: one cycle of list → fetch → persist, plus the loop that repeats it.
//!
//! - [`Refresher`] runs a single cycle. It is cheap to clone and is shared between the
//!   background loop and manual triggers.
//! - [`scheduler::RefreshLoop`] owns the [`backoff::RetryDelay`] and the cadence; manual
//!   refreshes go straight through a [`Refresher`] and never touch it.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::{
    pricing::PriceFields,
    source::QuoteSource,
    tracked::{PriceUpdate, TrackedSymbolStore},
};

pub mod backoff;
pub mod scheduler;

/// Why a refresh cycle failed. All variants are recovered by backoff.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// Listing tracked symbols failed.
    #[error("failed to list tracked symbols: {0:#}")]
    Listing(#[source] anyhow::Error),
    /// The batched snapshot request faulted.
    #[error("failed to fetch prices: {message}")]
    Fetch {
        /// Provider fault description.
        message: String,
    },
    /// Committing the updates failed; nothing from this cycle was kept.
    #[error("failed to save prices: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

/// Counts from one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Tracked symbols at the start of the cycle.
    pub requested: usize,
    /// Rows written.
    pub updated: usize,
    /// Symbols without a usable snapshot this cycle.
    pub skipped: usize,
}

/// Outcome of a manual refresh as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Whether the cycle succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
}

/// Runs refresh cycles against a store and a quote source.
#[derive(Clone)]
pub struct Refresher {
    store: Arc<dyn TrackedSymbolStore>,
    source: Arc<QuoteSource>,
}

impl Refresher {
    /// Creates a refresher over shared handles.
    pub fn new(store: Arc<dyn TrackedSymbolStore>, source: Arc<QuoteSource>) -> Self {
        Self { store, source }
    }

    /// The quote source this refresher reads from.
    pub fn source(&self) -> &Arc<QuoteSource> {
        &self.source
    }

    /// The store this refresher writes to.
    pub fn store(&self) -> &Arc<dyn TrackedSymbolStore> {
        &self.store
    }

    /// One cycle: list tracked symbols, fetch snapshots in one call, persist atomically.
    ///
    /// Symbols missing from the answer are left untouched. The provider is captured once,
    /// so a concurrent mode switch only affects the next cycle.
    pub async fn refresh_cycle(&self) -> Result<CycleReport, RefreshError> {
        let tracked = self
            .store
            .list_tracked()
            .await
            .map_err(RefreshError::Listing)?;
        let symbols: Vec<String> = tracked.iter().map(|t| t.symbol.clone()).collect();

        let active = self.source.current();
        let batch = active.snapshots(&symbols).await;
        if let Some(message) = batch.fault {
            return Err(RefreshError::Fetch { message });
        }

        let mut updates = Vec::with_capacity(batch.snapshots.len());
        for symbol in &symbols {
            let Some(snapshot) = batch.snapshots.get(symbol) else {
                debug!(%symbol, "no data this cycle");
                continue;
            };
            let Some(prices) = PriceFields::from_snapshot(snapshot) else {
                continue;
            };
            updates.push(PriceUpdate {
                symbol: symbol.clone(),
                name: Some(snapshot.name.clone()).filter(|n| !n.is_empty()),
                prices,
                observed_at: snapshot.observed_at,
            });
        }

        let updated = self
            .store
            .apply_price_updates(&updates)
            .await
            .map_err(RefreshError::Persistence)?;

        for u in &updates {
            debug!(
                symbol = %u.symbol,
                price = u.prices.price,
                previous_close = u.prices.previous_close,
                "updated"
            );
        }

        Ok(CycleReport {
            requested: symbols.len(),
            updated,
            skipped: symbols.len() - updates.len(),
        })
    }

    /// Runs one cycle and logs the outcome; returns whether it succeeded.
    pub async fn refresh_all_tracked(&self, manual: bool) -> bool {
        let trigger = if manual { "manual" } else { "scheduled" };
        info!(trigger, mode = %self.source.mode(), "starting price refresh");

        match self.refresh_cycle().await {
            Ok(report) => {
                info!(
                    trigger,
                    requested = report.requested,
                    updated = report.updated,
                    skipped = report.skipped,
                    "price refresh completed"
                );
                true
            }
            Err(e) => {
                error!(trigger, error = %e, "price refresh failed");
                false
            }
        }
    }

    /// Operator-triggered refresh. Reports success and a message; leaves any loop's
    /// backoff alone.
    pub async fn manual_refresh(&self) -> RefreshOutcome {
        match self.refresh_cycle().await {
            Ok(report) => {
                info!(updated = report.updated, skipped = report.skipped, "manual refresh completed");
                RefreshOutcome {
                    success: true,
                    message: format!(
                        "Stock prices updated successfully ({} of {} symbols)",
                        report.updated, report.requested
                    ),
                }
            }
            Err(e) => {
                error!(error = %e, "manual refresh failed");
                RefreshOutcome {
                    success: false,
                    message: format!("Error updating stock prices: {e}"),
                }
            }
        }
    }
}
