//! The long-running refresh loop.
//!
//! Each turn: reconcile the source mode with what the operator asked for, run one
//! cycle, then sleep for the base interval (success) or the backed-off delay (failure).

use std::{future::Future, time::Duration};

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::{
    credentials::Credentials,
    refresh::{Refresher, backoff::RetryDelay},
    source::SourceMode,
    tracked::{TrackedSymbolStore, last_known_prices},
};

/// Base interval per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    /// Cadence in live mode.
    pub live: Duration,
    /// Cadence in simulated mode.
    pub simulated: Duration,
}

impl Intervals {
    /// Interval for `mode`.
    pub fn for_mode(&self, mode: SourceMode) -> Duration {
        match mode {
            SourceMode::Live => self.live,
            SourceMode::Simulated => self.simulated,
        }
    }
}

/// Background loop state. Only one should run per process.
pub struct RefreshLoop {
    refresher: Refresher,
    intervals: Intervals,
    delay: RetryDelay,
    env_credentials: Option<Credentials>,
}

impl RefreshLoop {
    /// Creates the loop; the delay starts at the base interval of the source's mode.
    pub fn new(
        refresher: Refresher,
        intervals: Intervals,
        ceiling: Duration,
        env_credentials: Option<Credentials>,
    ) -> Self {
        let base = intervals.for_mode(refresher.source().mode());
        Self {
            refresher,
            intervals,
            delay: RetryDelay::new(base, ceiling),
            env_credentials,
        }
    }

    /// Current backoff state.
    pub fn retry_delay(&self) -> &RetryDelay {
        &self.delay
    }

    /// Handle for manual refreshes that share the store and source.
    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// One turn without sleeping; returns how long to sleep before the next one.
    pub async fn tick(&mut self) -> Duration {
        self.reconcile_mode().await;

        if self.refresher.refresh_all_tracked(false).await {
            self.delay.on_success()
        } else {
            let next = self.delay.on_failure();
            warn!(retry_in_secs = next.as_secs(), "backing off");
            next
        }
    }

    /// Loops until `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            mode = %self.refresher.source().mode(),
            base_secs = self.delay.base().as_secs(),
            "refresh loop started"
        );

        loop {
            let next = self.tick().await;
            info!(next_in_secs = next.as_secs(), "next price refresh scheduled");

            tokio::select! {
                _ = tokio::time::sleep(next) => {}
                _ = &mut shutdown => {
                    info!("refresh loop stopping");
                    break;
                }
            }
        }
    }

    /// Applies a pending mode request from the store. Failures keep the current mode.
    async fn reconcile_mode(&mut self) {
        let store = self.refresher.store().clone();
        let source = self.refresher.source().clone();

        let desired = match store.desired_mode().await {
            Ok(Some(mode)) => mode,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "could not read desired mode");
                return;
            }
        };
        if desired == source.mode() {
            return;
        }

        let (credentials, last_prices) = match desired {
            SourceMode::Simulated => {
                let last = last_known_prices(store.as_ref()).await.unwrap_or_else(|e| {
                    warn!(error = %e, "could not read stored prices, simulation starts at base");
                    IndexMap::new()
                });
                (None, last)
            }
            SourceMode::Live => {
                let creds =
                    resolve_credentials(self.env_credentials.as_ref(), store.as_ref()).await;
                (creds, IndexMap::new())
            }
        };

        match source.reconfigure_resumed(desired, credentials.as_ref(), &last_prices) {
            Ok(()) => self.delay.set_base(self.intervals.for_mode(desired)),
            Err(e) => warn!(requested = %desired, current = %source.mode(), error = %e, "mode switch rejected"),
        }
    }
}

/// Live credentials: the environment pair first, then the most recently stored one.
pub async fn resolve_credentials(
    env: Option<&Credentials>,
    store: &dyn TrackedSymbolStore,
) -> Option<Credentials> {
    if let Some(creds) = env.filter(|c| c.is_complete()) {
        return Some(creds.clone());
    }
    match store.active_credentials().await {
        Ok(stored) => stored.map(|s| s.credentials),
        Err(e) => {
            warn!(error = %e, "could not read stored credentials");
            None
        }
    }
}
