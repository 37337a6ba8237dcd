use std::sync::Arc;

use tms_api::{CellScanner, CompactionHook, TransactionStateProvider};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::TransactionStateCache;
use crate::config::JanitorConfig;
use crate::metrics::JanitorMetrics;
use crate::scanner::DataJanitorScanner;

/// Compaction hook that wraps flush and compaction scanners in a
/// [`DataJanitorScanner`] whenever current transaction state is cached.
///
/// Without state the engine's scanner is returned untouched: nothing is
/// dropped on that pass.
pub struct TransactionDataJanitor {
    cache: Arc<TransactionStateCache>,
    metrics: Arc<JanitorMetrics>,
}

impl TransactionDataJanitor {
    pub fn new(cache: Arc<TransactionStateCache>) -> Self {
        Self {
            cache,
            metrics: Arc::new(JanitorMetrics::default()),
        }
    }

    /// Janitor over a fresh state cache that is refreshed every
    /// `refresh_interval` until `token` is cancelled. Must be called on a
    /// tokio runtime; the returned handle finishes after cancellation.
    pub fn start(
        provider: Arc<dyn TransactionStateProvider>,
        config: &JanitorConfig,
        token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let cache = Arc::new(TransactionStateCache::from_config(provider, config));
        let refresher = cache.clone().spawn_refresher(config.refresh_interval(), token);
        tracing::info!(
            refresh_interval_ms = config.refresh_interval_ms,
            max_state_age_ms = config.max_state_age_ms,
            "started transaction data janitor"
        );
        (Self::new(cache), refresher)
    }

    pub fn state_cache(&self) -> &Arc<TransactionStateCache> {
        &self.cache
    }

    pub fn metrics(&self) -> Arc<JanitorMetrics> {
        self.metrics.clone()
    }

    fn wrap(&self, region: &str, scanner: Box<dyn CellScanner>, pass: &str) -> Box<dyn CellScanner> {
        match self.cache.latest_state() {
            Some(snapshot) => Box::new(
                DataJanitorScanner::new(scanner, snapshot, region).with_metrics(self.metrics.clone()),
            ),
            None => {
                tracing::info!(
                    region,
                    "no current transaction state found, defaulting to normal {pass} scanner"
                );
                self.metrics.record_unfiltered_pass();
                scanner
            }
        }
    }
}

impl CompactionHook for TransactionDataJanitor {
    fn pre_flush(&self, region: &str, scanner: Box<dyn CellScanner>) -> Box<dyn CellScanner> {
        self.wrap(region, scanner, "flush")
    }

    fn pre_compact(&self, region: &str, scanner: Box<dyn CellScanner>) -> Box<dyn CellScanner> {
        self.wrap(region, scanner, "compaction")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tms_api::TransactionSnapshot;

    use crate::InMemoryTransactionState;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn start_follows_configured_interval_and_age() {
        let provider = Arc::new(InMemoryTransactionState::default());
        let config =
            JanitorConfig::parse("refresh_interval_ms = 1000\nmax_state_age_ms = 5000").unwrap();
        let token = CancellationToken::new();
        let (janitor, refresher) = TransactionDataJanitor::start(provider.clone(), &config, token.clone());

        provider.set(TransactionSnapshot::new(4, [1]));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let cached = janitor.state_cache().latest_state();
        assert_eq!(cached.map(|s| s.oldest_in_use_read_pointer), Some(4));

        // Without new state the last snapshot ages out after max_state_age.
        provider.clear();
        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert!(janitor.state_cache().latest_state().is_none());

        token.cancel();
        refresher.await.unwrap();
    }
}
