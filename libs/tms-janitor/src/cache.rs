use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tms_api::{StoreError, TransactionSnapshot, TransactionStateProvider};

use crate::config::JanitorConfig;

struct CachedState {
    snapshot: Arc<TransactionSnapshot>,
    fetched_at: Instant,
}

/// Shared, periodically refreshed view of the transaction manager's state.
///
/// Compactions read from here instead of asking the provider per pass.
/// State older than `max_age` is reported as absent, which makes the
/// janitor fall back to an unfiltered pass.
pub struct TransactionStateCache {
    provider: Arc<dyn TransactionStateProvider>,
    max_age: Duration,
    state: RwLock<Option<CachedState>>,
}

impl TransactionStateCache {
    pub fn new(provider: Arc<dyn TransactionStateProvider>, max_age: Duration) -> Self {
        Self {
            provider,
            max_age,
            state: RwLock::new(None),
        }
    }

    /// Cache whose state ages out after `config.max_state_age()`.
    pub fn from_config(provider: Arc<dyn TransactionStateProvider>, config: &JanitorConfig) -> Self {
        Self::new(provider, config.max_state_age())
    }

    /// Pull fresh state from the provider. Returns whether any was available;
    /// when none is, the previous state is kept until it ages out.
    pub fn refresh(&self) -> Result<bool, StoreError> {
        let Some(snapshot) = self.provider.latest_state()? else {
            tracing::debug!("transaction state provider returned no state");
            return Ok(false);
        };
        tracing::debug!(
            oldest_in_use_read_pointer = snapshot.oldest_in_use_read_pointer,
            invalid = snapshot.invalid.len(),
            "refreshed transaction state"
        );
        let mut state = self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!("transaction state cache lock was poisoned, recovering");
            poisoned.into_inner()
        });
        *state = Some(CachedState {
            snapshot: Arc::new(snapshot),
            fetched_at: Instant::now(),
        });
        Ok(true)
    }

    /// The cached snapshot, unless missing or older than `max_age`.
    pub fn latest_state(&self) -> Option<Arc<TransactionSnapshot>> {
        let state = self.state.read().unwrap_or_else(|poisoned| {
            tracing::warn!("transaction state cache lock was poisoned, recovering");
            poisoned.into_inner()
        });
        let cached = state.as_ref()?;
        let age = cached.fetched_at.elapsed();
        if age > self.max_age {
            tracing::debug!(age_ms = age.as_millis() as u64, "cached transaction state is stale");
            return None;
        }
        Some(cached.snapshot.clone())
    }

    /// Refresh every `interval` on the tokio runtime until `token` is cancelled.
    /// The provider call runs on the blocking pool.
    pub fn spawn_refresher(
        self: Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cache = self.clone();
                        match tokio::task::spawn_blocking(move || cache.refresh()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => tracing::warn!(error = %e, "transaction state refresh failed"),
                            Err(e) => tracing::error!(error = ?e, "transaction state refresh panicked"),
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
            tracing::info!("transaction state refresher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::InMemoryTransactionState;

    use super::*;

    #[test]
    fn empty_until_refreshed() {
        let provider = Arc::new(InMemoryTransactionState::new(TransactionSnapshot::new(3, [1])));
        let cache = TransactionStateCache::new(provider, Duration::from_secs(60));
        assert!(cache.latest_state().is_none());
        assert!(cache.refresh().unwrap());
        assert_eq!(cache.latest_state().unwrap().oldest_in_use_read_pointer, 3);
    }

    #[test]
    fn provider_without_state_keeps_previous() {
        let provider = Arc::new(InMemoryTransactionState::new(TransactionSnapshot::new(3, [])));
        let cache = TransactionStateCache::new(provider.clone(), Duration::from_secs(60));
        cache.refresh().unwrap();
        provider.clear();
        assert!(!cache.refresh().unwrap());
        assert!(cache.latest_state().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_state_is_absent() {
        let provider = Arc::new(InMemoryTransactionState::new(TransactionSnapshot::new(3, [])));
        let cache = TransactionStateCache::new(provider, Duration::from_secs(60));
        cache.refresh().unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.latest_state().is_none());
    }

    #[tokio::test]
    async fn refresher_tracks_provider_until_cancelled() {
        let provider = Arc::new(InMemoryTransactionState::default());
        let cache = Arc::new(TransactionStateCache::new(provider.clone(), Duration::from_secs(60)));
        let token = CancellationToken::new();
        let task = cache.clone().spawn_refresher(Duration::from_millis(10), token.clone());

        provider.set(TransactionSnapshot::new(11, []));
        for _ in 0..500 {
            if cache.latest_state().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.latest_state().map(|s| s.oldest_in_use_read_pointer), Some(11));

        token.cancel();
        task.await.unwrap();
    }
}
