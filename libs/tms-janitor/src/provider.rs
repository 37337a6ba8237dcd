use std::sync::RwLock;

use tms_api::{StoreError, TransactionSnapshot, TransactionStateProvider};

/// Transaction state pushed in by the embedding process.
#[derive(Debug, Default)]
pub struct InMemoryTransactionState {
    state: RwLock<Option<TransactionSnapshot>>,
}

impl InMemoryTransactionState {
    pub fn new(snapshot: TransactionSnapshot) -> Self {
        Self {
            state: RwLock::new(Some(snapshot)),
        }
    }

    pub fn set(&self, snapshot: TransactionSnapshot) {
        *self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!("transaction state write lock was poisoned, recovering");
            poisoned.into_inner()
        }) = Some(snapshot);
    }

    pub fn clear(&self) {
        *self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!("transaction state write lock was poisoned, recovering");
            poisoned.into_inner()
        }) = None;
    }
}

impl TransactionStateProvider for InMemoryTransactionState {
    fn latest_state(&self) -> Result<Option<TransactionSnapshot>, StoreError> {
        let state = self.state.read().unwrap_or_else(|poisoned| {
            tracing::warn!("transaction state read lock was poisoned, recovering");
            poisoned.into_inner()
        });
        Ok(state.clone())
    }
}
