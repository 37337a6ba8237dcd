use std::collections::HashSet;
use std::sync::Arc;

use crate::error::StoreError;

/// A reader's transaction, as handed out by the external transaction manager.
///
/// Decides whether a write made under some write pointer may be observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    read_pointer: i64,
    write_pointer: i64,
    invalid: Arc<HashSet<i64>>,
    in_progress: Arc<HashSet<i64>>,
}

impl Transaction {
    pub fn new(read_pointer: i64, write_pointer: i64) -> Self {
        Self {
            read_pointer,
            write_pointer,
            invalid: Arc::default(),
            in_progress: Arc::default(),
        }
    }

    /// Read-only view that sees every write except the given invalid ones.
    pub fn latest(invalid: impl IntoIterator<Item = i64>) -> Self {
        Self::new(i64::MAX, i64::MAX).with_invalid(invalid)
    }

    pub fn with_invalid(mut self, invalid: impl IntoIterator<Item = i64>) -> Self {
        self.invalid = Arc::new(invalid.into_iter().collect());
        self
    }

    pub fn with_in_progress(mut self, in_progress: impl IntoIterator<Item = i64>) -> Self {
        self.in_progress = Arc::new(in_progress.into_iter().collect());
        self
    }

    pub fn read_pointer(&self) -> i64 {
        self.read_pointer
    }

    pub fn write_pointer(&self) -> i64 {
        self.write_pointer
    }

    /// Excluded writes: invalid (aborted / timed out) or still in progress.
    pub fn is_excluded(&self, write_pointer: i64) -> bool {
        self.invalid.contains(&write_pointer) || self.in_progress.contains(&write_pointer)
    }

    /// Committed before this transaction started and not excluded.
    pub fn is_committed(&self, write_pointer: i64) -> bool {
        write_pointer <= self.read_pointer && !self.is_excluded(write_pointer)
    }

    /// A transaction always sees its own writes.
    pub fn is_visible(&self, write_pointer: i64) -> bool {
        write_pointer == self.write_pointer || self.is_committed(write_pointer)
    }
}

/// Transaction-manager state consumed by the compaction janitor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionSnapshot {
    pub oldest_in_use_read_pointer: i64,
    pub invalid: HashSet<i64>,
}

impl TransactionSnapshot {
    pub fn new(oldest_in_use_read_pointer: i64, invalid: impl IntoIterator<Item = i64>) -> Self {
        Self {
            oldest_in_use_read_pointer,
            invalid: invalid.into_iter().collect(),
        }
    }

    pub fn is_invalid(&self, write_pointer: i64) -> bool {
        self.invalid.contains(&write_pointer)
    }
}

/// Source of the latest transaction state (external transaction manager).
pub trait TransactionStateProvider: Send + Sync {
    /// `None` when the manager has no state to offer yet.
    fn latest_state(&self) -> Result<Option<TransactionSnapshot>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_and_in_progress_are_not_visible() {
        let tx = Transaction::new(100, 101)
            .with_invalid([50])
            .with_in_progress([90]);
        assert!(tx.is_visible(10));
        assert!(!tx.is_visible(50));
        assert!(!tx.is_visible(90));
        assert!(!tx.is_visible(150));
        assert!(tx.is_visible(101));
    }

    #[test]
    fn latest_sees_everything_but_invalid() {
        let tx = Transaction::latest([7]);
        assert!(tx.is_visible(6));
        assert!(!tx.is_visible(7));
        assert!(tx.is_visible(i64::MAX - 1));
    }
}
