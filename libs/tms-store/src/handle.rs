use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tms_api::{Backend, StoreError, TableProvider};

/// Backend table handle opened on first use and closed exactly once.
///
/// The fast path is a lock-free read of the initialized cell; opening and
/// closing serialize on one mutex.
pub struct LazyHandle {
    provider: Arc<dyn TableProvider>,
    table: String,
    handle: OnceLock<Arc<dyn Backend>>,
    init: Mutex<()>,
    closed: AtomicBool,
}

impl LazyHandle {
    pub fn new(provider: Arc<dyn TableProvider>, table: impl Into<String>) -> Self {
        Self {
            provider,
            table: table.into(),
            handle: OnceLock::new(),
            init: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self) -> Result<Arc<dyn Backend>, StoreError> {
        self.ensure_open()?;
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let _init = self.lock_init();
        self.ensure_open()?;
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }
        let handle = self
            .provider
            .open_table(&self.table)
            .map_err(|e| e.with_context(format!("open table '{}'", self.table)))?;
        tracing::info!(table = %self.table, backend = handle.name(), "opened backend table");
        Ok(self.handle.get_or_init(|| handle).clone())
    }

    /// Release the backend handle. Later calls are no-ops.
    pub fn close(&self) -> Result<(), StoreError> {
        let _init = self.lock_init();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.handle.get() {
            Some(handle) => {
                tracing::debug!(table = %self.table, "closing backend table");
                handle.close()
            }
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::closed(format!("table '{}' is closed", self.table)));
        }
        Ok(())
    }

    fn lock_init(&self) -> MutexGuard<'_, ()> {
        self.init.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(table = %self.table, "handle lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tms_api::{Put, RowScanner};

    use super::*;

    #[derive(Default)]
    struct CountingProvider {
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    struct NullBackend {
        closed: Arc<AtomicUsize>,
    }

    impl Backend for NullBackend {
        fn name(&self) -> &str {
            "null"
        }
        fn put(&self, _put: Put) -> Result<(), StoreError> {
            Ok(())
        }
        fn scan(&self, _start: &[u8], _stop: Option<&[u8]>) -> Result<Box<dyn RowScanner>, StoreError> {
            Err(StoreError::logic("not scannable"))
        }
        fn delete(&self, _row: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }
        fn delete_range(&self, _start: &[u8], _stop: Option<&[u8]>) -> Result<u64, StoreError> {
            Ok(0)
        }
        fn close(&self) -> Result<(), StoreError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl TableProvider for CountingProvider {
        fn open_table(&self, _name: &str) -> Result<Arc<dyn Backend>, StoreError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullBackend { closed: self.closed.clone() }))
        }
    }

    #[test]
    fn opens_once_across_threads_and_closes_once() {
        let provider = Arc::new(CountingProvider::default());
        let handle = Arc::new(LazyHandle::new(provider.clone(), "t"));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.get().map(|_| ()))
            })
            .collect();
        for t in threads {
            t.join().unwrap().unwrap();
        }
        assert_eq!(provider.opened.load(Ordering::SeqCst), 1);

        handle.close().unwrap();
        handle.close().unwrap();
        assert_eq!(provider.closed.load(Ordering::SeqCst), 1);
        assert_eq!(handle.get().err().map(|e| e.kind()), Some(tms_api::ErrorKind::Closed));
    }

    #[test]
    fn closing_unopened_handle_never_opens() {
        let provider = Arc::new(CountingProvider::default());
        let handle = LazyHandle::new(provider.clone(), "t");
        handle.close().unwrap();
        assert_eq!(provider.opened.load(Ordering::SeqCst), 0);
    }
}
