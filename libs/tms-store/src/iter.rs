use tms_api::{CloseableIterator, Row, RowScanner, StoreError};

type RowFilter<T> = Box<dyn FnMut(Row) -> Result<Option<T>, StoreError> + Send>;

/// Decodes scanner rows, skipping those the filter rejects.
///
/// Holds the backend cursor until the scan is exhausted, `limit` entries
/// have been yielded, an error surfaces, `close` is called or the iterator
/// is dropped, whichever comes first. Skipped rows do not count against
/// `limit`.
pub struct RowIter<T> {
    scanner: Option<Box<dyn RowScanner>>,
    remaining: usize,
    filter: RowFilter<T>,
}

impl<T> RowIter<T> {
    pub fn new(
        scanner: Box<dyn RowScanner>,
        limit: usize,
        filter: impl FnMut(Row) -> Result<Option<T>, StoreError> + Send + 'static,
    ) -> Self {
        let mut iter = Self {
            scanner: Some(scanner),
            remaining: limit,
            filter: Box::new(filter),
        };
        if limit == 0 {
            iter.release();
        }
        iter
    }

    /// An iterator that yields nothing and holds no cursor.
    pub fn empty() -> Self {
        Self {
            scanner: None,
            remaining: 0,
            filter: Box::new(|_| Ok(None)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.scanner.is_none()
    }

    fn release(&mut self) {
        if let Some(mut scanner) = self.scanner.take() {
            scanner.close();
        }
    }
}

impl<T> Iterator for RowIter<T> {
    type Item = Result<T, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let scanner = self.scanner.as_mut()?;
            let row = match scanner.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => {
                    self.release();
                    return None;
                }
                Err(e) => {
                    self.release();
                    return Some(Err(e));
                }
            };
            match (self.filter)(row) {
                Ok(Some(item)) => {
                    self.remaining -= 1;
                    if self.remaining == 0 {
                        self.release();
                    }
                    return Some(Ok(item));
                }
                Ok(None) => continue,
                Err(e) => {
                    self.release();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<T: Send> CloseableIterator for RowIter<T> {
    fn close(&mut self) {
        self.release();
    }
}

impl<T> Drop for RowIter<T> {
    fn drop(&mut self) {
        self.release();
    }
}
