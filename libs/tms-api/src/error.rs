use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Error kind for store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or identifier, permanent.
    Config,
    /// Backend I/O failure (open, scan, put, delete). Never retried here.
    Io,
    /// Corrupt key, row or token encoding.
    Format,
    /// Invalid call or state (oversized batch, generic).
    Logic,
    NotFound,
    AlreadyExists,
    /// Operation on a table or scanner after `close()`.
    Closed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Logic => f.write_str("logic"),
            ErrorKind::NotFound => f.write_str("not found"),
            ErrorKind::AlreadyExists => f.write_str("already exists"),
            ErrorKind::Closed => f.write_str("closed"),
        }
    }
}

/// Unified error type for tables, backends and the janitor.
///
/// Carries an `ErrorKind` for categorization, a human-readable message and,
/// for backend failures, the engine error that caused it.
#[derive(Clone)]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl StoreError {
    fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into(), source: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Config, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Io, msg)
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Format, msg)
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Logic, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotFound, msg)
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::AlreadyExists, msg)
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Closed, msg)
    }

    /// Storage I/O failure caused by a backend engine error.
    pub fn backend<E>(msg: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind: ErrorKind::Io,
            message: format!("{}: {source}", msg.into()),
            source: Some(Arc::new(source)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Add context to the error, preserving its ErrorKind and source.
    ///
    /// Produces: `"context: message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
            source: self.source,
        }
    }
}

impl fmt::Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

// ---------------------------------------------------------------------------
// From impls: standard error types → StoreError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::backend("io", e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::format(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for StoreError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::format(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = StoreError::backend("scan", io).with_context("table 'tms_messages'");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.message().starts_with("table 'tms_messages': scan"));
        assert!(err.source().is_some());
    }
}
