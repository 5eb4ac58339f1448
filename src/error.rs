use std::sync::Arc;

use thiserror::Error;

/// Errors produced by the recursive watcher and its collaborators.
///
/// Per-directory `Permission`/`NotFound` failures encountered while
/// maintaining the watch set are logged at `debug` and swallowed; they
/// never surface as a `WatchError`.
#[derive(Debug, Clone, Error)]
pub enum WatchError {
    /// The configured root did not exist at `start`. Fatal; returned
    /// synchronously from `start`.
    #[error("watch root does not exist")]
    RootMissing,

    /// A failure originating in the backend layer. Delivered through
    /// `on_error`; not fatal unless the backend itself closed.
    #[error("filewatching backend error: {0}")]
    Backend(Arc<notify::Error>),

    /// Enumerating a subtree for recursive registration failed outright
    /// (as opposed to a single directory's `add` failing, which is
    /// swallowed).
    #[error("enumerating recursive watch: {0}")]
    Enumeration(Arc<walkdir::Error>),

    /// A subscriber's mailbox dropped events because it could not keep up.
    /// Delivered through that subscriber's `on_error` only.
    #[error("subscriber queue overflowed, events were dropped")]
    Overflow,

    /// `start` called more than once.
    #[error("watcher already started")]
    AlreadyStarted,

    /// An operation requiring a running watcher was attempted before
    /// `start` or after `close`.
    #[error("watcher is not running")]
    NotRunning,
}

impl From<notify::Error> for WatchError {
    fn from(value: notify::Error) -> Self {
        Self::Backend(Arc::new(value))
    }
}

impl From<walkdir::Error> for WatchError {
    fn from(value: walkdir::Error) -> Self {
        Self::Enumeration(Arc::new(value))
    }
}
