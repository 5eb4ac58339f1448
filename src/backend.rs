//! The OS-notification backend.
//!
//! The watcher only needs a uniform, non-recursive "add a directory, get
//! events" contract from whatever platform primitive backs it. We realize
//! that contract on top of the `notify` crate, which already wraps the
//! per-platform primitives (FSEvents, ReadDirectoryChangesW, inotify) behind
//! one API, so this crate does not vendor a platform-specific binding of its
//! own.

use std::sync::Mutex;

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{error::WatchError, path::AbsolutePath};

/// The closed set of primitive event kinds a backend can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Created,
    Deleted,
    Modified,
    Renamed,
    Other,
}

/// A `(path, kind)` record emitted by the OS-level notification backend.
/// `path` is the absolute path of the affected entry, not the watched
/// directory.
#[derive(Debug, Clone)]
pub struct PrimitiveEvent {
    pub path: AbsolutePath,
    pub kind: PrimitiveKind,
}

/// The minimal contract required of any platform adapter.
///
/// `add` is idempotent: adding a directory already in the watch set is not
/// an error.
pub trait Backend: Send + Sync {
    fn add(&self, dir: &AbsolutePath) -> Result<(), WatchError>;
    fn close(&self);
}

/// `Backend` implementation built on `notify::RecommendedWatcher`, always
/// registered in [`RecursiveMode::NonRecursive`]. The recursive watcher
/// engine (`crate::watcher`) is the only thing that decides which
/// directories get added; this type never recurses on its own.
pub struct NotifyBackend {
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl NotifyBackend {
    /// Spawns the backend and returns it along with its two lazy sequences:
    /// translated primitive events, and backend errors. Each channel has
    /// exactly one consumer.
    pub fn spawn() -> Result<
        (
            Self,
            mpsc::UnboundedReceiver<PrimitiveEvent>,
            mpsc::UnboundedReceiver<WatchError>,
        ),
        WatchError,
    > {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    for primitive in translate(event) {
                        // A closed receiver means the producer task has
                        // exited; nothing left to do but drop the event.
                        let _ = events_tx.send(primitive);
                    }
                }
                Err(err) => {
                    let _ = errors_tx.send(WatchError::from(err));
                }
            },
            Config::default(),
        )?;

        Ok((
            Self {
                watcher: Mutex::new(Some(watcher)),
            },
            events_rx,
            errors_rx,
        ))
    }
}

impl Backend for NotifyBackend {
    fn add(&self, dir: &AbsolutePath) -> Result<(), WatchError> {
        let mut guard = self.watcher.lock().expect("lock not poisoned");
        let watcher = guard.as_mut().ok_or(WatchError::NotRunning)?;
        watcher.watch(dir.as_path(), RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn close(&self) {
        debug!("closing filewatching backend");
        let mut guard = self.watcher.lock().expect("lock not poisoned");
        // Dropping the watcher stops its OS thread and drops the closure
        // that owns `events_tx`/`errors_tx`, which closes both channels.
        *guard = None;
    }
}

fn translate(event: notify::Event) -> Vec<PrimitiveEvent> {
    use notify::event::{EventKind as NotifyKind, ModifyKind, RenameMode};

    let kind = match event.kind {
        NotifyKind::Create(_) => Some(PrimitiveKind::Created),
        NotifyKind::Remove(_) => Some(PrimitiveKind::Deleted),
        // The "from" half of a rename names a path that no longer exists;
        // old names aren't tracked, so it's dropped entirely.
        NotifyKind::Modify(ModifyKind::Name(RenameMode::From)) => None,
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // `paths` is `[from, to]`; only the new name is reported.
            return event
                .paths
                .last()
                .cloned()
                .map(|path| PrimitiveEvent {
                    path: AbsolutePath::new_unchecked(path),
                    kind: PrimitiveKind::Renamed,
                })
                .into_iter()
                .collect();
        }
        NotifyKind::Modify(ModifyKind::Name(_)) => Some(PrimitiveKind::Renamed),
        NotifyKind::Modify(_) => Some(PrimitiveKind::Modified),
        NotifyKind::Access(_) | NotifyKind::Any | NotifyKind::Other => Some(PrimitiveKind::Other),
    };

    let Some(kind) = kind else {
        return Vec::new();
    };

    event
        .paths
        .into_iter()
        .map(|path| PrimitiveEvent {
            path: AbsolutePath::new_unchecked(path),
            kind,
        })
        .collect()
}
