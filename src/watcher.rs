//! The recursive-watch maintenance engine: bootstraps watches over every
//! existing directory under the root, keeps the watch set synchronized with
//! directory creations observed through the primitive event stream, applies
//! the exclusion policy, and publishes semantic events to the fan-out hub.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, RwLock},
};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{
    backend::{Backend, NotifyBackend, PrimitiveEvent, PrimitiveKind},
    error::WatchError,
    event::{Event, EventKind},
    exclude::is_watchable,
    hub::{ClientId, Hub, Subscriber},
    path::AbsolutePath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Running,
    Closed,
}

/// Owns the backend, maintains the invariant that every existing
/// non-excluded directory under the root is watched, translates primitive
/// events into semantic events, and publishes them through its [`Hub`].
pub struct Watcher {
    root: AbsolutePath,
    backend: Arc<dyn Backend>,
    hub: Hub,
    state: Mutex<State>,
    watch_set: RwLock<HashSet<AbsolutePath>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PrimitiveEvent>>>,
    errors: Mutex<Option<mpsc::UnboundedReceiver<WatchError>>>,
}

impl Watcher {
    /// Constructs a watcher backed by the default `notify`-based backend.
    pub fn new(root: AbsolutePath) -> Result<Self, WatchError> {
        let (backend, events, errors) = NotifyBackend::spawn()?;
        Ok(Self::with_backend(root, Arc::new(backend), events, errors))
    }

    /// Constructs a watcher over a caller-supplied backend. Root must be
    /// absolute and in native form; behavior for non-canonical input is
    /// unspecified.
    pub fn with_backend(
        root: AbsolutePath,
        backend: Arc<dyn Backend>,
        events: mpsc::UnboundedReceiver<PrimitiveEvent>,
        errors: mpsc::UnboundedReceiver<WatchError>,
    ) -> Self {
        Self {
            root,
            backend,
            hub: Hub::new(),
            state: Mutex::new(State::New),
            watch_set: RwLock::new(HashSet::new()),
            events: Mutex::new(Some(events)),
            errors: Mutex::new(Some(errors)),
        }
    }

    pub fn root(&self) -> &AbsolutePath {
        &self.root
    }

    /// A snapshot of the directories currently registered with the backend.
    /// May legitimately contain paths that have since been deleted;
    /// cleanup is opportunistic, not mandatory.
    pub fn watched_paths(&self) -> HashSet<AbsolutePath> {
        self.watch_set.read().expect("lock not poisoned").clone()
    }

    /// Enumerates the root's directory tree and registers every existing,
    /// non-excluded directory with the backend, then starts the producer
    /// task that drains the backend's event stream. `New -> Running` is the
    /// only legal transition this performs; calling it twice, or after
    /// `close`, returns an error instead of retrying.
    pub async fn start(self: &Arc<Self>) -> Result<(), WatchError> {
        {
            let mut state = self.state.lock().expect("lock not poisoned");
            match *state {
                State::New => *state = State::Running,
                State::Running => return Err(WatchError::AlreadyStarted),
                State::Closed => return Err(WatchError::NotRunning),
            }
        }

        if tokio::fs::metadata(self.root.as_path()).await.is_err() {
            *self.state.lock().expect("lock not poisoned") = State::Closed;
            return Err(WatchError::RootMissing);
        }

        self.backend.add(&self.root)?;
        self.walk_register(&self.root, false);

        let events = self
            .events
            .lock()
            .expect("lock not poisoned")
            .take()
            .expect("events receiver only taken once, by start()");
        let errors = self
            .errors
            .lock()
            .expect("lock not poisoned")
            .take()
            .expect("errors receiver only taken once, by start()");

        let this = self.clone();
        tokio::spawn(this.run_producer(events, errors));
        Ok(())
    }

    /// Registers `subscriber`. Rejected once the watcher has started
    /// closing, or before it has started.
    pub fn add_client(&self, subscriber: impl Subscriber) -> Result<ClientId, WatchError> {
        if *self.state.lock().expect("lock not poisoned") != State::Running {
            return Err(WatchError::NotRunning);
        }
        Ok(self.hub.add_client(subscriber))
    }

    /// Deregisters `id`; subsequent events are not delivered to it.
    pub fn remove_client(&self, id: ClientId) {
        self.hub.remove_client(id);
    }

    /// Cooperative shutdown: releases the backend's OS handles, which in
    /// turn causes the producer task to observe closed channels, transition
    /// to `Closed`, and deliver `on_closed` to every subscriber.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("lock not poisoned");
        if *state == State::Closed {
            return;
        }
        let was_running = *state == State::Running;
        *state = State::Closed;
        drop(state);

        if was_running {
            self.backend.close();
        } else {
            // Never started (or start failed before spawning the producer):
            // nothing will drive the hub to close on our behalf.
            self.hub.close();
        }
    }

    /// Drains the backend's primitive event and error streams until the
    /// backend closes both. This is the sole producer task for this
    /// watcher; no synchronous filesystem I/O happens here beyond
    /// `Backend::add`, bounded by the size of a newly created subtree.
    async fn run_producer(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<PrimitiveEvent>,
        mut errors: mpsc::UnboundedReceiver<WatchError>,
    ) {
        loop {
            tokio::select! {
                primitive = events.recv() => {
                    match primitive {
                        Some(primitive) => self.handle_primitive(primitive).await,
                        None => break,
                    }
                }
                error = errors.recv() => {
                    match error {
                        Some(error) => self.hub.publish_error(error),
                        None => break,
                    }
                }
            }
        }

        *self.state.lock().expect("lock not poisoned") = State::Closed;
        self.hub.close();
    }

    async fn handle_primitive(&self, primitive: PrimitiveEvent) {
        let path = primitive.path;
        if !is_watchable(&self.root, &path) {
            return;
        }

        match primitive.kind {
            PrimitiveKind::Created => {
                // `symlink_metadata` deliberately does not follow links: a
                // newly created symlink to a directory is itself a file as
                // far as the watch set is concerned (its target, if inside
                // the root, is already registered transitively).
                let is_dir = tokio::fs::symlink_metadata(path.as_path())
                    .await
                    .map(|meta| meta.is_dir())
                    .unwrap_or(false);

                if is_dir {
                    // Recursively enumerate now, synchronously with respect
                    // to this subtree's later events, closing the race
                    // between "directory created" and "files written into
                    // it before we registered it".
                    for event in self.walk_register(&path, true) {
                        self.hub.publish(event);
                    }
                } else {
                    self.hub.publish(Event::new(path, EventKind::Added));
                }
            }
            PrimitiveKind::Renamed => {
                self.hub.publish(Event::new(path, EventKind::Renamed));
            }
            PrimitiveKind::Deleted => {
                // Cleanup is opportunistic, not mandatory: we don't track
                // this removal beyond dropping it from the watch set.
                self.watch_set
                    .write()
                    .expect("lock not poisoned")
                    .remove(&path);

                // The root itself is the one path whose deletion is always
                // silent, on every platform: there is nothing left to
                // reconcile against once the root is gone, so no event is
                // synthesized for it. Every other deletion passes through
                // unchanged.
                if path != self.root {
                    self.hub.publish(Event::new(path, EventKind::Removed));
                }
            }
            PrimitiveKind::Modified => {
                self.hub.publish(Event::new(path, EventKind::Modified));
            }
            PrimitiveKind::Other => {
                self.hub.publish(Event::new(path, EventKind::Other));
            }
        }
    }

    /// Depth-first enumeration of `start` (inclusive), registering every
    /// non-excluded directory with the backend. Symlinks are not traversed.
    /// When `emit_events` is set, returns one `Added` event per directory
    /// and file encountered, in discovery order (`start` first, then its
    /// descendants) — used for the startup scan's watch registration (no
    /// events) and for the steady-state "directory created" burst (events).
    fn walk_register(&self, start: &AbsolutePath, emit_events: bool) -> Vec<Event> {
        let mut events = Vec::new();
        let root = self.root.clone();

        let walker = WalkDir::new(start.as_path())
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| {
                is_watchable(&root, &AbsolutePath::new_unchecked(entry.path()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    // Enumeration errors on individual subdirectories are
                    // logged and do not abort the walk; the affected
                    // subtree is simply not watched until a later event
                    // causes it to be.
                    debug!(error = %err, "enumeration error, skipping entry");
                    continue;
                }
            };
            let path = AbsolutePath::new_unchecked(entry.path());

            if entry.file_type().is_dir() {
                match self.backend.add(&path) {
                    Ok(()) => {
                        self.watch_set
                            .write()
                            .expect("lock not poisoned")
                            .insert(path.clone());
                    }
                    Err(err) => {
                        warn!(path = %path, error = %err, "failed to watch directory, will retry from a parent event");
                    }
                }
            }

            if emit_events {
                events.push(Event::new(path, EventKind::Added));
            }
        }

        events
    }
}
