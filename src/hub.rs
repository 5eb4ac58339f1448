//! Fan-out to an arbitrary set of subscribers without blocking the producer.
//!
//! `tokio::sync::broadcast` already drops the oldest entry on overflow, but
//! only surfaces that to a *pull*-style `Receiver` as `Lagged(n)`, not as a
//! push callback on an opaque subscriber. Subscribers here are a
//! `{on_event, on_error, on_closed}` capability set driven by push, and
//! `tokio::sync::mpsc`'s bounded channel applies backpressure instead of
//! dropping on overflow, so each client gets its own small ring buffer
//! (`Mailbox`) instead.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use tokio::sync::Notify;

use crate::{error::WatchError, event::Event};

/// Bound on a single subscriber's undelivered-event backlog before the
/// oldest entry is dropped in favor of the newest.
const MAILBOX_CAPACITY: usize = 256;

/// A consumer of semantic events. Implementations are boxed and owned
/// exclusively by their delivery task, so no interior mutability is
/// required.
pub trait Subscriber: Send + 'static {
    fn on_event(&mut self, event: Event);
    fn on_error(&mut self, error: WatchError);
    fn on_closed(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

enum Message {
    Event(Event),
    Error(WatchError),
    Closed,
}

/// A bounded, drop-oldest mailbox shared between the hub (pushing,
/// non-blocking, never `.await`s) and a subscriber's delivery task
/// (popping, async).
struct Mailbox {
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(MAILBOX_CAPACITY)),
            notify: Notify::new(),
        }
    }

    /// Pushes `message`, returning `true` if the oldest undelivered message
    /// had to be dropped to make room.
    fn push(&self, message: Message) -> bool {
        let overflowed = {
            let mut queue = self.queue.lock().expect("lock not poisoned");
            let overflowed = queue.len() >= MAILBOX_CAPACITY;
            if overflowed {
                queue.pop_front();
            }
            queue.push_back(message);
            overflowed
        };
        self.notify.notify_one();
        overflowed
    }

    async fn recv(&self) -> Message {
        loop {
            if let Some(message) = self.queue.lock().expect("lock not poisoned").pop_front() {
                return message;
            }
            self.notify.notified().await;
        }
    }
}

struct Client {
    mailbox: Arc<Mailbox>,
    // Kept only so the delivery task is dropped (not aborted) together with
    // the client's bookkeeping; the task exits on its own once it sees a
    // `Closed` message.
    _task: tokio::task::JoinHandle<()>,
}

/// Manages the set of subscribers and delivers each semantic event to each
/// of them, isolating subscribers from each other and from the producer.
pub struct Hub {
    clients: RwLock<HashMap<ClientId, Client>>,
    next_id: AtomicU64,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers `subscriber`. Idempotency is not required: registering the
    /// same logical subscriber twice yields two clients.
    pub fn add_client(&self, subscriber: impl Subscriber) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mailbox = Arc::new(Mailbox::new());
        let task = tokio::task::spawn(deliver(mailbox.clone(), Box::new(subscriber)));
        self.clients
            .write()
            .expect("lock not poisoned")
            .insert(id, Client { mailbox, _task: task });
        id
    }

    /// Deregisters `id`. Subsequent events are not delivered; the
    /// subscriber still receives exactly one `on_closed`, after whatever was
    /// already queued for it.
    pub fn remove_client(&self, id: ClientId) {
        if let Some(client) = self.clients.write().expect("lock not poisoned").remove(&id) {
            client.mailbox.push(Message::Closed);
        }
    }

    /// Delivers `event` to every registered subscriber, best-effort and
    /// never blocking. A snapshot of mailboxes is taken under the read
    /// lock, then released before any pushing happens.
    pub fn publish(&self, event: Event) {
        for mailbox in self.snapshot() {
            if mailbox.push(Message::Event(event.clone())) {
                mailbox.push(Message::Error(WatchError::Overflow));
            }
        }
    }

    /// Forwards a backend error to every subscriber's `on_error`. Does not
    /// close the hub; only a backend close does that (see [`Hub::close`]).
    pub fn publish_error(&self, error: WatchError) {
        for mailbox in self.snapshot() {
            mailbox.push(Message::Error(error.clone()));
        }
    }

    /// Closes the hub: every subscriber receives exactly one `on_closed`
    /// after its last `on_event`/`on_error`.
    pub fn close(&self) {
        for (_, client) in self.clients.write().expect("lock not poisoned").drain() {
            client.mailbox.push(Message::Closed);
        }
    }

    fn snapshot(&self) -> Vec<Arc<Mailbox>> {
        self.clients
            .read()
            .expect("lock not poisoned")
            .values()
            .map(|c| c.mailbox.clone())
            .collect()
    }
}

async fn deliver(mailbox: Arc<Mailbox>, mut subscriber: Box<dyn Subscriber>) {
    loop {
        match mailbox.recv().await {
            Message::Event(event) => subscriber.on_event(event),
            Message::Error(error) => subscriber.on_error(error),
            Message::Closed => {
                subscriber.on_closed();
                return;
            }
        }
    }
}
