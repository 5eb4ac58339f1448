//! Recursive directory watching with a uniform event stream and fan-out to
//! multiple subscribers.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use filewatch::{AbsolutePath, Event, Subscriber, WatchError, Watcher};
//!
//! struct PrintEvents;
//!
//! impl Subscriber for PrintEvents {
//!     fn on_event(&mut self, event: Event) {
//!         println!("{event:?}");
//!     }
//!     fn on_error(&mut self, error: WatchError) {
//!         eprintln!("{error}");
//!     }
//!     fn on_closed(&mut self) {
//!         println!("closed");
//!     }
//! }
//!
//! # async fn run() -> Result<(), WatchError> {
//! let root = AbsolutePath::new("/path/to/project").expect("absolute path");
//! let watcher = Arc::new(Watcher::new(root)?);
//! watcher.start().await?;
//! watcher.add_client(PrintEvents)?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod event;
mod exclude;
mod hub;
mod path;
mod watcher;

pub use backend::{Backend, NotifyBackend, PrimitiveEvent, PrimitiveKind};
pub use error::WatchError;
pub use event::{Event, EventKind};
pub use exclude::is_watchable;
pub use hub::{ClientId, Subscriber};
pub use path::AbsolutePath;
pub use watcher::Watcher;
