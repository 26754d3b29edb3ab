//! Directory watching and arrival dispatch.
//!
//! # Architecture
//!
//! ```text
//! DirectoryWatcher (notify thread)
//!   - Non-recursive watch on the input directory
//!   - Pushes raw events into a bounded channel
//!         |
//!    RawEvent::from_notify
//!         |
//! EventDispatcher
//!   - Drops directories, non-csv files, other file names
//!   - Suppresses repeats of the last dispatched path
//!         |
//!    processing request
//! ```

mod directory;
mod dispatcher;
mod error;
mod event;

pub use directory::DirectoryWatcher;
pub use dispatcher::{Decision, DispatchState, EventDispatcher, Skip};
pub use error::WatchError;
pub use event::{RawEvent, RawEventKind};
