//! Filtering and deduplication of raw arrival events.
//!
//! The dispatcher reacts to exactly one logical input: the canonical
//! watched file name with a tabular extension. Repeated notifications for
//! the path dispatched last are suppressed, so a burst of OS events for one
//! write produces a single processing request.
//!
//! The marker is never cleared by the dispatcher itself. A second upload
//! reusing the identical path therefore stays suppressed until some other
//! path has been dispatched, unless the owner calls [`EventDispatcher::reset`]
//! after each run (`watch.rearm_after_run`).

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::event::RawEvent;
use crate::config::TABULAR_EXTENSION;

/// Last-dispatched marker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Nothing dispatched yet, or rearmed after a run.
    #[default]
    Idle,
    /// The most recently forwarded path.
    Dispatched(PathBuf),
}

/// Why an event was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Directory,
    Extension,
    FileName,
    Duplicate,
}

/// Result of offering one raw event to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Dispatch(PathBuf),
    Skip(Skip),
}

pub struct EventDispatcher {
    watched_name: String,
    state: Mutex<DispatchState>,
}

impl EventDispatcher {
    pub fn new(watched_name: impl Into<String>) -> Self {
        Self {
            watched_name: watched_name.into(),
            state: Mutex::new(DispatchState::Idle),
        }
    }

    /// Decide whether `event` becomes a processing request.
    ///
    /// Filtering happens before the marker is consulted, so ignored paths
    /// never disturb deduplication.
    pub fn offer(&self, event: &RawEvent) -> Decision {
        if let Some(skip) = self.filter(&event.path) {
            crate::debug_event!("dispatcher", "ignored", "{skip:?} {}", event.path.display());
            return Decision::Skip(skip);
        }

        let mut state = self.state.lock();
        if matches!(&*state, DispatchState::Dispatched(last) if last == &event.path) {
            crate::debug_event!(
                "dispatcher",
                "duplicate",
                "{:?} {}",
                event.kind,
                event.path.display()
            );
            return Decision::Skip(Skip::Duplicate);
        }

        *state = DispatchState::Dispatched(event.path.clone());
        crate::log_event!("dispatcher", "detected", "{}", event.path.display());
        Decision::Dispatch(event.path.clone())
    }

    /// Forget the last dispatched path.
    pub fn reset(&self) {
        *self.state.lock() = DispatchState::Idle;
    }

    pub fn state(&self) -> DispatchState {
        self.state.lock().clone()
    }

    fn filter(&self, path: &Path) -> Option<Skip> {
        if path.is_dir() {
            return Some(Skip::Directory);
        }

        let tabular = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(TABULAR_EXTENSION));
        if !tabular {
            return Some(Skip::Extension);
        }

        if path.file_name().and_then(|n| n.to_str()) != Some(self.watched_name.as_str()) {
            return Some(Skip::FileName);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::RawEventKind;
    use tempfile::TempDir;

    fn created(path: &str) -> RawEvent {
        RawEvent::new(path, RawEventKind::Created)
    }

    #[test]
    fn test_burst_for_same_path_dispatches_once() {
        let dispatcher = EventDispatcher::new("test.csv");
        let kinds = [
            RawEventKind::Created,
            RawEventKind::Modified,
            RawEventKind::Modified,
            RawEventKind::MovedTo,
        ];

        let dispatched = kinds
            .iter()
            .filter(|&&kind| {
                matches!(
                    dispatcher.offer(&RawEvent::new("/in/test.csv", kind)),
                    Decision::Dispatch(_)
                )
            })
            .count();

        assert_eq!(dispatched, 1);
        assert_eq!(
            dispatcher.state(),
            DispatchState::Dispatched(PathBuf::from("/in/test.csv"))
        );
    }

    #[test]
    fn test_filters_by_extension_and_name() {
        let dispatcher = EventDispatcher::new("test.csv");

        assert_eq!(
            dispatcher.offer(&created("/in/test.txt")),
            Decision::Skip(Skip::Extension)
        );
        assert_eq!(
            dispatcher.offer(&created("/in/test")),
            Decision::Skip(Skip::Extension)
        );
        assert_eq!(
            dispatcher.offer(&created("/in/other.csv")),
            Decision::Skip(Skip::FileName)
        );
        assert_eq!(
            dispatcher.offer(&created("/in/test.staged.csv")),
            Decision::Skip(Skip::FileName)
        );
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn test_upper_case_extension_is_tabular() {
        let dispatcher = EventDispatcher::new("TEST.CSV");
        assert_eq!(
            dispatcher.offer(&created("/in/TEST.CSV")),
            Decision::Dispatch(PathBuf::from("/in/TEST.CSV"))
        );
    }

    #[test]
    fn test_directory_events_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("test.csv");
        std::fs::create_dir(&dir).unwrap();

        let dispatcher = EventDispatcher::new("test.csv");
        assert_eq!(
            dispatcher.offer(&RawEvent::new(&dir, RawEventKind::Created)),
            Decision::Skip(Skip::Directory)
        );
    }

    #[test]
    fn test_identical_path_stays_suppressed_until_another_path() {
        let dispatcher = EventDispatcher::new("test.csv");

        assert!(matches!(
            dispatcher.offer(&created("/a/test.csv")),
            Decision::Dispatch(_)
        ));
        // A later legitimate upload to the same path is still a duplicate
        assert_eq!(
            dispatcher.offer(&created("/a/test.csv")),
            Decision::Skip(Skip::Duplicate)
        );

        assert!(matches!(
            dispatcher.offer(&created("/b/test.csv")),
            Decision::Dispatch(_)
        ));
        assert!(matches!(
            dispatcher.offer(&created("/a/test.csv")),
            Decision::Dispatch(_)
        ));
    }

    #[test]
    fn test_reset_rearms_identical_path() {
        let dispatcher = EventDispatcher::new("test.csv");

        assert!(matches!(
            dispatcher.offer(&created("/in/test.csv")),
            Decision::Dispatch(_)
        ));
        dispatcher.reset();
        assert_eq!(dispatcher.state(), DispatchState::Idle);
        assert!(matches!(
            dispatcher.offer(&created("/in/test.csv")),
            Decision::Dispatch(_)
        ));
    }
}
