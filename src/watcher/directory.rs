//! OS-level notifier for the input directory.

use std::path::{Path, PathBuf};

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::WatchError;

/// Capacity of the channel between the notify thread and the event loop.
const EVENT_CHANNEL_SIZE: usize = 100;

/// Non-recursive watcher on a single directory.
///
/// Events are pushed from notify's own thread into a bounded channel;
/// dropping the watcher (or calling [`DirectoryWatcher::stop`]) stops the
/// thread and closes the channel.
pub struct DirectoryWatcher {
    dir: PathBuf,
    /// The underlying file watcher (kept alive by storing it).
    _watcher: notify::RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Start watching `dir` and return the receiving end of its events.
    pub fn start(
        dir: &Path,
    ) -> Result<(Self, mpsc::Receiver<notify::Result<Event>>), WatchError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the service is shutting down
            let _ = tx.blocking_send(res);
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        crate::debug_event!("watcher", "watching", "{}", dir.display());

        Ok((
            Self {
                dir: dir.to_path_buf(),
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop delivery. notify's event thread shuts down and drops its sender,
    /// which closes the channel once buffered events are drained.
    pub fn stop(self) {
        let dir = self.dir.clone();
        drop(self);
        crate::log_event!("watcher", "stopped", "{}", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_start_fails_for_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist");

        let result = DirectoryWatcher::start(&missing);
        assert!(matches!(result, Err(WatchError::PathWatchFailed { .. })));
    }

    #[tokio::test]
    async fn test_reports_created_file() {
        let temp_dir = TempDir::new().unwrap();
        let (watcher, mut rx) = DirectoryWatcher::start(temp_dir.path()).unwrap();
        assert_eq!(watcher.dir(), temp_dir.path());

        let target = temp_dir.path().join("test.csv");
        std::fs::write(&target, "id,f1\n1,0.2\n").unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed")
            .expect("notify error");
        assert!(event.paths.iter().any(|p| p.ends_with("test.csv")));

        watcher.stop();
    }
}
