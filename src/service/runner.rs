//! Long-running service loop.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use notify::Event;

use super::error::RunOutcome;
use super::processor::ProcessingService;
use super::queue::{CompletionHook, RunQueue};
use crate::config::Settings;
use crate::scoring::Scorer;
use crate::watcher::{Decision, DirectoryWatcher, EventDispatcher, RawEvent, WatchError};

/// Watches the input directory and feeds arrivals to a single worker.
pub struct ScoringService {
    settings: Settings,
    scorer: Arc<dyn Scorer>,
}

impl ScoringService {
    /// `settings` should already have prepared directories.
    pub fn new(settings: Settings, scorer: Arc<dyn Scorer>) -> Self {
        Self { settings, scorer }
    }

    /// Run until `shutdown` resolves.
    ///
    /// On shutdown the watcher is stopped first, then queued and in-flight
    /// runs are allowed to finish.
    pub async fn run<F>(self, shutdown: F) -> Result<(), WatchError>
    where
        F: Future<Output = ()>,
    {
        let input_dir = self.settings.paths.input_dir.clone();
        let dispatcher = Arc::new(EventDispatcher::new(self.settings.watch.file_name.clone()));
        let (watcher, mut events) = DirectoryWatcher::start(&input_dir)?;

        let processor = ProcessingService::new(&self.settings, Arc::clone(&self.scorer));
        let on_complete = self
            .settings
            .watch
            .rearm_after_run
            .then(|| rearm_hook(Arc::clone(&dispatcher)));
        let queue = RunQueue::start(processor, on_complete);

        let mut liveness = tokio::time::interval(self.settings.watch.liveness_interval());
        tokio::pin!(shutdown);

        crate::log_event!(
            "service",
            "started",
            "watching {} for {}",
            input_dir.display(),
            self.settings.watch.file_name
        );

        let result = loop {
            tokio::select! {
                received = events.recv() => match received {
                    Some(Ok(event)) => route(event, &dispatcher, &queue),
                    Some(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                    None => break Err(WatchError::ChannelClosed),
                },

                _ = liveness.tick() => {
                    tracing::trace!("[service] alive, dispatcher {:?}", dispatcher.state());
                }

                _ = &mut shutdown => {
                    crate::log_event!("service", "shutdown requested");
                    break Ok(());
                }
            }
        };

        watcher.stop();
        queue.shutdown().await;
        crate::log_event!("service", "stopped");

        result
    }
}

fn route(event: Event, dispatcher: &EventDispatcher, queue: &RunQueue) {
    for raw in RawEvent::from_notify(event) {
        if let Decision::Dispatch(path) = dispatcher.offer(&raw) {
            queue.submit(path);
        }
    }
}

/// Clear the dedup marker after every run so the same path can be reprocessed.
fn rearm_hook(dispatcher: Arc<EventDispatcher>) -> CompletionHook {
    Box::new(move |path: &Path, _outcome: &RunOutcome| {
        dispatcher.reset();
        crate::debug_event!("dispatcher", "rearmed", "after {}", path.display());
    })
}
