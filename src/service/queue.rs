//! Single-worker run queue.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::RunOutcome;
use super::processor::ProcessingService;

/// Called on the worker after every run, in dispatch order.
pub type CompletionHook = Box<dyn Fn(&Path, &RunOutcome) + Send + Sync>;

/// FIFO of processing requests drained by exactly one worker task.
///
/// Submissions never block; a request waits until every earlier one has
/// finished.
pub struct RunQueue {
    tx: mpsc::UnboundedSender<PathBuf>,
    worker: JoinHandle<()>,
}

impl RunQueue {
    pub fn start(processor: ProcessingService, on_complete: Option<CompletionHook>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let worker = tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                let outcome = processor.handle(&path).await;
                if let Some(hook) = &on_complete {
                    hook(&path, &outcome);
                }
            }
            crate::debug_event!("queue", "drained");
        });

        Self { tx, worker }
    }

    /// Enqueue a request. Returns `false` if the worker has exited.
    pub fn submit(&self, path: PathBuf) -> bool {
        match self.tx.send(path) {
            Ok(()) => true,
            Err(mpsc::error::SendError(path)) => {
                tracing::error!("[queue] worker gone, dropping {}", path.display());
                false
            }
        }
    }

    /// Close the queue and wait for queued and in-flight runs to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            tracing::error!("[queue] worker failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::scoring::{PipelineResult, ScoreSummary, Scorer};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records the order of scored files via their first line.
    struct RecordingScorer {
        seen: Mutex<Vec<String>>,
    }

    impl Scorer for RecordingScorer {
        fn score(&self, staged: &Path) -> PipelineResult<ScoreSummary> {
            let text = std::fs::read_to_string(staged).unwrap();
            self.seen.lock().push(text.lines().nth(1).unwrap_or("").to_string());
            // Slow enough that a second request would overlap if run concurrently
            std::thread::sleep(Duration::from_millis(20));
            Ok(ScoreSummary {
                rows: 1,
                positives: 0,
                artifacts: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_runs_in_submission_order_and_calls_hook() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.paths.input_dir = temp_dir.path().to_path_buf();

        let scorer = Arc::new(RecordingScorer {
            seen: Mutex::new(Vec::new()),
        });
        let processor = ProcessingService::new(&settings, scorer.clone())
            .with_settle_delay(Duration::ZERO);

        let completed = Arc::new(Mutex::new(Vec::new()));
        let hook_completed = Arc::clone(&completed);
        let hook: CompletionHook = Box::new(move |path: &Path, outcome: &RunOutcome| {
            hook_completed
                .lock()
                .push((path.to_path_buf(), outcome.is_completed()));
        });

        let first = temp_dir.path().join("a.csv");
        let second = temp_dir.path().join("b.csv");
        std::fs::write(&first, "id,f1\nfirst,1\n").unwrap();
        std::fs::write(&second, "id,f1\nsecond,2\n").unwrap();

        let queue = RunQueue::start(processor, Some(hook));
        assert!(queue.submit(first.clone()));
        assert!(queue.submit(second.clone()));
        queue.shutdown().await;

        assert_eq!(*scorer.seen.lock(), ["first,1", "second,2"]);
        assert_eq!(*completed.lock(), [(first, true), (second, true)]);
    }
}
