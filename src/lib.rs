pub mod cli;
pub mod config;
pub mod logging;
pub mod scoring;
pub mod service;
pub mod watcher;

pub use config::{Settings, StartupError};
pub use logging::{LogHandle, LoggingError};
pub use scoring::{PipelineError, ScoreSummary, Scorer, ScoringPipeline};
pub use service::{ProcessingService, RunError, RunOutcome, ScoringService};
pub use watcher::{EventDispatcher, WatchError};
