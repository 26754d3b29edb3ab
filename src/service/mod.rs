//! Processing service and its runtime.
//!
//! ```text
//! ScoringService (select loop)
//!   watcher events ──► EventDispatcher ──► RunQueue ──► worker
//!   liveness tick                                        │
//!   shutdown signal                          ProcessingService::handle
//!                                              exists? → settle → validate
//!                                              → stage → Scorer (blocking)
//! ```

mod error;
mod processor;
mod queue;
mod runner;

pub use error::{RunError, RunErrorKind, RunOutcome, StageError, ValidationError};
pub use processor::{ProcessingService, stage, validate_header};
pub use queue::{CompletionHook, RunQueue};
pub use runner::ScoringService;
