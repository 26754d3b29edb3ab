//! Score command - one-shot pipeline run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;

use crate::config::Settings;
use crate::logging;
use crate::scoring::{ScoreSummary, ScoringPipeline};
use crate::service::{ProcessingService, RunOutcome};

/// Score the staged file, or validate and stage `input` first.
pub async fn run_score(mut settings: Settings, input: Option<PathBuf>) -> anyhow::Result<()> {
    settings.prepare_directories()?;
    logging::init_console(&settings.logging);

    let pipeline = Arc::new(ScoringPipeline::from_settings(&settings));

    let summary = match input {
        Some(input) => {
            // Same path a watched upload takes, minus the settle delay
            let processor =
                ProcessingService::new(&settings, pipeline).with_settle_delay(Duration::ZERO);
            match processor.handle(&input).await {
                RunOutcome::Completed(summary) => summary,
                RunOutcome::Vanished => bail!("Input file not found: {}", input.display()),
                RunOutcome::Rejected(e) => return Err(e.into()),
                RunOutcome::Failed(e) => return Err(e.into()),
            }
        }
        None => {
            let staged = settings.staged_path();
            if !staged.is_file() {
                bail!(
                    "No staged file at {}. Pass --input to stage one",
                    staged.display()
                );
            }
            tokio::task::spawn_blocking(move || pipeline.run(&staged)).await??
        }
    };

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ScoreSummary) {
    println!(
        "Scored {} rows ({} positive)",
        summary.rows, summary.positives
    );
    for path in &summary.artifacts {
        println!("  wrote {}", path.display());
    }
}
