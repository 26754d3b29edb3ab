//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Directory-watching batch scoring service
#[derive(Parser, Debug)]
#[command(
    name = "scorewatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Score CSV uploads dropped into a watched directory",
    long_about = "Watch the input directory for the canonical upload, validate and stage it, \
                  then write predictions and diagnostics to the output directory.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Examples:\n  scorewatch init\n  scorewatch watch\n  scorewatch score --input data/test.csv\n  SCOREWATCH_INFERENCE__THRESHOLD=0.7 scorewatch"
)]
pub struct Cli {
    /// Path to a custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Defaults to `watch`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the service until interrupted
    #[command(about = "Watch the input directory and score each upload")]
    Watch,

    /// Score once without watching
    #[command(
        about = "Run the scoring pipeline once",
        long_about = "Score the staged file. With --input, the given file is validated \
                      and staged first, exactly as a watched upload would be."
    )]
    Score {
        /// CSV file to validate and stage before scoring
        #[arg(short, long, value_name = "CSV")]
        input: Option<PathBuf>,
    },

    /// Initialize configuration
    #[command(about = "Write a default configs/settings.toml")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display the effective settings as TOML")]
    Config,
}

impl Cli {
    /// The requested command, `watch` when none was given.
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Watch)
    }
}
