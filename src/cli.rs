//! Command-line interface for the `autoclick` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// autoclick - capture a window, find template images, synthesize clicks
#[derive(Parser)]
#[command(name = "autoclick")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug-level logging regardless of RUST_LOG.
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load config, start the finder and scanner pipeline, and block until Ctrl-C.
    Run {
        /// Path to a config JSON file. Defaults to the platform config directory.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List visible top-level windows with their process names and classes.
    ListWindows,
    /// List available monitors by index and bounding rectangle.
    ListMonitors,
    /// Load and validate a config file without starting anything.
    ValidateConfig {
        /// Path to a config JSON file. Defaults to the platform config directory.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// The subcommand to run, defaulting to `Run` with the default config
    /// location when none is given on the command line.
    pub fn command_or_default(self) -> Commands {
        self.command.unwrap_or(Commands::Run { config: None })
    }
}
