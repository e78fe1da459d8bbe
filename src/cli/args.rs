//! Command-line argument parsing for promptbake
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::store::RecordId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// promptbake - stream AI-written marketing copy into your terminal
#[derive(Parser, Debug)]
#[command(name = "promptbake")]
#[command(version)]
#[command(about = "Generate marketing content from prompt templates, with history and favorites", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only the generated text is printed)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fill a template and stream the result (Ctrl-C stops)
    Generate {
        /// Template name (see `templates`)
        #[arg(short, long, default_value = "marketing-plan")]
        template: String,

        /// Field values in template order; repeat for each field
        #[arg(short, long = "input", value_name = "TEXT")]
        inputs: Vec<String>,

        /// Model override
        #[arg(short, long)]
        model: Option<String>,

        /// Exit after the first result instead of offering continue/copy/favorite
        #[arg(long)]
        once: bool,
    },

    /// Browse saved generations
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Bookmark a saved generation
    Favorite {
        /// Record id
        id: RecordId,
    },

    /// List bookmarked generations
    Favorites,

    /// List prompt templates
    Templates,

    /// List models offered by the endpoint
    Models,

    /// Display current configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryCommand {
    /// Most recent generations first
    List {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Print one generation
    Show {
        id: RecordId,

        /// Strip markup (clipboard-ready text)
        #[arg(long)]
        plain: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// `tracing` filter for this level, `None` to use the configured one
    pub fn log_filter(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("promptbake=error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("promptbake=info"),
            Verbosity::VeryVerbose => Some("promptbake=debug"),
        }
    }

    /// Check if should show the waiting spinner and status lines
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
