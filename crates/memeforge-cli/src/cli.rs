//! CLI argument parsing for memeforge.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// memeforge
///
/// Picks the template that best fits a caption and renders it as a
/// two-panel meme.
#[derive(Parser, Debug)]
#[command(name = "memeforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/memeforge/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Template index management
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Rank templates against a caption
    Select {
        /// Caption text to match
        text: String,

        /// Number of matches to show
        #[arg(short, long, default_value = "1")]
        top: usize,
    },

    /// Render a meme from a given template
    Render {
        /// Template image
        #[arg(long)]
        template: String,

        /// Caption for the upper panel
        #[arg(long)]
        top: String,

        /// Caption for the lower panel
        #[arg(long)]
        bottom: String,

        /// Output file name inside the output directory
        #[arg(long)]
        output_name: Option<String>,
    },

    /// Select the best template for the captions and render it
    Compose {
        /// Single caption, split on `||` or halved by words
        #[arg(
            long,
            conflicts_with_all = ["top", "bottom"],
            required_unless_present_all = ["top", "bottom"]
        )]
        caption: Option<String>,

        /// Caption for the upper panel
        #[arg(long, requires = "bottom")]
        top: Option<String>,

        /// Caption for the lower panel
        #[arg(long, requires = "top")]
        bottom: Option<String>,

        /// Text used for template selection (default: both captions)
        #[arg(long)]
        query: Option<String>,

        /// Output file name inside the output directory
        #[arg(long)]
        output_name: Option<String>,
    },
}

/// Index subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum IndexCommands {
    /// Embed every template and write the index
    Build {
        /// Override template directory
        #[arg(long)]
        templates: Option<String>,

        /// Override index file
        #[arg(long)]
        index: Option<String>,
    },

    /// Show statistics for a persisted index
    Info {
        /// Override index file
        #[arg(long)]
        index: Option<String>,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
