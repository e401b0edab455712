//! memeforge CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (index, select, render, compose)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, IndexCommands};
pub use commands::{
    build_index, compose_meme, index_info, init_logging, load_provider, load_settings,
    render_meme, run, select_templates, ComposeOutcome,
};
