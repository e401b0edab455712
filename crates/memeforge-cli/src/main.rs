//! memeforge
//!
//! Turns a caption into a meme: picks the best-fitting template from a
//! local library and renders the caption next to it.
//!
//! # Usage
//!
//! ```bash
//! memeforge index build [--templates DIR] [--index FILE]
//! memeforge index info [--index FILE]
//! memeforge select "caption text" [--top K]
//! memeforge render --template FILE --top TEXT --bottom TEXT [--output-name NAME]
//! memeforge compose --top TEXT --bottom TEXT [--query TEXT] [--output-name NAME]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/memeforge/config.toml)
//! 3. Environment variables (MEMEFORGE_*)
//! 4. CLI flags

use anyhow::Result;

use memeforge_cli::{run, Cli};

fn main() -> Result<()> {
    run(Cli::parse_args())
}
