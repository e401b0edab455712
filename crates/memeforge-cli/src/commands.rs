//! Command implementations for memeforge.
//!
//! Handlers take their settings and embedding provider as arguments so
//! they can run against fixture providers in tests; `run` wires them to
//! the real CLIP model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use memeforge_embeddings::{ClipEmbedder, EmbeddingProvider, ModelCache};
use memeforge_index::{
    load, BuildConfig, BuildReport, IndexBuilder, IndexStats, SelectorConfig, TemplateMatch,
    TemplateSelector,
};
use memeforge_render::{CompositorConfig, MemeCompositor};
use memeforge_types::Settings;

use crate::cli::{Cli, Commands, IndexCommands};

/// Result of `compose`: the chosen template and where the meme was written.
#[derive(Debug, Clone)]
pub struct ComposeOutcome {
    pub selected: TemplateMatch,
    pub output: PathBuf,
}

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load the CLIP embedder described by `settings`, downloading it once.
pub fn load_provider(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let mut cache = ModelCache::default();
    if let Some(dir) = settings.model_cache_dir() {
        cache.cache_dir = dir;
    }
    cache.repo_id = settings.embedding.model_repo.clone();
    cache.revision = settings.embedding.revision.clone();

    info!(repo = %cache.repo_id, cache = ?cache.cache_dir, "Loading embedding model");
    let embedder = ClipEmbedder::load(&cache).context("Failed to load CLIP model")?;
    Ok(Arc::new(embedder))
}

fn selector_config(settings: &Settings) -> SelectorConfig {
    SelectorConfig::new(settings.index_path(), settings.templates_dir())
        .with_build(BuildConfig::default().with_batch_size(settings.embedding.batch_size))
}

fn compositor(settings: &Settings) -> MemeCompositor {
    let config = CompositorConfig::from_settings(
        &settings.render,
        settings.output_dir(),
        settings.font_path(),
    );
    MemeCompositor::new(config)
}

/// Build the template index and persist it.
pub fn build_index(
    settings: &Settings,
    provider: &dyn EmbeddingProvider,
    templates: Option<&Path>,
    index: Option<&Path>,
) -> Result<BuildReport> {
    let templates = templates.map_or_else(|| settings.templates_dir(), Path::to_path_buf);
    let index = index.map_or_else(|| settings.index_path(), Path::to_path_buf);

    let builder = IndexBuilder::new(
        provider,
        BuildConfig::default().with_batch_size(settings.embedding.batch_size),
    );
    builder
        .build_and_persist(&templates, &index)
        .with_context(|| format!("Failed to build template index from {:?}", templates))
}

/// Statistics of the persisted index.
pub fn index_info(settings: &Settings, index: Option<&Path>) -> Result<IndexStats> {
    let index = index.map_or_else(|| settings.index_path(), Path::to_path_buf);
    let loaded = load(&index).with_context(|| format!("Failed to load template index {:?}", index))?;
    Ok(loaded.stats())
}

/// The `top` best templates for `text`.
pub fn select_templates(
    settings: &Settings,
    provider: Arc<dyn EmbeddingProvider>,
    text: &str,
    top: usize,
) -> Result<Vec<TemplateMatch>> {
    let selector = TemplateSelector::initialize(&selector_config(settings), provider)?;
    let matches = selector.select_top(text, top.max(1))?;
    Ok(matches)
}

/// Render a meme from an explicit template file.
pub fn render_meme(
    settings: &Settings,
    template: &Path,
    top: &str,
    bottom: &str,
    output_name: Option<&str>,
) -> Result<PathBuf> {
    let output = compositor(settings).render(template, top, bottom, output_name)?;
    Ok(output)
}

/// Split a single caption into upper and lower panel text.
///
/// `"top || bottom"` splits at the first `||`. Otherwise captions of more
/// than four words are halved by word count; shorter ones stay on top.
pub fn split_caption(caption: &str) -> (String, String) {
    if let Some((top, bottom)) = caption.split_once("||") {
        return (top.trim().to_string(), bottom.trim().to_string());
    }

    let words: Vec<&str> = caption.split_whitespace().collect();
    if words.len() <= 4 {
        return (caption.to_string(), String::new());
    }
    let (top, bottom) = words.split_at(words.len() / 2);
    (top.join(" "), bottom.join(" "))
}

/// Select a template for the captions and render it.
///
/// Selection uses `query`, or both captions joined by a space.
pub fn compose_meme(
    settings: &Settings,
    provider: Arc<dyn EmbeddingProvider>,
    top: &str,
    bottom: &str,
    query: Option<&str>,
    output_name: Option<&str>,
) -> Result<ComposeOutcome> {
    let query = query.map_or_else(
        || format!("{top} {bottom}").trim().to_string(),
        str::to_string,
    );
    let selector = TemplateSelector::initialize(&selector_config(settings), provider)?;
    let selected = selector.select(&query)?;
    info!(template = %selected.template_id, score = selected.score, "Selected template");

    let output = render_meme(
        settings,
        Path::new(&selected.template_id),
        top,
        bottom,
        output_name,
    )?;
    Ok(ComposeOutcome { selected, output })
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Index { command } => match command {
            IndexCommands::Build { templates, index } => {
                let provider = load_provider(&settings)?;
                let report = build_index(
                    &settings,
                    provider.as_ref(),
                    templates.as_deref().map(Path::new),
                    index.as_deref().map(Path::new),
                )?;
                println!("Indexed {} templates", report.index.len());
                if report.skipped_count() > 0 {
                    println!("Skipped {} files:", report.skipped_count());
                    for skipped in &report.skipped {
                        println!("  {}: {}", skipped.path.display(), skipped.reason);
                    }
                }
            }
            IndexCommands::Info { index } => {
                let stats = index_info(&settings, index.as_deref().map(Path::new))?;
                println!("Templates:       {}", stats.template_count);
                println!("Dimension:       {}", stats.dimension);
                println!("Embedding model: {}", stats.embedding_model);
            }
        },
        Commands::Select { text, top } => {
            let provider = load_provider(&settings)?;
            let matches = select_templates(&settings, provider, &text, top)?;
            for (rank, m) in matches.iter().enumerate() {
                println!("{:>2}. {:.4}  {}", rank + 1, m.score, m.template_id);
            }
        }
        Commands::Render {
            template,
            top,
            bottom,
            output_name,
        } => {
            let output = render_meme(
                &settings,
                Path::new(&template),
                &top,
                &bottom,
                output_name.as_deref(),
            )?;
            println!("Saved: {}", output.display());
        }
        Commands::Compose {
            caption,
            top,
            bottom,
            query,
            output_name,
        } => {
            let (top, bottom) = match caption {
                Some(caption) => split_caption(&caption),
                None => (top.unwrap_or_default(), bottom.unwrap_or_default()),
            };
            let provider = load_provider(&settings)?;
            let outcome = compose_meme(
                &settings,
                provider,
                &top,
                &bottom,
                query.as_deref(),
                output_name.as_deref(),
            )?;
            println!(
                "Template: {} (score {:.4})",
                outcome.selected.template_id, outcome.selected.score
            );
            println!("Saved: {}", outcome.output.display());
        }
    }

    Ok(())
}
