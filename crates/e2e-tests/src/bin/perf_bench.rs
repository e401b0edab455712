use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use e2e_tests::TestHarness;
use memeforge_embeddings::Embedding;
use memeforge_index::{load, persist, ExactSearch, SimilaritySearch, TemplateIndex, TemplateRecord};

const SMALL_TEMPLATE_COUNT: usize = 100;
const MEDIUM_TEMPLATE_COUNT: usize = 800;
const DIMENSION: usize = 512;
const DEFAULT_ITERATIONS: usize = 3;
const QUERIES_PER_ITERATION: usize = 50;

#[derive(Parser, Debug)]
#[command(name = "perf_bench", about = "memeforge selection and rendering benchmark")]
struct Args {
    #[arg(long, value_enum, default_value = "small")]
    tier: DatasetTier,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DatasetTier {
    Small,
    Medium,
}

impl DatasetTier {
    fn template_count(self) -> usize {
        match self {
            DatasetTier::Small => SMALL_TEMPLATE_COUNT,
            DatasetTier::Medium => MEDIUM_TEMPLATE_COUNT,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StepMetrics {
    p50_ms: f64,
    p90_ms: f64,
    p99_ms: f64,
    samples: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct BenchmarkOutput {
    tier: DatasetTier,
    templates: usize,
    dimension: usize,
    iterations: usize,
    steps: BTreeMap<String, StepMetrics>,
}

#[derive(Default)]
struct SampleCollector {
    durations: BTreeMap<String, Vec<f64>>,
}

impl SampleCollector {
    fn time<T>(&mut self, step: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.durations
            .entry(step.to_string())
            .or_default()
            .push(start.elapsed().as_secs_f64() * 1000.0);
        out
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn summarize(samples: &[f64]) -> StepMetrics {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    StepMetrics {
        p50_ms: percentile(&sorted, 0.50),
        p90_ms: percentile(&sorted, 0.90),
        p99_ms: percentile(&sorted, 0.99),
        samples: sorted.len(),
    }
}

fn random_embedding(rng: &mut StdRng) -> Embedding {
    Embedding::new((0..DIMENSION).map(|_| rng.random::<f32>() - 0.5).collect())
}

fn synthetic_index(rng: &mut StdRng, count: usize) -> Result<TemplateIndex, String> {
    let records = (0..count)
        .map(|i| TemplateRecord::new(format!("templates/t{i:04}.png"), random_embedding(rng)))
        .collect();
    TemplateIndex::new("bench-random", records).map_err(|e| e.to_string())
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut collector = SampleCollector::default();
    let harness = TestHarness::new();
    let compositor = harness.compositor();
    let template = RgbImage::from_pixel(500, 400, Rgb([200, 120, 40]));

    for _ in 0..args.iterations {
        let index = collector.time("index_build", || synthetic_index(&mut rng, args.tier.template_count()))?;

        collector
            .time("persist", || persist(&index, &harness.index_path))
            .map_err(|e| format!("persist failed: {e}"))?;
        let loaded = collector
            .time("load", || load(&harness.index_path))
            .map_err(|e| format!("load failed: {e}"))?;

        let search = ExactSearch::new(Arc::new(loaded.renormalized()));
        for _ in 0..QUERIES_PER_ITERATION {
            let query = random_embedding(&mut rng);
            collector.time("select", || search.nearest(&query));
        }

        collector.time("compose", || {
            compositor.compose(
                &template,
                "Writing a benchmark for the meme generator",
                "Optimizing the benchmark instead of the generator",
            )
        });
    }

    let output = BenchmarkOutput {
        tier: args.tier,
        templates: args.tier.template_count(),
        dimension: DIMENSION,
        iterations: args.iterations,
        steps: collector
            .durations
            .iter()
            .map(|(step, samples)| (step.clone(), summarize(samples)))
            .collect(),
    };
    let json = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;

    match args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| format!("Failed to create out dir: {e}"))?;
            }
            fs::write(&path, json).map_err(|e| format!("Failed to write report: {e}"))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
