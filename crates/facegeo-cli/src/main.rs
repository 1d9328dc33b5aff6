use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegeo_cache::{CacheCipher, FileStore, FingerprintCache, Resolution};
use facegeo_core::{FaceAnalysis, FaceEngine, FaceShape};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod config;
mod detector;

use config::Config;
use detector::JsonLandmarks;

#[derive(Parser)]
#[command(name = "facegeo", about = "Facial geometry analysis CLI")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a face-mesh landmark JSON file
    Analyze {
        /// Landmark file (one face, an array of faces, or {"faces": [...]})
        file: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        /// Skip the fingerprint cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Show fingerprint cache statistics
    Stats,
    /// Remove every remembered face
    Clear,
}

#[derive(Serialize)]
struct Report<'a> {
    /// Shape to present; the remembered one on a repeat visit.
    face_shape: FaceShape,
    analysis: &'a FaceAnalysis,
    angularity_index: f64,
    circularity_index: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<Resolution>,
}

impl<'a> Report<'a> {
    fn new(analysis: &'a FaceAnalysis, cache: Option<Resolution>) -> Self {
        let face_shape = cache
            .as_ref()
            .and_then(|r| r.face_shape.parse().ok())
            .unwrap_or(analysis.shape.primary);
        Self {
            face_shape,
            analysis,
            angularity_index: analysis.metrics.angularity_index(),
            circularity_index: analysis.metrics.circularity_index(),
            cache,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { file, json, no_cache } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut engine = FaceEngine::new(JsonLandmarks);
            let analysis = engine.analyze(text.as_str())?;

            let cache = if no_cache {
                None
            } else {
                Some(open_cache(&config).resolve(&analysis.metrics, analysis.shape.primary.label())?)
            };
            let report = Report::new(&analysis, cache);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Stats => {
            let stats = open_cache(&config).stats();
            println!("cache:          {}", config.cache_path.display());
            println!("faces:          {}", stats.count);
            println!("oldest (days):  {}", stats.oldest_days);
            println!("analyses:       {}", stats.total_analyses);
        }
        Commands::Clear => {
            open_cache(&config).clear()?;
            println!("Face cache cleared");
        }
    }

    Ok(())
}

fn open_cache(config: &Config) -> FingerprintCache {
    tracing::debug!(path = %config.cache_path.display(), "opening face cache");
    FingerprintCache::open(
        config.cache.clone(),
        CacheCipher::from_passphrase(&config.cache_key),
        FileStore::new(&config.cache_path),
    )
}

fn print_report(report: &Report<'_>) {
    let a = report.analysis;
    let m = &a.metrics;

    println!("Face shape:     {} ({}% confidence)", report.face_shape, a.shape.confidence);
    println!("                {}", report.face_shape.description());
    println!(
        "Secondary:      {} ({}%)",
        a.shape.secondary, a.shape.secondary_confidence
    );
    if let Some(cache) = &report.cache {
        if let Some(similarity) = cache.similarity {
            println!(
                "Recognized:     {similarity:.1}% match, visit #{}",
                cache.analysis_count
            );
        }
    }
    println!();
    println!("Height/width:   {:.3}", m.height_width_ratio);
    println!("Forehead/cheek: {:.3}", m.forehead_cheekbone_ratio);
    println!("Jaw/cheek:      {:.3}", m.jaw_cheekbone_ratio);
    println!("Chin/cheek:     {:.3}", m.chin_cheekbone_ratio);
    println!("Gonial angle:   {:.1}° ({:?})", m.gonial_angle, m.jaw_shape);
    println!("Uniformity:     {:.2}", m.width_uniformity);
    println!("Taper:          {:.1}", m.taper_index);
    println!("Angularity:     {:.1}", report.angularity_index);
    println!("Circularity:    {:.1}", report.circularity_index);
    println!();
    println!("Beauty score:   {:.1}", a.beauty.composite);
    println!(
        "  symmetry {:.2}, golden ratio {:.2}, jaw {:.2}, thirds {:.2}{}",
        a.beauty.symmetry,
        a.beauty.golden_ratio,
        a.beauty.jaw_structure,
        a.beauty.thirds_balance,
        if a.beauty.bonus_applied { " (+bonus)" } else { "" }
    );
}
