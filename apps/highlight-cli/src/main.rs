//! Evidence highlighter binary
//!
//! Reads a JSON array of evidence requests, highlights each one into the
//! combined output for its source document and prints the batch report as
//! JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use highlight_core::{EvidenceRequest, HighlightConfig, HighlightSession};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "evidence-highlight")]
#[command(version, about = "Highlight quoted evidence spans in their source PDFs")]
struct Args {
    /// Directory that receives the combined highlighted PDFs
    #[arg(short, long)]
    workdir: PathBuf,

    /// TOML configuration file (threshold, buffer, timeout_ms, style)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the minimum fuzzy score (0-100)
    #[arg(long)]
    threshold: Option<f64>,

    /// JSON array of {chunk_id, text, source, page}
    requests: PathBuf,
}

fn load_config(args: &Args) -> Result<HighlightConfig> {
    let config = match &args.config {
        Some(path) => HighlightConfig::from_file(path)?,
        None => HighlightConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
        config.validate()?;
    }
    Ok(config)
}

fn load_requests(path: &Path) -> Result<Vec<EvidenceRequest>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed requests in {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the report, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;
    let requests = load_requests(&args.requests)?;
    tracing::info!(
        items = requests.len(),
        workdir = %args.workdir.display(),
        threshold = config.threshold,
        "Starting evidence highlighting"
    );

    let session = HighlightSession::new(&args.workdir, config)?;
    let report = session.highlight_batch(requests).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to encode report")?
    );
    Ok(())
}
