//! waypoint - build and query hierarchical travel-guide indices
//!
//! ```bash
//! # Embed the corpus in data/*.json and persist both indices
//! waypoint index
//!
//! # Retrieve passages (loads persisted indices, builds them if missing)
//! waypoint query "founding of Paris" --scores
//!
//! # Show what the persisted indices were built with
//! waypoint inspect
//! ```
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use waypoint_core::config::{resolve_with_base, Config, Settings};
use waypoint_core::traits::VectorIndex;
use waypoint_core::types::DistanceMetric;
use waypoint_core::Corpus;
use waypoint_embed::embedder_from_config;
use waypoint_hier::{HierarchicalRetriever, IndexPaths};
use waypoint_vector::read_manifest;

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Hierarchical (title, then chunk) semantic retrieval over a travel corpus")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml; relative paths resolve against it
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Use the hash-based fake embedder instead of loading a model
    #[arg(long, global = true)]
    fake: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the corpus, build both indices and persist them
    Index {
        /// Corpus directory of *.json files (overrides corpus.data_dir)
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Distance metric: squared_l2 or cosine
        #[arg(long)]
        metric: Option<DistanceMetric>,
    },

    /// Retrieve the most relevant passages for a query
    Query {
        query: String,

        /// Print distances and owning titles
        #[arg(short, long)]
        scores: bool,

        #[arg(long)]
        title_top_n: Option<usize>,

        #[arg(long)]
        chunks_per_title: Option<usize>,

        #[arg(short = 'k', long)]
        total_chunks: Option<usize>,

        #[arg(short, long)]
        max_distance: Option<f32>,

        /// Run per-title searches in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Print the manifests of the persisted indices
    Inspect,
}

fn load_settings(cli: &Cli) -> Result<(Settings, PathBuf)> {
    let config = match &cli.config_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };
    let mut settings = config.settings().context("invalid configuration")?;
    if cli.fake { settings.embedding.use_fake = true; }
    Ok((settings, config.base_dir().to_path_buf()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (mut settings, base_dir) = load_settings(&cli)?;

    match cli.command {
        Commands::Index { data_dir, metric } => {
            if let Some(dir) = data_dir { settings.corpus.data_dir = dir; }
            if let Some(m) = metric { settings.index.metric = m; }
            let Some(paths) = IndexPaths::from_config(&settings.index, &base_dir) else {
                bail!("index.title_path and index.chunk_path must both be configured");
            };
            let data_dir = resolve_with_base(&base_dir, &settings.corpus.data_dir);
            let corpus = Corpus::load_dir(&data_dir, settings.corpus.max_chunk_chars)
                .with_context(|| format!("loading corpus from {}", data_dir.display()))?;
            let embedder = embedder_from_config(&settings.embedding, &base_dir)?;
            settings.index.force_rebuild = true;
            let retriever: HierarchicalRetriever = HierarchicalRetriever::open(&settings, &base_dir, embedder, Some(corpus))?;
            info!(titles = %paths.title.display(), chunks = %paths.chunk.display(), "indices written");
            println!("Indexed {} titles and {} chunks", retriever.title_index().len(), retriever.chunk_index().len());
        }

        Commands::Query { query, scores, title_top_n, chunks_per_title, total_chunks, max_distance, parallel } => {
            let r = &mut settings.retrieval;
            if let Some(v) = title_top_n { r.title_top_n = v; }
            if let Some(v) = chunks_per_title { r.chunks_per_title = v; }
            if let Some(v) = total_chunks { r.total_chunks = v; }
            if let Some(v) = max_distance { r.max_distance = v; }
            r.parallel |= parallel;

            let needs_corpus = settings.index.force_rebuild
                || IndexPaths::from_config(&settings.index, &base_dir).map_or(true, |p| !p.exist());
            let corpus = if needs_corpus {
                let data_dir = resolve_with_base(&base_dir, &settings.corpus.data_dir);
                Some(Corpus::load_dir(&data_dir, settings.corpus.max_chunk_chars)?)
            } else {
                None
            };
            let embedder = embedder_from_config(&settings.embedding, &base_dir)?;
            let retriever: HierarchicalRetriever = HierarchicalRetriever::open(&settings, &base_dir, embedder, corpus)?;

            let results = retriever.retrieve_scored(&query)?;
            if results.is_empty() { println!("No passages within max_distance {}", retriever.config().max_distance); }
            for (i, hit) in results.iter().enumerate() {
                if scores {
                    println!("{}. [{:.4}] {}\n   {}\n", i + 1, hit.distance, hit.title, hit.text);
                } else {
                    println!("{}\n", hit.text);
                }
            }
        }

        Commands::Inspect => {
            let Some(paths) = IndexPaths::from_config(&settings.index, &base_dir) else {
                bail!("no index paths configured");
            };
            for (label, path) in [("title", &paths.title), ("chunk", &paths.chunk)] {
                let m = read_manifest(path)?;
                println!("{label} index: {}", path.display());
                println!("  embedder:   {}", m.embedder_id);
                println!("  dimension:  {}", m.dim);
                println!("  metric:     {:?}", m.metric);
                println!("  records:    {}", m.record_count);
                println!("  created at: {}", m.created_at);
                println!("  checksum:   {}", m.checksum);
                println!("  build:      {}", m.build_id.as_deref().unwrap_or("-"));
            }
        }
    }
    Ok(())
}
