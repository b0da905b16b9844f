use anyhow::Result;
use clap::{Parser, Subcommand};
use folio::config::{Config, NormalizerConfig, SearchOptions, BATCH_MIN_OCCURRENCES, DEFAULT_RECOMMENDATIONS};
use folio::{DocId, SearchMode};
use indexer::{build_index, load_documents, LoadedIndex};
use tracing_subscriber::{EnvFilter, fmt};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "folio-indexer")]
#[command(about = "Build and query a book index with Jaccard recommendations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from JSON/JSONL files or Gutenberg .txt books
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Keep only 4..=10 letter terms and drop stopwords
        #[arg(long, default_value_t = false)]
        strict: bool,
        #[arg(long)]
        min_len: Option<usize>,
        #[arg(long)]
        max_len: Option<usize>,
        /// Index surface forms instead of stems
        #[arg(long, default_value_t = false)]
        no_stem: bool,
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// Minimum per-document occurrences for a term to be indexed
        #[arg(long)]
        min_occurrences: Option<u32>,
        /// Apply the batch threshold used for large Gutenberg corpora
        #[arg(long, default_value_t = false)]
        batch: bool,
        /// Rescale each term's weights to sum to 1
        #[arg(long, default_value_t = false)]
        normalize_weights: bool,
        /// Drop recommendations further than this distance
        #[arg(long)]
        max_distance: Option<f64>,
        /// Worker threads (defaults to one per core)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Search a built index
    Search {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        query: String,
        /// exact, substring or pattern
        #[arg(long, default_value = "exact")]
        mode: String,
        /// Score substring/pattern hits by occurrence count
        #[arg(long, default_value_t = false)]
        count_matches: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Suggest documents close to a given one
    Recommend {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        doc: DocId,
        #[arg(short, default_value_t = DEFAULT_RECOMMENDATIONS)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            strict,
            min_len,
            max_len,
            no_stem,
            stopwords,
            min_occurrences,
            batch,
            normalize_weights,
            max_distance,
            threads,
        } => {
            if let Some(n) = threads {
                rayon::ThreadPoolBuilder::new().num_threads(n).build_global()?;
            }
            let mut config = Config::default();
            if strict {
                config.normalizer = NormalizerConfig::strict();
            }
            if let Some(min_len) = min_len {
                config.normalizer.min_len = min_len;
            }
            if max_len.is_some() {
                config.normalizer.max_len = max_len;
            }
            config.normalizer.stemming &= !no_stem;
            config.normalizer.stopwords |= stopwords;
            if batch {
                config.index.min_occurrences = BATCH_MIN_OCCURRENCES;
            }
            if let Some(min) = min_occurrences {
                config.index.min_occurrences = min;
            }
            config.index.normalize_weights = normalize_weights;
            config.similarity.max_distance = max_distance;

            let docs = load_documents(&input)?;
            let summary = build_index(docs, &output, &config)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Search { index, query, mode, count_matches, limit } => {
            let mode: SearchMode = mode.parse()?;
            let loaded = LoadedIndex::open(&index)?;
            let mut hits = loaded.search(&query, mode, SearchOptions { count_matches })?;
            hits.truncate(limit);
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::Recommend { index, doc, k } => {
            let loaded = LoadedIndex::open(&index)?;
            let recs = loaded.recommend(doc, k)?;
            println!("{}", serde_json::to_string_pretty(&recs)?);
        }
    }
    Ok(())
}
