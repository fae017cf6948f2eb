//! Message Labeler
//!
//! Labels every indexed disaster message with its best-matching taxonomy
//! term and writes the result as CSV. Can also build the message index the
//! labeling runs search, and deduplicate an existing labeled dataset.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_vector::indexer::{DEFAULT_INDEX_BATCH_SIZE, DEFAULT_VECTOR_DIMENSION};
use eyre::Result;

mod dedup;
mod index;
mod label;
mod output;

#[derive(Parser)]
#[command(name = "quake-labeler")]
#[command(about = "Label disaster messages against a category taxonomy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query every taxonomy term and write the best label per message
    Run(RunArgs),

    /// Embed a corpus CSV and store it in the Qdrant collection
    Index(IndexArgs),

    /// Collapse duplicate (time, account) rows in a labeled CSV, keeping the first
    Dedup {
        /// Labeled CSV to read
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the deduplicated CSV (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Corpus CSV with time, location, account and message columns
    #[arg(short, long, env = "INDEX_CORPUS", default_value = "data/YInt.csv")]
    pub corpus: PathBuf,

    /// Messages embedded per request
    #[arg(long, env = "INDEX_BATCH_SIZE", default_value_t = DEFAULT_INDEX_BATCH_SIZE)]
    pub batch_size: usize,

    /// Vector size of the collection, created if missing
    #[arg(long, env = "INDEX_DIMENSION", default_value_t = DEFAULT_VECTOR_DIMENSION)]
    pub dimension: u64,

    /// Index only the first N messages
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Taxonomy JSON: main category -> list of terms
    #[arg(short, long, env = "LABELER_TAXONOMY", default_value = "data/categories.json")]
    pub taxonomy: PathBuf,

    /// Output CSV path
    #[arg(short, long, env = "LABELER_OUTPUT", default_value = "data/labeled_messages.csv")]
    pub output: PathBuf,

    /// Base URL of the search API
    #[arg(long, env = "SEARCH_API_URL", default_value = domain_labeling::port::DEFAULT_SEARCH_API_URL)]
    pub search_url: String,

    /// Query Qdrant in-process instead of going through the search API
    #[arg(long)]
    pub direct: bool,

    /// Source corpus CSV used to count unlabeled messages (search API mode)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Do not pre-load the corpus before labeling
    #[arg(long)]
    pub no_corpus_seed: bool,

    /// Append the winning score as a trailing column
    #[arg(long)]
    pub with_score: bool,

    /// Also write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Keep going and write what was found even if the search service is down
    #[arg(long)]
    pub allow_partial: bool,

    /// Maximum term queries in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Result limit per term query
    #[arg(long)]
    pub limit: Option<u32>,

    /// Retries per term after an unavailable answer
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => label::run(args).await,
        Commands::Index(args) => index::run(args).await,
        Commands::Dedup { input, output } => {
            let output = output.unwrap_or_else(|| input.clone());
            dedup::run(&input, &output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["quake-labeler", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.taxonomy, PathBuf::from("data/categories.json"));
        assert!(!args.direct);
        assert!(!args.with_score);
        assert_eq!(args.concurrency, None);
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "quake-labeler",
            "run",
            "--taxonomy",
            "cats.json",
            "--output",
            "out.csv",
            "--direct",
            "--with-score",
            "--concurrency",
            "8",
            "--limit",
            "1000",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.output, PathBuf::from("out.csv"));
        assert!(args.direct);
        assert!(args.with_score);
        assert_eq!(args.concurrency, Some(8));
        assert_eq!(args.limit, Some(1000));
    }

    #[test]
    fn test_index_defaults_and_overrides() {
        temp_env::with_vars_unset(["INDEX_CORPUS", "INDEX_BATCH_SIZE", "INDEX_DIMENSION"], || {
            let cli = Cli::try_parse_from(["quake-labeler", "index"]).unwrap();
            let Commands::Index(args) = cli.command else {
                panic!("expected index");
            };
            assert_eq!(args.corpus, PathBuf::from("data/YInt.csv"));
            assert_eq!(args.batch_size, 32);
            assert_eq!(args.dimension, 384);
            assert_eq!(args.limit, None);

            let cli = Cli::try_parse_from([
                "quake-labeler",
                "index",
                "-c",
                "messages.csv",
                "--batch-size",
                "64",
                "--limit",
                "100",
            ])
            .unwrap();
            let Commands::Index(args) = cli.command else {
                panic!("expected index");
            };
            assert_eq!(args.corpus, PathBuf::from("messages.csv"));
            assert_eq!(args.batch_size, 64);
            assert_eq!(args.limit, Some(100));
        });
    }

    #[test]
    fn test_dedup_requires_input() {
        assert!(Cli::try_parse_from(["quake-labeler", "dedup"]).is_err());
        let cli = Cli::try_parse_from(["quake-labeler", "dedup", "-i", "labeled.csv"]).unwrap();
        assert!(matches!(cli.command, Commands::Dedup { output: None, .. }));
    }
}
