//! Cross-lingual document aligner.
//!
//! Reads two files of base64-encoded tokenized documents — the first
//! machine-translated into the language of the second — and prints
//! `score<TAB>translated_id<TAB>target_id` for every pair above the score
//! threshold, or a conflict-free best matching (the default).

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docalign_core::align::{align, AlignOptions};
use docalign_core::config;

fn default_jobs() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

#[derive(Parser)]
#[command(
    name = "docalign",
    about = "Compute cross-lingual alignment scores between two collections of tokenized documents"
)]
struct Args {
    /// Base64-encoded documents, machine-translated into the target language
    translated_tokens: PathBuf,

    /// Base64-encoded documents in the target language
    english_tokens: PathBuf,

    /// Count document frequency on every n-th document only. min_count
    /// should scale accordingly: sampled DF counts are multiplied back up.
    #[arg(long = "df-sample-rate", value_name = "N", default_value_t = config::DEFAULT_DF_SAMPLE_RATE)]
    df_sample_rate: usize,

    /// N-gram window size in tokens
    #[arg(short = 'n', long = "ngram_size", value_name = "K", default_value_t = config::DEFAULT_NGRAM_SIZE)]
    ngram_size: usize,

    /// Number of worker threads per pool
    #[arg(short, long, value_name = "J", default_value_t = default_jobs())]
    jobs: usize,

    /// Minimum score for a pair to be reported
    #[arg(long, value_name = "T", default_value_t = config::DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Minimal number of documents an n-gram must appear in to stay in DF
    #[arg(long = "min_count", value_name = "M", default_value_t = config::DEFAULT_MIN_COUNT)]
    min_count: usize,

    /// Maximum number of documents an n-gram may appear in to stay in DF
    #[arg(long = "max_count", value_name = "M", default_value_t = config::DEFAULT_MAX_COUNT)]
    max_count: usize,

    /// Only output a conflict-free best match per document
    #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
    best: bool,

    /// Print every pair above the threshold (same as --best false)
    #[arg(long, conflicts_with = "best")]
    all: bool,

    /// Show progress diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("docalign_core=info,docalign_cli=info,docalign=info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage problems exit 1, matching the documented interface.
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    init_tracing(args.verbose);

    if args.ngram_size == 0 {
        eprintln!("Error: ngram_size must be at least 1");
        return ExitCode::from(1);
    }
    if args.df_sample_rate == 0 {
        eprintln!("Error: df-sample-rate must be at least 1");
        return ExitCode::from(1);
    }
    if args.jobs == 0 {
        eprintln!("Error: jobs must be at least 1");
        return ExitCode::from(1);
    }

    let options = AlignOptions {
        ngram_size: args.ngram_size,
        df_sample_rate: args.df_sample_rate,
        min_count: args.min_count,
        max_count: args.max_count,
        threshold: args.threshold,
        jobs: args.jobs,
        best: args.best && !args.all,
    };

    let out = BufWriter::new(io::stdout());
    match align(&options, &args.translated_tokens, &args.english_tokens, out) {
        Ok(stats) => {
            tracing::info!(
                pairs = stats.pairs_emitted,
                translated = stats.translated_documents,
                english = stats.english_documents,
                "alignment finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
