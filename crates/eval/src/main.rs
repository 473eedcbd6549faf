//! Evaluation CLI for patent-expert prediction.
//!
//! Usage:
//!     eval rank 8460120 --corpus corpus.json --top 10
//!     eval cost --corpus corpus.json --weights tuned.json
//!     eval optimize --corpus corpus.json --temperature 10000 --cooling 0.95

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use expertrank_anneal::{optimize, AnnealConfig, CostEvaluator};
use expertrank_corpus::{CachedCorpus, InMemoryCorpus};
use expertrank_model::{Aggregate, PatentId, Weights};
use expertrank_ranker::ExpertRanker;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Evaluate and tune patent-expert predictions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Corpus JSON file (cpcs, levels, experts tables)
    #[arg(long, default_value = "corpus.json")]
    corpus: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank candidate experts for a patent
    Rank {
        /// Patent number to predict experts for
        patent: u64,

        /// Weights JSON file (uniform weights when omitted)
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Aggregation over pairwise scores (mean, max)
        #[arg(short, long, default_value = "mean")]
        agg: Aggregate,

        /// Truncate to the top N experts
        #[arg(short, long)]
        top: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compute the leave-one-out cost of a parameter vector
    Cost {
        /// Weights JSON file (uniform weights when omitted)
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Aggregation over pairwise scores (mean, max)
        #[arg(short, long, default_value = "mean")]
        agg: Aggregate,
    },

    /// Tune the parameter vector by simulated annealing
    Optimize {
        /// Starting temperature
        #[arg(long, default_value = "10000")]
        temperature: f64,

        /// Multiplicative cooling factor
        #[arg(long, default_value = "0.95")]
        cooling: f64,

        /// Half-width of the single-coordinate perturbation
        #[arg(long, default_value = "1.0")]
        step: f64,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Resume from a previously tuned weights file
        #[arg(long)]
        start: Option<PathBuf>,

        /// Aggregation over pairwise scores (mean, max)
        #[arg(short, long, default_value = "mean")]
        agg: Aggregate,

        /// Where to write the tuned weights JSON
        #[arg(short, long, default_value = "weights.json")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("expertrank=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let corpus = InMemoryCorpus::load(&cli.corpus)
        .with_context(|| format!("Loading corpus from {}", cli.corpus.display()))?;

    match cli.command {
        Commands::Rank {
            patent,
            weights,
            agg,
            top,
            format,
        } => run_rank(&corpus, patent, weights.as_deref(), agg, top, &format),
        Commands::Cost { weights, agg } => run_cost(&corpus, weights.as_deref(), agg),
        Commands::Optimize {
            temperature,
            cooling,
            step,
            seed,
            start,
            agg,
            out,
        } => {
            let config = AnnealConfig {
                temperature,
                cooling,
                step,
                seed,
                ..Default::default()
            };
            run_optimize(&corpus, &config, start.as_deref(), agg, &out)
        }
    }
}

fn load_weights(path: Option<&Path>) -> Result<Weights> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Reading weights from {}", path.display()))?;
            let weights: Weights = serde_json::from_str(&text)
                .with_context(|| format!("Parsing weights from {}", path.display()))?;
            Ok(weights)
        }
        None => Ok(Weights::uniform()),
    }
}

fn run_rank(
    corpus: &InMemoryCorpus,
    patent: u64,
    weights_path: Option<&Path>,
    agg: Aggregate,
    top: Option<usize>,
    format: &str,
) -> Result<()> {
    let weights = load_weights(weights_path)?;
    let patent = PatentId(patent);

    let cached = CachedCorpus::new(corpus);
    let ranker = ExpertRanker::new(&cached, &corpus);
    let mut ranking = ranker.rank(patent, &weights, agg, false);
    if let Some(n) = top {
        ranking.truncate(n);
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&ranking)?);
    } else {
        println!("Candidate experts for patent {}:", patent);
        println!("---");
        for (i, entry) in ranking.iter().enumerate() {
            println!("{}. expert {} (score {:.4})", i + 1, entry.expert, entry.score);
        }
        println!("---");
        println!("Total: {} experts", ranking.len());
    }

    Ok(())
}

fn run_cost(corpus: &InMemoryCorpus, weights_path: Option<&Path>, agg: Aggregate) -> Result<()> {
    let weights = load_weights(weights_path)?;

    let cached = CachedCorpus::new(corpus);
    let evaluator = CostEvaluator::new(&cached, &corpus)?;
    println!(
        "Evaluation set: {} patents",
        evaluator.evaluation_set().len()
    );

    let cost = evaluator.cost(&weights, agg);
    println!("Cost: {}", cost);

    Ok(())
}

fn run_optimize(
    corpus: &InMemoryCorpus,
    config: &AnnealConfig,
    start_path: Option<&Path>,
    agg: Aggregate,
    out: &Path,
) -> Result<()> {
    let start = match start_path {
        Some(path) => Some(load_weights(Some(path))?),
        None => None,
    };

    let cached = CachedCorpus::new(corpus);
    let evaluator = CostEvaluator::new(&cached, &corpus)?;
    let tuned = optimize(&evaluator, agg, config, start)?;

    std::fs::write(out, serde_json::to_string_pretty(&tuned)?)
        .with_context(|| format!("Writing tuned weights to {}", out.display()))?;

    println!("Tuned weights written to {}", out.display());
    println!("Final cost: {}", evaluator.cost(&tuned, agg));

    Ok(())
}
