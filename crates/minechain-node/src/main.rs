mod constants;

use anyhow::{Context, Result};
use clap::Parser;
use constants::{DEFAULT_MINER, DEFAULT_SEED_TRANSACTIONS};
use minechain_core::{
    BlockReport, Chain, ChainConfig, MiningSummary, RoundPolicy, StopSignal, Transaction,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "minechain-node")]
#[command(about = "Mine a local proof-of-work chain from a batch of sample transactions")]
struct Args {
    /// Address credited with every block reward
    #[arg(long, default_value = DEFAULT_MINER)]
    miner: String,

    /// Sample transactions queued before the first round
    #[arg(long, default_value_t = DEFAULT_SEED_TRANSACTIONS)]
    seed_transactions: usize,

    /// Stop after this many blocks; without it mining runs until Ctrl-C
    #[arg(long)]
    max_rounds: Option<u64>,

    /// JSON file with chain settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting difficulty (leading hex zeros, at most 64)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=64))]
    difficulty: Option<u32>,

    /// Lowest difficulty the controller may reach
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=64))]
    min_difficulty: Option<u32>,

    /// Blocks slower than this lower the difficulty
    #[arg(long)]
    slow_threshold_ms: Option<u64>,

    /// Give up on a block after this many nonces
    #[arg(long)]
    max_attempts: Option<u64>,

    /// Emit one JSON object per line instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn chain_config(&self) -> Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                ChainConfig::from_json(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ChainConfig::default(),
        };
        if let Some(d) = self.difficulty {
            config.initial_difficulty = d;
        }
        if let Some(d) = self.min_difficulty {
            config.min_difficulty = d;
        }
        if let Some(ms) = self.slow_threshold_ms {
            config.slow_block_threshold_ms = ms;
        }
        if self.max_attempts.is_some() {
            config.max_attempts = self.max_attempts;
        }
        Ok(config)
    }

    fn policy(&self) -> RoundPolicy {
        match self.max_rounds {
            Some(n) => RoundPolicy::rounds(n),
            None => RoundPolicy::unbounded(),
        }
    }
}

fn seed_transactions(count: usize) -> Result<Vec<Transaction>> {
    (0..count)
        .map(|i| {
            Transaction::new(format!("Sender{i}"), format!("Recipient{i}"), i as f64 + 0.5)
                .map_err(Into::into)
        })
        .collect()
}

fn print_report(report: &BlockReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("could not encode block {}: {e}", report.index),
        }
    } else {
        println!("Block mined!");
        println!("{report}");
        println!();
    }
}

fn run(args: &Args, config: ChainConfig, stop: &StopSignal) -> Result<MiningSummary> {
    let mut chain = Chain::new(config);
    for tx in seed_transactions(args.seed_transactions)? {
        chain.add_transaction(tx)?;
    }
    info!(
        pending = chain.pending().len(),
        difficulty = chain.difficulty(),
        config = ?chain.config(),
        "chain ready"
    );

    let json = args.json;
    let summary = chain.mine_if_pending(
        &args.miner,
        args.policy(),
        stop,
        &mut |report: &BlockReport| print_report(report, json),
    )?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("=== chain ===");
        for report in chain.reports() {
            println!("{report}");
            println!();
        }
        println!(
            "mined {} block(s); height {}, difficulty {}, stopped: {:?}",
            summary.rounds, summary.height, summary.difficulty, summary.stop_reason
        );
    }
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.chain_config()?;
    let stop = StopSignal::new();

    tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping miner");
                stop.stop();
            }
        }
    });

    let summary = tokio::task::spawn_blocking(move || run(&args, config, &stop))
        .await
        .context("mining task panicked")??;
    info!(rounds = summary.rounds, height = summary.height, "done");
    Ok(())
}
