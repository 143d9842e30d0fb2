use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use pair_ensemble::commands::{inspect, run};
use pair_ensemble::config::{
    RunSettings, DEFAULT_FIRST_SYMBOL, DEFAULT_SECOND_SYMBOL, DEFAULT_START_DATE, DEFAULT_TAIL_ROWS,
};
use pair_ensemble::data::normalize_symbol;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pair-ensemble")]
#[command(about = "Pair-asset signal ensemble with a vectorized backtest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct PairArgs {
    /// Directory holding one <SYMBOL>.csv file per symbol
    #[arg(long = "data-dir", value_name = "DIR")]
    data_dir: PathBuf,
    /// Traded asset
    #[arg(long, default_value = DEFAULT_FIRST_SYMBOL)]
    first: String,
    /// Comparison asset
    #[arg(long, default_value = DEFAULT_SECOND_SYMBOL)]
    second: String,
    #[arg(long = "start-date", default_value = DEFAULT_START_DATE)]
    start_date: NaiveDate,
    #[arg(long = "end-date")]
    end_date: Option<NaiveDate>,
    /// Cache lifetime for fetched series
    #[arg(long = "cache-ttl-secs", default_value_t = 3600)]
    cache_ttl_secs: u64,
}

impl PairArgs {
    fn settings(&self, tail_rows: usize) -> Result<RunSettings> {
        let first = normalize_symbol(&self.first).ok_or_else(|| anyhow!("first symbol is empty"))?;
        let second =
            normalize_symbol(&self.second).ok_or_else(|| anyhow!("second symbol is empty"))?;
        Ok(RunSettings {
            first_symbol: first,
            second_symbol: second,
            start_date: Some(self.start_date),
            end_date: self.end_date,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            tail_rows,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the ensemble signal table and backtest it
    Run {
        #[command(flatten)]
        pair: PairArgs,
        /// Parameter override written as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Baseline signal: always_on or prior_abs_momentum
        #[arg(long)]
        baseline: Option<String>,
        /// Volatility threshold: full_sample, expanding or rolling:<n>
        #[arg(long = "threshold-mode")]
        threshold_mode: Option<String>,
        /// Comma separated vote members
        #[arg(long)]
        vote: Option<String>,
        /// Write the full signal table as CSV
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Write performance stats and trades as JSON
        #[arg(long = "stats-output", value_name = "PATH")]
        stats_output: Option<PathBuf>,
        /// Number of trailing rows to print
        #[arg(long, default_value_t = DEFAULT_TAIL_ROWS)]
        tail: usize,
    },
    /// Show the date coverage of both series and their overlap
    Inspect {
        #[command(flatten)]
        pair: PairArgs,
        /// Parameter override written as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!("Starting pair-ensemble. Not financial advice.");

    match cli.command {
        Commands::Run {
            pair,
            params,
            baseline,
            threshold_mode,
            vote,
            output,
            stats_output,
            tail,
        } => {
            let (signal, simulator) = run::build_configs(
                &params,
                baseline.as_deref(),
                threshold_mode.as_deref(),
                vote.as_deref(),
            )?;
            let options = run::RunOptions {
                data_dir: pair.data_dir.clone(),
                settings: pair.settings(tail)?,
                signal,
                simulator,
                output,
                stats_output,
            };
            run::run(&options)?;
        }
        Commands::Inspect { pair, params } => {
            let (signal, _) = run::build_configs(&params, None, None, None)?;
            inspect::run(&pair.data_dir, &pair.settings(DEFAULT_TAIL_ROWS)?, &signal)?;
        }
    }

    Ok(())
}
