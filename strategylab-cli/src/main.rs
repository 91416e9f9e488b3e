//! StrategyLab CLI — collect, update, run, clean, and export commands.
//!
//! Commands:
//! - `collect` — poll the provider for every symbol of a strategy, one worker thread each
//! - `update` — catch every symbol's cache up to today
//! - `run` — execute a strategy pool for one date and report the chosen portfolio
//! - `clean` — drop cached months older than a number of days
//! - `export` — write the joined close-price panel to Parquet

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use strategylab_core::data::{write_panel_parquet, DataPipeline, ProviderRegistry};
use strategylab_core::domain::PricePanel;
use strategylab_core::Clock;
use strategylab_runner::{
    PoolConfig, PoolOutcome, PortfolioReport, RankingStrategy, StrategyConfig, StrategyPool, TradingPreference,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "strategylab",
    about = "StrategyLab CLI — cached market data and strategy selection"
)]
struct Cli {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the provider for every symbol of a strategy and persist new rows.
    Collect {
        /// Strategy TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Fetch once per symbol and exit.
        #[arg(long, default_value_t = false)]
        once: bool,

        /// Stop each worker after this many fetches.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Stop all workers after this many seconds.
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Bring every symbol's cache up to today.
    Update {
        /// Strategy TOML file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Execute a strategy pool and report the selected portfolio.
    Run {
        /// Pool TOML file.
        #[arg(long)]
        pool: PathBuf,

        /// Execution date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<String>,

        /// Override the pool's trading preference.
        #[arg(long)]
        preference: Option<String>,

        /// Write the outcome and report as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Remove cached months that ended more than `days` days ago.
    Clean {
        /// Strategy TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Retention in days.
        #[arg(long)]
        days: u32,
    },
    /// Export the cached close-price panel to Parquet.
    Export {
        /// Strategy TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Output Parquet file.
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Collect {
            config,
            once,
            max_iterations,
            duration_secs,
        } => run_collect(&config, once, max_iterations, duration_secs.map(Duration::from_secs)),
        Commands::Update { config } => run_update(&config),
        Commands::Run {
            pool,
            date,
            preference,
            output,
        } => run_pool(&pool, date.as_deref(), preference.as_deref(), output.as_deref()),
        Commands::Clean { config, days } => run_clean(&config, days),
        Commands::Export { config, out } => run_export(&config, &out),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_strategy(path: &Path) -> Result<StrategyConfig> {
    StrategyConfig::from_file(path).with_context(|| format!("loading strategy config {}", path.display()))
}

fn fetching_pipelines(config: &StrategyConfig) -> Result<Vec<DataPipeline>> {
    let registry = ProviderRegistry::with_defaults();
    config
        .build_pipelines(&registry, Clock::System)
        .with_context(|| format!("building pipelines for '{}'", config.name))
}

// ─── collect ─────────────────────────────────────────────────────────

fn run_collect(path: &Path, once: bool, max_iterations: Option<usize>, duration: Option<Duration>) -> Result<()> {
    let config = load_strategy(path)?;
    let mut pipelines = fetching_pipelines(&config)?;
    let stop = AtomicBool::new(false);

    info!(
        strategy = %config.name,
        symbols = pipelines.len(),
        interval_secs = config.pipeline.fetch_interval_secs,
        "starting collectors"
    );

    let totals: Vec<(String, usize, usize)> = std::thread::scope(|s| {
        if let Some(limit) = duration {
            let stop = &stop;
            s.spawn(move || {
                let started = Instant::now();
                while !stop.load(Ordering::Relaxed) && started.elapsed() < limit {
                    std::thread::sleep(Duration::from_millis(100));
                }
                stop.store(true, Ordering::Relaxed);
            });
        }

        let workers: Vec<_> = pipelines
            .iter_mut()
            .map(|pipeline| {
                let stop = &stop;
                s.spawn(move || collect_one(pipeline, stop, once, max_iterations))
            })
            .collect();

        let totals: Vec<_> = workers
            .into_iter()
            .filter_map(|w| w.join().ok())
            .collect();
        // release the timer thread
        stop.store(true, Ordering::Relaxed);
        totals
    });

    for (symbol, rows, failures) in &totals {
        println!("{symbol:<12} {rows:>8} new rows  {failures:>4} failed fetches");
    }
    Ok(())
}

fn collect_one(
    pipeline: &mut DataPipeline,
    stop: &AtomicBool,
    once: bool,
    max_iterations: Option<usize>,
) -> (String, usize, usize) {
    let symbol = pipeline.symbol().to_string();
    let summary = match (once, max_iterations) {
        (true, _) => pipeline.fetch_and_save_realtime(stop, true),
        (false, limit) => pipeline.poll_realtime(stop, limit),
    };
    info!(
        symbol = %symbol,
        iterations = summary.iterations,
        rows = summary.rows_added,
        failures = summary.failures,
        rollovers = summary.day_rollovers,
        "collector stopped"
    );
    (symbol, summary.rows_added, summary.failures)
}

// ─── update ──────────────────────────────────────────────────────────

fn run_update(path: &Path) -> Result<()> {
    let config = load_strategy(path)?;
    let mut pipelines = fetching_pipelines(&config)?;

    let outcomes: Vec<_> = pipelines
        .par_iter_mut()
        .map(|p| (p.symbol().to_string(), p.update_to_latest()))
        .collect();

    let mut failed = 0;
    for (symbol, outcome) in &outcomes {
        match outcome {
            Ok(summary) => println!(
                "{symbol:<12} {:>8} new rows  {:>4} fetches",
                summary.rows_added, summary.fetches
            ),
            Err(e) => {
                failed += 1;
                error!(symbol = %symbol, error = %e, "update failed");
                println!("{symbol:<12} FAILED: {e}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} symbols failed to update", outcomes.len());
    }
    Ok(())
}

// ─── run ─────────────────────────────────────────────────────────────

fn run_pool(path: &Path, date: Option<&str>, preference: Option<&str>, output: Option<&Path>) -> Result<()> {
    let pool_config = PoolConfig::from_file(path).with_context(|| format!("loading pool {}", path.display()))?;
    let strategies = pool_config.load_strategies()?;
    let execute_date = match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid --date '{s}'"))?,
        None => Utc::now().date_naive(),
    };
    let preference = preference.map_or(pool_config.preference, TradingPreference::parse);

    let registry = ProviderRegistry::with_defaults();
    let mut pool = StrategyPool::new(preference).with_parallel(pool_config.parallel);
    for config in &strategies {
        let strategy = RankingStrategy::from_config(config, &registry, Clock::System)
            .with_context(|| format!("building strategy '{}'", config.name))?;
        pool.add(Box::new(strategy));
    }

    info!(
        strategies = pool.len(),
        preference = %preference,
        date = %execute_date,
        parallel = pool_config.parallel,
        "running pool"
    );
    let outcome = pool.execute(execute_date);

    let report = match &outcome {
        PoolOutcome::Selected { strategy_index, .. } => {
            let names = strategies
                .get(*strategy_index)
                .map(|c| c.symbol_names.clone())
                .unwrap_or_default();
            PortfolioReport::from_outcome(&outcome, &names)
        }
        PoolOutcome::NoMatch { .. } => PortfolioReport::from_outcome(&outcome, &BTreeMap::new()),
    };
    print_outcome(&outcome, report.as_ref());

    if let Some(out) = output {
        let json = serde_json::json!({ "outcome": outcome, "report": report });
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("writing {}", out.display()))?;
        println!("Result saved to: {}", out.display());
    }
    Ok(())
}

fn print_outcome(outcome: &PoolOutcome, report: Option<&PortfolioReport>) {
    println!();
    match (outcome, report) {
        (PoolOutcome::Selected { strategy_index, .. }, Some(r)) => {
            println!("=== Selected Portfolio ===");
            println!("Strategy:       {} (#{strategy_index})", r.strategy_name);
            println!("Execute date:   {}", r.execute_date);
            println!();
            println!("{:<12} {:<28} {:>8}", "Symbol", "Name", "Weight");
            println!("{}", "-".repeat(50));
            for (sym, name) in r.selected_stocks.iter().zip(&r.selected_stock_names) {
                let weight = r.stocks_ratio.get(sym).map_or("-", String::as_str);
                println!("{sym:<12} {name:<28} {weight:>8}");
            }
            println!();
            println!("--- Validation Performance ---");
            println!("Cumulative:     {}", r.cumulative_return);
            println!("Annual return:  {}", r.annual_return);
            println!("Annual vol:     {}", r.annual_volatility);
            println!("Sharpe:         {}", r.sharpe_ratio);
            println!("Max drawdown:   {}", r.mdd);
        }
        (PoolOutcome::NoMatch { message, .. }, _) => {
            println!("No portfolio today: {message}");
        }
        (PoolOutcome::Selected { .. }, None) => warn!("selected outcome without a report"),
    }
    println!();
}

// ─── clean ───────────────────────────────────────────────────────────

fn run_clean(path: &Path, days: u32) -> Result<()> {
    let config = load_strategy(path)?;
    let mut pipelines = config.read_only_pipelines(Clock::System)?;
    let mut total = 0;
    for pipeline in &mut pipelines {
        let removed = pipeline
            .clean_old_data(days)
            .with_context(|| format!("cleaning {}", pipeline.symbol()))?;
        println!("{:<12} {removed:>4} month(s) removed", pipeline.symbol());
        total += removed;
    }
    println!("Done. Removed {total} month partition(s) older than {days} days.");
    Ok(())
}

// ─── export ──────────────────────────────────────────────────────────

fn run_export(path: &Path, out: &Path) -> Result<()> {
    let config = load_strategy(path)?;
    let pipelines = config.read_only_pipelines(Clock::System)?;
    let series = pipelines
        .iter()
        .map(|p| Ok((p.symbol().to_string(), p.get_all_data()?)))
        .collect::<Result<Vec<_>>>()?;
    let panel = PricePanel::inner_join(series)?;
    if panel.is_empty() {
        bail!("no dates shared by all symbols of '{}'; run `update` first", config.name);
    }
    write_panel_parquet(&panel, out).with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Exported {} rows x {} symbols ({} to {}) to {}",
        panel.n_rows(),
        panel.n_cols(),
        panel.first_date().map(|d| d.to_string()).unwrap_or_default(),
        panel.last_date().map(|d| d.to_string()).unwrap_or_default(),
        out.display()
    );
    Ok(())
}
