use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;
use tickpoll::domain::{TaskFn, TaskSchema};
use tickpoll::poller::{Poller, PollerConfig};
use tickpoll::scheduler::{Scheduler, SchedulerContext};

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tickpoll")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tickpoll.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    env_logger::Builder::new()
        .parse_filters(level.unwrap_or("info"))
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Plan {
            rate,
            intervals,
            flooding,
        } => handle_plan_command(*rate, intervals, *flooding, config),
        Commands::Run {
            rate,
            intervals,
            flooding,
            duration_secs,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?;
            runtime.block_on(handle_run_command(*rate, intervals, *flooding, *duration_secs, config))
        }
    }
}

fn poller_config(rate: Option<f64>, config: &Config) -> PollerConfig {
    match rate {
        Some(rate) => PollerConfig::new(rate),
        None => config.poller_config(),
    }
}

fn demo_schemas(intervals: &[i64], flooding: usize) -> Vec<TaskSchema> {
    let work = || {
        TaskFn::sync(|args: &[Value]| {
            let name = args.first().cloned().unwrap_or(Value::Null);
            info!("Poll {} ran", name);
            Ok(name)
        })
    };

    let fixed = intervals
        .iter()
        .map(|interval| TaskSchema::new(work()).interval(*interval).args(vec![json!(format!("every-{}ms", interval))]));
    let shared = (0..flooding).map(|n| TaskSchema::new(work()).args(vec![json!(format!("flooding-{}", n))]));
    fixed.chain(shared).collect()
}

fn handle_plan_command(rate: Option<f64>, intervals: &[i64], flooding: usize, config: &Config) -> Result<()> {
    let poller_config = poller_config(rate, config);
    info!(
        "Planning quota {}/min for intervals {:?} plus {} flooding polls",
        poller_config.rate_per_min, intervals, flooding
    );

    // A scheduler that never starts; only the quota arithmetic matters here
    let mut poller = Poller::new(Scheduler::new(config.scheduler_config()), poller_config);

    match poller.add_polls(demo_schemas(intervals, flooding)) {
        Ok(_) => {
            println!("{} {}/min", "Quota:".green(), poller.rate_per_min());
            println!("{} {}/min", "Spare rate:".green(), poller.spare_rate());
            println!("{} {}ms", "Spare interval:".green(), poller.spare_interval());
            if poller.flooding_count() > 0 {
                println!(
                    "{} {}ms x {}",
                    "Flooding interval:".green(),
                    poller.interval_for_flooding_poll(),
                    poller.flooding_count()
                );
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Rejected:".red(), e);
            Err(e).context("Polls do not fit the quota")
        }
    }
}

async fn handle_run_command(
    rate: Option<f64>,
    intervals: &[i64],
    flooding: usize,
    duration_secs: u64,
    config: &Config,
) -> Result<()> {
    let ctx = SchedulerContext::new(config.scheduler_config());
    let mut poller = ctx.poller(poller_config(rate, config));

    let ids = poller
        .add_polls(demo_schemas(intervals, flooding))
        .context("Failed to register polls")?;
    println!("{} {} polls", "Registered:".green(), ids.len());
    if poller.flooding_count() > 0 {
        println!(
            "{} {}ms",
            "Flooding interval:".cyan(),
            poller.interval_for_flooding_poll()
        );
    }

    ctx.start();
    println!("{} {}s", "Running for".cyan(), duration_secs);
    tokio::time::sleep(Duration::from_secs(duration_secs)).await;

    let stats = ctx.stats.snapshot();
    poller.destroy();
    ctx.shutdown();

    info!("Run finished: {:?}", stats);
    println!("{}", "Stats:".green());
    println!("  successful runs: {}", stats.successful_runs);
    println!("  failed runs:     {}", stats.failed_runs);
    println!("  completed:       {}", stats.completed);
    println!("  idle/running:    {}/{}", stats.idle, stats.running);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
