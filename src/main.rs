//! stepwatch - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use stepwatch::{
    cli::{print_failure, print_summary, Args, Commands, ProgressBarSink, Verbosity},
    config::RunConfig,
    run::{JsonLinesSink, NullSink, RunController, StatusSink},
    solver::relaxation_factory,
    telemetry::TelemetryDisplay,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbosity());

    let mut config = RunConfig::load(args.config.clone()).context("failed to load configuration")?;
    args.apply_overrides(&mut config);

    match args.command() {
        Commands::Run => run_solver(&args, config).await,
        Commands::Config => show_config(&config),
    }
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_solver(args: &Args, config: RunConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let verbosity = args.verbosity();

    let bar = (!args.json && verbosity.show_progress()).then(|| Arc::new(ProgressBarSink::new()));
    let sink: Arc<dyn StatusSink> = match &bar {
        Some(bar) => bar.clone() as Arc<dyn StatusSink>,
        None if args.json => Arc::new(JsonLinesSink::new(std::io::stdout())),
        None => Arc::new(NullSink),
    };

    if verbosity.show_progress() && !args.json {
        let mode = match config.termination.measurement {
            Some(measurement) => format!(
                "steady {} within {:e}",
                measurement.as_str(),
                config.termination.tolerance
            ),
            None => format!("fixed end time {}", config.termination.t_end),
        };
        println!("{} {}", "stepwatch".bold().cyan(), mode.dimmed());
    }

    let controller = Arc::new(RunController::new(config, relaxation_factory()).with_sink(sink));
    let handle = controller.start().context("failed to start run")?;
    info!(run_id = %handle.id(), "supervising run");

    let interrupt = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping run");
            if let Err(err) = interrupt.stop() {
                warn!(%err, "stop after interrupt failed");
            }
        }
    });

    let waiter = controller.clone();
    let outcome = tokio::task::spawn_blocking(move || waiter.wait())
        .await
        .context("wait task panicked")?;

    if let Some(bar) = &bar {
        bar.finish();
    }

    let display = TelemetryDisplay::new(controller.telemetry().clone(), verbosity);
    match outcome {
        Ok(summary) => {
            if args.json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                print_summary(&summary);
                display.display_summary();
            }
            Ok(())
        }
        Err(err) => {
            if !args.json {
                print_failure(&err.to_string());
                display.display_summary();
            }
            Err(err).context("run failed")
        }
    }
}

fn show_config(config: &RunConfig) -> Result<()> {
    let rendered = config.to_toml().context("failed to render configuration")?;
    if let Some(path) = RunConfig::default_path() {
        println!("{}", format!("# default location: {}", path.display()).dimmed());
    }
    print!("{}", rendered);
    Ok(())
}
