//! Sluice CLI - drain a task queue through a quota-limited transformer.

use anyhow::Context;
use clap::Parser;
use sluice_cli::cli::EnqueueArgs;
use sluice_cli::{logging, Cli, Command, Config, Formatter};
use sluice_gatekeeper::Gatekeeper;
use sluice_llm::HttpTransformer;
use sluice_pipeline::{Driver, RunMode};
use sluice_store::{SqliteDestination, SqliteTaskStore};
use std::process::ExitCode;
use std::sync::Arc;

type CliDriver = Driver<SqliteTaskStore, HttpTransformer, SqliteDestination>;

/// Exit status for a run that ended with a fatal store error
const EXIT_FATAL_RUN: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_overrides(&cli)?;

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Some(Command::ShowConfig) => {
            println!("{}", config.to_toml()?);
        }
        Some(Command::Enqueue(args)) => {
            let payload_refs = collect_payload_refs(args)?;
            let driver = build_driver(&config)?;
            let ids = driver.enqueue(&payload_refs).await?;
            println!("{}", formatter.count(ids.len() as u64, "tasks enqueued"));
        }
        Some(Command::Sweep(args)) => {
            let driver = build_driver(&config)?;
            let count = driver.sweep(args.dry_run).await?;
            let message = if args.dry_run {
                "tasks would be reclaimed"
            } else {
                "tasks reclaimed"
            };
            println!("{}", formatter.count(count, message));
        }
        Some(Command::RetryFailed(args)) => {
            let driver = build_driver(&config)?;
            let count = driver.retry_failed(args.max_retries).await?;
            println!("{}", formatter.count(count, "failed tasks requeued"));
        }
        Some(Command::Status) => {
            let driver = build_driver(&config)?;
            println!("{}", formatter.format_status(&driver.status().await?)?);
        }
        None => match cli.run.mode.run_mode() {
            Some(mode) => {
                let driver = build_driver(&config)?;
                return run_mode(&driver, mode, &formatter).await;
            }
            None => {
                let driver = build_driver(&config)?;
                println!("{}", formatter.format_status(&driver.status().await?)?);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_mode(driver: &CliDriver, mode: RunMode, formatter: &Formatter) -> anyhow::Result<ExitCode> {
    let cancel = driver.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, letting in-flight tasks finish");
            cancel.cancel();
        }
    });

    let report = driver.run(mode).await;
    println!("{}", formatter.format_report(&report)?);

    if report.termination.is_fatal() {
        Ok(ExitCode::from(EXIT_FATAL_RUN))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn build_driver(config: &Config) -> sluice_cli::Result<CliDriver> {
    let store = SqliteTaskStore::new(&config.database)?;
    let destination = SqliteDestination::new(&config.destination_database)?;

    let mut transformer = HttpTransformer::with_timeout(
        config.transformer.endpoint.clone(),
        config.transformer.model.clone(),
        config.pipeline.call_timeout(),
    )?;
    if let Some(api_key) = config.transformer.api_key() {
        transformer = transformer.with_api_key(api_key);
    }

    let driver = Driver::new(
        Arc::new(store),
        Arc::new(transformer),
        Arc::new(destination),
        config.pipeline.clone(),
    )?
    .with_gatekeeper(Gatekeeper::new(config.validation.clone()))
    .with_janitor_config(config.janitor.clone())?;

    Ok(driver)
}

fn collect_payload_refs(args: EnqueueArgs) -> anyhow::Result<Vec<String>> {
    let mut payload_refs = args.payload_refs;

    if let Some(path) = args.file {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read payload list {}", path.display()))?;
        payload_refs.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }

    if payload_refs.is_empty() {
        anyhow::bail!("No payload references given");
    }
    Ok(payload_refs)
}
