mod cli;
mod error;
mod report;

use crate::cli::{Cli, Command, RunArgs, SourceArgs};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use spoor_cache::{Database, Repository};
use spoor_config::{Config, SourceConfig};
use spoor_discover::{CancellationToken, HttpFetcher};
use spoor_pipeline::{Context, RunEvent, Stage};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SPOOR_LOG";

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let path = cli.config.as_deref();
    match cli.command {
        Command::Init => {
            let config = Config::read(path).or_raise(|| ErrorKind::Config)?;
            if let Some(parent) = config.database.parent() {
                tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Store)?;
            }
            open_store(&config.database, true).await?.close().await;
            println!("Tracking store ready at {}", config.database.display());
            Ok(ExitCode::SUCCESS)
        },
        Command::History => {
            let config = Config::read(path).or_raise(|| ErrorKind::Config)?;
            let db = open_store(&config.database, false).await?;
            let runs = Repository::from(&db).list_runs().await.or_raise(|| ErrorKind::Store)?;
            report::history(&runs);
            db.close().await;
            Ok(ExitCode::SUCCESS)
        },
        Command::Discover(args) => {
            let config = Config::load(path).or_raise(|| ErrorKind::Config)?;
            process(&config, &args, Stage::Discover, None).await
        },
        Command::Detect(args) => {
            let config = Config::load(path).or_raise(|| ErrorKind::Config)?;
            let db = open_store(&config.database, false).await?;
            let code = process(&config, &args, Stage::Detect, Some(Repository::new(db.pool().clone(), true))).await;
            db.close().await;
            code
        },
        Command::Run(RunArgs { sources, init, dry_run }) => {
            let config = Config::load(path).or_raise(|| ErrorKind::Config)?;
            if init && let Some(parent) = config.database.parent() {
                tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Store)?;
            }
            let db = open_store(&config.database, init).await?;
            let code = process(&config, &sources, Stage::Run, Some(Repository::new(db.pool().clone(), dry_run))).await;
            db.close().await;
            code
        },
    }
}

async fn open_store(path: &Path, create: bool) -> Result<Database> {
    let opened = if create { Database::connect(path).await } else { Database::open(path).await };
    match opened {
        Ok(db) => Ok(db),
        Err(err) if err.is_precondition() => Err(err.raise(ErrorKind::StoreMissing(path.to_path_buf()))),
        Err(err) => Err(err.raise(ErrorKind::Store)),
    }
}

fn select(config: &Config, args: &SourceArgs) -> Result<Vec<SourceConfig>> {
    match &args.source {
        None => Ok(config.sources.clone()),
        Some(slug) => {
            let source = config.source(slug).ok_or_raise(|| ErrorKind::UnknownSource(slug.clone()))?;
            Ok(vec![source.clone()])
        },
    }
}

/// Stream a run to the terminal. Exits with code 2 if any source failed.
async fn process(config: &Config, args: &SourceArgs, stage: Stage, repository: Option<Repository>) -> Result<ExitCode> {
    let sources = select(config, args)?;
    let fetcher = HttpFetcher::new().or_raise(|| ErrorKind::Fetcher)?;
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping after the current round");
                cancel.cancel();
            }
        }
    });

    let mut ctx = Context::new(Arc::new(fetcher), &config.output)
        .with_stage(stage)
        .with_delay_between_sources(config.delay_between_sources())
        .with_cancellation(cancel);
    if let Some(repository) = repository {
        ctx = ctx.with_repository(repository);
    }

    let mut failed = 0;
    let mut events = Box::pin(spoor_pipeline::run(&ctx, &sources));
    while let Some(event) = events.next().await {
        let event = event.or_raise(|| ErrorKind::Run)?;
        if let RunEvent::Complete(summary) = &event {
            failed = summary.failed;
        }
        report::event(&event);
    }
    Ok(if failed > 0 { ExitCode::from(2) } else { ExitCode::SUCCESS })
}
