mod config;
mod render;
mod runner;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use checker_core::{Msg, PersonName};
use checker_engine::{EngineEvent, EngineHandle, FileTaskHandleStore};
use checker_logging::checker_info;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use crate::config::{AppConfig, API_URL_ENV};
use crate::render::Console;
use crate::runner::EffectRunner;

#[derive(Parser)]
#[command(name = "checker")]
#[command(about = "Look up a person across court registries", long_about = None)]
struct Cli {
    /// Base URL of the checker API, e.g. http://host:8000/api/v1
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Config file (defaults to ./checker.ron when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Verify courts and run a check against them
    Check(CheckArgs),
    /// Re-attach to the check left running by an earlier session
    Resume,
    /// Show queue and latency health of the service
    Health,
    /// Forget the persisted check
    Dismiss,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(long)]
    surname: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    patronymic: Option<String>,
    /// Court site to search; repeat for several
    #[arg(long = "court", required = true)]
    courts: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?
        .apply_overrides(std::env::var(API_URL_ENV).ok(), cli.api_url.clone());

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    checker_logging::initialize(config.log_destination(cli.verbose), level);
    checker_info!("Using API at {}", config.api_url);

    match cli.command {
        Commands::Check(args) => run_check(&mut session_runner(&config, cli.json), args),
        Commands::Resume => run_resume(&mut session_runner(&config, cli.json)),
        Commands::Health => run_health(&EngineHandle::new(config.client_settings()), cli.json),
        Commands::Dismiss => {
            session_runner(&config, cli.json).dispatch(Msg::Dismissed);
            println!("Cleared the saved check.");
            Ok(())
        }
    }
}

fn session_runner(config: &AppConfig, json: bool) -> EffectRunner {
    EffectRunner::new(
        EngineHandle::new(config.client_settings()),
        Box::new(FileTaskHandleStore::new(config.state_dir.clone())),
        Console::new(json),
    )
}

fn run_check(runner: &mut EffectRunner, args: CheckArgs) -> Result<()> {
    if runner.store().load().ok().flatten().is_some() {
        runner
            .console()
            .notice("replacing an unfinished check; use `resume` to continue it instead");
    }
    for court in args.courts {
        runner.dispatch(Msg::AddSourceRequested(court));
        runner.drive()?;
    }
    if runner.session().sources().is_empty() {
        bail!("none of the courts could be verified");
    }

    let mut person = PersonName::new(args.surname);
    if let Some(name) = args.name {
        person = person.with_name(name);
    }
    if let Some(patronymic) = args.patronymic {
        person = person.with_patronymic(patronymic);
    }
    runner.dispatch(Msg::CheckRequested(person));
    runner.drive()?;
    finish(runner)
}

fn run_resume(runner: &mut EffectRunner) -> Result<()> {
    let saved = runner
        .store()
        .load()
        .context("failed to read the saved check")?;
    if saved.is_none() {
        println!("No check in progress.");
        return Ok(());
    }
    runner.dispatch(Msg::Loaded { saved });
    runner.drive()?;
    finish(runner)
}

fn finish(runner: &EffectRunner) -> Result<()> {
    match runner.session().result() {
        Some(result) => runner.console().print_result(result),
        None => bail!("check did not complete"),
    }
}

fn run_health(engine: &EngineHandle, json: bool) -> Result<()> {
    engine.poll_health();
    loop {
        match engine.recv().context("network engine stopped unexpectedly")? {
            EngineEvent::Health(Ok(report)) => return Console::new(json).print_health(&report),
            EngineEvent::Health(Err(err)) => bail!("health poll failed: {err}"),
            _ => continue,
        }
    }
}
