use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;
mod commands;
mod config;
mod eventlog;
mod sink;
mod transport;

use cli::{Cli, Commands};
use commands::emit::EmitArgs;
use config::{Config, LogLevel};
use eventlog::EventLog;
use eventlog::delivery::DeliveryOptions;
use transport::{MemoryTransport, StaticPage};

fn setup_logging(log_level: &LogLevel) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagelog")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("pagelog.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(match log_level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        });
    }

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Build the process-wide event log and register configured listeners.
/// Returns the recorder when running dry.
fn setup_event_log(config: &Config, dry_run: bool) -> Result<Option<Arc<MemoryTransport>>> {
    let (log, recorder) = if dry_run {
        let recorder = Arc::new(MemoryTransport::new());
        let defaults = DeliveryOptions {
            url: config.collector.endpoint.clone(),
            ..DeliveryOptions::default()
        };
        let log = EventLog::new(recorder.clone(), Arc::new(StaticPage(config.collector.page.clone())))
            .with_defaults(defaults);
        (log, Some(recorder))
    } else {
        (EventLog::from_config(&config.collector)?, None)
    };

    let events_dir = Config::expand_path(&config.paths.events);
    let count = sink::register_all(&log, &config.listeners, &events_dir)?;
    info!("Registered {} configured listener(s)", count);

    eventlog::install(log)?;
    Ok(recorder)
}

fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Emit {
            event_type,
            data,
            element,
            method,
            blocking,
            url,
        } => commands::emit::run(EmitArgs {
            event_type,
            data,
            element,
            method,
            blocking,
            url,
        }),
        Commands::Replay { file, no_flush } => commands::replay::run(file.as_deref(), no_flush),
        Commands::Listeners { format } => commands::listeners::run(cli::OutputFormat::resolve(format), &config),
        Commands::Config { action } => commands::config::run(action, &config),
        Commands::Completions { shell } => commands::completions::run(shell, &mut io::stdout()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(page) = &cli.page {
        config.collector.page = page.clone();
    }

    setup_logging(&config.log_level).context("Failed to setup logging")?;

    info!("Starting pagelog with config from: {:?}", cli.config);

    let recorder = setup_event_log(&config, cli.dry_run).context("Failed to set up event log")?;

    let result = run(cli, config);

    // Recorded requests are printed even when the command failed part way
    if let Some(recorder) = recorder {
        print_dry_run(&recorder)?;
    }

    result.context("Command failed")
}

/// Prefix on each recorded request line, keeping them apart from listener output
const DRY_RUN_MARKER: &str = "dry-run";

fn print_dry_run(recorder: &MemoryTransport) -> Result<()> {
    for request in recorder.requests() {
        println!("{} {}", DRY_RUN_MARKER, serde_json::to_string(&request)?);
    }
    Ok(())
}
