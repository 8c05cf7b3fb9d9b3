//! PHP worker sizer CLI
//!
//! Sizes PHP-FPM pools and FrankenPHP worker/thread settings from the memory,
//! CPUs and worker footprint of the current host, and drives HTTP load to
//! check a recommendation.

mod args;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sizer_lib::error::EXIT_FAILURE;
use sizer_lib::probe::SystemProbe;
use sizer_lib::sizing::PhpCliInspector;
use sizer_lib::SizerError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{FpmArgs, LoadArgs, ProbeArgs, WorkerArgs};
use commands::{fpm, load, probe, worker};
use config::{Config, FixedProcessConfig, LoadConfig, ThreadedWorkerConfig};

/// PHP worker sizer
#[derive(Parser)]
#[command(name = "php-sizer")]
#[command(author, version, about = "Size PHP-FPM pools and FrankenPHP workers for this host", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, env = "PHP_SIZER_FORMAT", default_value = "table")]
    pub format: output::OutputFormat,

    /// Defaults file (JSON) [default: ~/.config/php-sizer/config.json]
    #[arg(long, global = true, env = "PHP_SIZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Size a PHP-FPM process pool
    Fpm(FpmArgs),

    /// Size FrankenPHP workers and threads
    Worker(WorkerArgs),

    /// Show the memory, CPUs and worker processes seen on this host
    Probe(ProbeArgs),

    /// Drive HTTP load against an endpoint
    Load(LoadArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let defaults = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Fpm(args) => {
            let config = FixedProcessConfig::resolve(&args, &defaults.fpm)?;
            fpm::run(config, &SystemProbe::new(), cli.format)?;
        }
        Commands::Worker(args) => {
            let config = ThreadedWorkerConfig::resolve(&args, &defaults.worker)?;
            worker::run(config, &SystemProbe::new(), PhpCliInspector::default(), cli.format)?;
        }
        Commands::Probe(args) => {
            probe::run(&SystemProbe::new(), &args.pattern, cli.format)?;
        }
        Commands::Load(args) => {
            let config = LoadConfig::resolve(&args, &defaults.load)?;
            let sizing = ThreadedWorkerConfig::resolve(&args.sizing, &defaults.worker)?;
            load::run(
                config,
                sizing,
                &SystemProbe::new(),
                PhpCliInspector::default(),
                cli.format,
            )
            .await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            let code = e
                .downcast_ref::<SizerError>()
                .map(SizerError::exit_code)
                .unwrap_or(EXIT_FAILURE);
            ExitCode::from(code as u8)
        }
    }
}
