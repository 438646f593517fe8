use std::process::ExitCode;

use anyhow::{Context, Error};
use clap::Parser;
use log::{error, info, LevelFilter};

use sastopo::{
    cli::{Cli, Commands},
    config, MultiLogger, WarningLog, SASTOPO_VERSION,
};

fn setup_logging(args: &Cli) -> Result<WarningLog, Error> {
    let warnings = WarningLog::create();

    MultiLogger::new()
        // Add regular env_logger to output to stderr
        .with_logger(Box::new(
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(args.verbosity)
                .build(),
        ))
        // Keep warnings so they can be reported with the topology, unless
        // the user silenced them
        .with_logger(
            warnings
                .make_logger()
                .with_max_level(args.verbosity.min(LevelFilter::Warn)),
        )
        // Command output reports contain whole SES pages
        .with_global_filter("osutils::dependencies", LevelFilter::Debug)
        .with_max_level(args.verbosity)
        .init()
        .context("Logger already registered")?;

    Ok(warnings)
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // Initialize the loggers
    let warnings = match setup_logging(&args) {
        Ok(warnings) => warnings,
        Err(e) => {
            error!("Failed to initialize logging: {e:?}");
            return ExitCode::from(1);
        }
    };

    info!("sastopo version: {SASTOPO_VERSION}");

    match &args.command {
        Commands::Discover(discover_args) => {
            let conf = match config::load(
                discover_args.config.as_deref(),
                &discover_args.overrides(),
            ) {
                Ok(conf) => conf,
                Err(e) => {
                    error!("Failed to load configuration: {e:?}");
                    return ExitCode::from(1);
                }
            };

            if let Err(e) = sastopo::run_discover(discover_args, &conf, &warnings) {
                error!("Failed to execute '{}' command: {e:?}", args.command);
                return ExitCode::from(2);
            }
        }
    }

    ExitCode::SUCCESS
}
