use std::fs;

use anyhow::{Context, Error};
use log::info;

use osutils::{sg_ses::SgSes, sysfs::Sysfs};
use sastopo_api::{config::Conf, Topology};

pub mod cli;
pub mod config;
pub mod discovery;
mod logging;
pub mod report;

#[cfg(test)]
pub mod testutils;

pub use logging::{
    multilog::MultiLogger,
    warnings::{WarningCollector, WarningLog},
    Level, LogEntry,
};

use cli::DiscoverArgs;
use report::{OutputFormat, Snapshot};

/// Sastopo version as provided by environment variables at build time
pub const SASTOPO_VERSION: &str = match option_env!("SASTOPO_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Renders a discovered topology the way `args` asks for.
pub fn render(
    args: &DiscoverArgs,
    conf: &Conf,
    topology: Topology,
    warnings: &WarningLog,
) -> Result<String, Error> {
    match args.format {
        OutputFormat::Text => {
            let mut output = String::new();
            if args.mismatch {
                output.push_str(&report::mismatch(&topology, conf.expected_path_count)?);
            }
            if args.show_summary() {
                output.push_str(&report::summary(&topology)?);
            }
            Ok(output)
        }
        format => report::serialize(
            &Snapshot {
                version: SASTOPO_VERSION.to_string(),
                topology,
                warnings: warnings.entries(),
            },
            format,
        ),
    }
}

/// Discovers the SAS topology of the host and writes the requested report.
pub fn run_discover(args: &DiscoverArgs, conf: &Conf, warnings: &WarningLog) -> Result<(), Error> {
    let sysfs = Sysfs::with_mount(&args.sysfs_root)
        .with_context(|| format!("Cannot use '{}' as sysfs", args.sysfs_root.display()))?;
    let runner = SgSes::new(conf.ses_timeout());

    let topology =
        discovery::discover(&sysfs, &runner, conf).context("Failed to discover SAS topology")?;
    let output = render(args, conf, topology, warnings)?;

    match &args.outfile {
        Some(path) => {
            fs::write(path, output)
                .with_context(|| format!("Failed to write output to '{}'", path.display()))?;
            info!("Wrote topology to '{}'", path.display());
        }
        None => print!("{output}"),
    }

    Ok(())
}
