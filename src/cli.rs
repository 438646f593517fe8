use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use sastopo_api::constants::SYSFS_ROOT;

use crate::{config::Overrides, report::OutputFormat, SASTOPO_VERSION};

#[derive(Parser, Debug)]
#[clap(version = SASTOPO_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover the host's SAS topology
    Discover(DiscoverArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Discover(_) => "discover",
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DiscoverArgs {
    /// Path to the configuration file [default: /etc/sastopo/config.yaml, if present]
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Show a summary of the SAS devices (default)
    #[clap(short, long, overrides_with = "no_summary")]
    pub summary: bool,

    /// Don't show the summary of the SAS devices
    #[clap(long, overrides_with = "summary")]
    pub no_summary: bool,

    /// Show the devices whose path count differs from the expected one
    #[clap(short, long)]
    pub mismatch: bool,

    /// Number of expected paths to each SAS device
    #[clap(short = 'p', long)]
    pub path_count: Option<usize>,

    /// Number of leading sysfs path elements shared by an enclosure and its
    /// devices
    #[clap(long)]
    pub sysfs_match_path_encl: Option<usize>,

    /// Where sysfs is mounted
    #[clap(long, default_value = SYSFS_ROOT)]
    pub sysfs_root: PathBuf,

    /// Directory holding the device special files
    #[clap(long)]
    pub dev_root: Option<PathBuf>,

    /// Output format
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to save the output to instead of stdout
    #[clap(short, long)]
    pub outfile: Option<PathBuf>,
}

impl DiscoverArgs {
    pub fn show_summary(&self) -> bool {
        !self.no_summary
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            expected_path_count: self.path_count,
            path_prefix_match_depth: self.sysfs_match_path_encl,
            dev_root: self.dev_root.clone(),
        }
    }
}
