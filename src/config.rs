use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Error};
use log::debug;

use sastopo_api::{config::Conf, constants::CONFIG_PATH};

/// Values from the command line that take precedence over the configuration
/// file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub expected_path_count: Option<usize>,
    pub path_prefix_match_depth: Option<usize>,
    pub dev_root: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(&self, conf: &mut Conf) {
        if let Some(count) = self.expected_path_count {
            conf.expected_path_count = count;
        }
        if let Some(depth) = self.path_prefix_match_depth {
            conf.path_prefix_match_depth = depth;
        }
        if let Some(dev_root) = &self.dev_root {
            conf.dev_root = dev_root.clone();
        }
    }
}

/// Parses a configuration file.
pub fn parse(contents: &str) -> Result<Conf, Error> {
    let conf: Conf = if contents.trim().is_empty() {
        Conf::default()
    } else {
        serde_yaml::from_str(contents).context("Failed to parse configuration")?
    };
    Ok(conf)
}

pub fn validate(conf: &Conf) -> Result<(), Error> {
    ensure!(
        conf.path_prefix_match_depth > 0,
        "path-prefix-match-depth must be at least 1"
    );
    for (model, layout) in &conf.ses_layouts {
        ensure!(
            layout.length > 0,
            "SES layout of model '{model}' must have a non-zero length"
        );
        ensure!(
            layout.end().is_some(),
            "SES layout of model '{model}' extends past the addressable range"
        );
    }
    ensure!(conf.ses_timeout_secs > 0, "ses-timeout-secs must be at least 1");
    Ok(())
}

/// Loads the configuration from `path`, or from the default location when
/// None. A missing file is only an error when it was explicitly requested.
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Conf, Error> {
    let mut conf = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read configuration '{}'", path.display()))?;
            parse(&contents)
                .with_context(|| format!("Invalid configuration '{}'", path.display()))?
        }
        None => match fs::read_to_string(CONFIG_PATH) {
            Ok(contents) => parse(&contents)
                .with_context(|| format!("Invalid configuration '{CONFIG_PATH}'"))?,
            Err(e) => {
                debug!("Using the default configuration, cannot read '{CONFIG_PATH}': {e}");
                Conf::default()
            }
        },
    };

    overrides.apply(&mut conf);
    validate(&conf)?;
    debug!("Configuration: {conf:?}");

    Ok(conf)
}
