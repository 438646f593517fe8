use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_EXPECTED_PATH_COUNT, DEFAULT_PATH_PREFIX_MATCH_DEPTH, DEFAULT_SES_TIMEOUT_SECS,
    DEV_ROOT,
};

/// Location of the enclosure serial number inside SES diagnostic page 0x7.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SesLayout {
    /// Offset of the first serial byte in the decoded page.
    pub offset: usize,

    /// Number of serial bytes.
    pub length: usize,
}

impl SesLayout {
    /// Offset just past the last serial byte, or None when it can't be
    /// addressed.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.length)
    }
}

/// Enclosure models that don't report their serial through VPD page 0x80, and
/// where to find it in the element descriptor page instead.
pub const BUILTIN_SES_LAYOUTS: &[(&str, SesLayout)] = &[
    (
        "SA4600",
        SesLayout {
            offset: 2068,
            length: 16,
        },
    ),
    (
        "SP-3584",
        SesLayout {
            offset: 2327,
            length: 10,
        },
    ),
];

/// Discovery configuration. Built once, then passed by reference to the
/// discovery engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Conf {
    /// Number of paths expected to reach every device. Only used for
    /// reporting.
    pub expected_path_count: usize,

    /// Number of leading device path elements that must match between a
    /// device and an enclosure.
    pub path_prefix_match_depth: usize,

    /// Human readable slot labels of the HBAs, by PCI bus id. For instance
    /// `"0000:11:00.0": C3`.
    pub hba_labels: BTreeMap<String, String>,

    /// Additional SES serial layouts, by exact model string. These take
    /// precedence over the built-in ones.
    pub ses_layouts: BTreeMap<String, SesLayout>,

    /// Timeout of the SES diagnostic command.
    pub ses_timeout_secs: u64,

    /// Directory holding the device special files.
    pub dev_root: PathBuf,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            expected_path_count: DEFAULT_EXPECTED_PATH_COUNT,
            path_prefix_match_depth: DEFAULT_PATH_PREFIX_MATCH_DEPTH,
            hba_labels: BTreeMap::new(),
            ses_layouts: BTreeMap::new(),
            ses_timeout_secs: DEFAULT_SES_TIMEOUT_SECS,
            dev_root: PathBuf::from(DEV_ROOT),
        }
    }
}

impl Conf {
    /// Returns the SES serial layout of an enclosure model, if it needs one.
    pub fn ses_layout(&self, model: &str) -> Option<SesLayout> {
        self.ses_layouts.get(model).copied().or_else(|| {
            BUILTIN_SES_LAYOUTS
                .iter()
                .find(|(builtin, _)| *builtin == model)
                .map(|(_, layout)| *layout)
        })
    }

    /// Returns the slot label of an HBA, if configured.
    pub fn hba_label(&self, bus_id: &str) -> Option<String> {
        self.hba_labels.get(bus_id).cloned()
    }

    pub fn ses_timeout(&self) -> Duration {
        Duration::from_secs(self.ses_timeout_secs)
    }
}
