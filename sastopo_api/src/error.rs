use std::path::PathBuf;

use strum_macros::IntoStaticStr;

/// Failure to read from the hardware metadata tree.
#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    #[error("Entry '{path}' does not exist")]
    NotFound { path: PathBuf },

    #[error("Failed to read '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Value '{value}' of '{path}' is not an integer")]
    NotAnInteger { path: PathBuf, value: String },
}

impl AttributeError {
    /// Builds the error matching an I/O failure on `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => AttributeError::NotFound { path: path.into() },
            _ => AttributeError::Read {
                path: path.into(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AttributeError::NotFound { .. })
    }
}

/// Per-device discovery failures. None of them aborts a discovery run; the
/// kind decides what happens to the device that produced it.
#[derive(Debug, thiserror::Error, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum DiscoveryError {
    /// The device is kept, without HBA and port.
    #[error("Unexpected sysfs path '{path}': must have at least {expected} elements, found {found}")]
    MalformedPath {
        path: String,
        expected: usize,
        found: usize,
    },

    /// The device is dropped.
    #[error("Failed to read attribute '{attribute}' of device '{device}'")]
    AttributeRead {
        device: String,
        attribute: &'static str,
        #[source]
        source: AttributeError,
    },

    /// The device is dropped.
    #[error("Unknown device type {class_code} for device '{device}'")]
    UnknownDeviceType { device: String, class_code: i64 },

    /// The device is kept without a serial.
    #[error("Failed to resolve serial of device '{device}': {reason}")]
    SerialResolution { device: String, reason: String },

    /// The device is kept without a serial.
    #[error("Diagnostic command failed for device '{device}': {reason}")]
    Subprocess { device: String, reason: String },
}

impl DiscoveryError {
    /// Short name of the error kind, e.g. "malformed-path".
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Whether the device that produced this error must be left out of the
    /// device table.
    pub fn drops_device(&self) -> bool {
        matches!(
            self,
            DiscoveryError::AttributeRead { .. } | DiscoveryError::UnknownDeviceType { .. }
        )
    }
}
