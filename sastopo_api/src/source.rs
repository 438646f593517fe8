use std::path::{Path, PathBuf};

use anyhow::Error;

use crate::error::AttributeError;

/// Read-only access to the host's hardware metadata tree (sysfs).
///
/// Paths are always expressed in the tree's own namespace, i.e. starting with
/// `/sys`, independently of where the implementation actually reads from.
pub trait AttributeSource: Sync {
    /// Lists the names of the entries under `path`, sorted by name.
    fn list_children(&self, path: &Path) -> Result<Vec<String>, AttributeError>;

    /// Reads the attribute `name` of `path`, with surrounding whitespace
    /// removed.
    fn read_attribute(&self, path: &Path, name: &str) -> Result<String, AttributeError>;

    /// Reads the raw bytes of the attribute `name` of `path`.
    fn read_raw_attribute(&self, path: &Path, name: &str) -> Result<Vec<u8>, AttributeError>;

    /// Resolves every link in `path`.
    fn resolve(&self, path: &Path) -> Result<PathBuf, AttributeError>;

    /// Reads the attribute `name` of `path` as a decimal integer.
    fn read_int_attribute(&self, path: &Path, name: &str) -> Result<i64, AttributeError> {
        let value = self.read_attribute(path, name)?;
        value
            .parse()
            .map_err(|_| AttributeError::NotAnInteger {
                path: path.join(name),
                value,
            })
    }
}

/// Runs the vendor diagnostic tool against a device special file and returns
/// its raw standard output.
pub trait DiagnosticRunner: Sync {
    fn diagnostic_page(&self, page: u8, device: &Path) -> Result<Vec<u8>, Error>;
}
