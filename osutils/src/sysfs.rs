//! Read-only access to sysfs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use sastopo_api::{constants::SYSFS_ROOT, error::AttributeError, AttributeSource};

/// Reads the hardware metadata tree from a sysfs mount.
///
/// Paths given to and returned by this source always live under `/sys`. The
/// tree itself may be mounted anywhere, which allows reading a captured copy
/// of another host's sysfs.
#[derive(Debug, Clone)]
pub struct Sysfs {
    mount: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self {
            mount: PathBuf::from(SYSFS_ROOT),
        }
    }
}

impl Sysfs {
    /// Reads the tree mounted at `mount` instead of `/sys`.
    pub fn with_mount(mount: impl AsRef<Path>) -> Result<Self, AttributeError> {
        let mount = mount
            .as_ref()
            .canonicalize()
            .map_err(|e| AttributeError::from_io(mount.as_ref(), e))?;
        debug!("Reading sysfs from '{}'", mount.display());
        Ok(Self { mount })
    }

    /// Translates a path under `/sys` into a path under the mount.
    fn host_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(SYSFS_ROOT) {
            Ok(relative) => self.mount.join(relative),
            Err(_) => self.mount.join(path.strip_prefix("/").unwrap_or(path)),
        }
    }

    /// Translates a path under the mount back into a path under `/sys`.
    fn tree_path(&self, host_path: &Path) -> Option<PathBuf> {
        host_path
            .strip_prefix(&self.mount)
            .ok()
            .map(|relative| Path::new(SYSFS_ROOT).join(relative))
    }
}

impl AttributeSource for Sysfs {
    fn list_children(&self, path: &Path) -> Result<Vec<String>, AttributeError> {
        let host_path = self.host_path(path);
        let mut children = fs::read_dir(&host_path)
            .map_err(|e| AttributeError::from_io(path, e))?
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        children.sort();
        Ok(children)
    }

    fn read_attribute(&self, path: &Path, name: &str) -> Result<String, AttributeError> {
        let raw = self.read_raw_attribute(path, name)?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    fn read_raw_attribute(&self, path: &Path, name: &str) -> Result<Vec<u8>, AttributeError> {
        fs::read(self.host_path(&path.join(name)))
            .map_err(|e| AttributeError::from_io(path.join(name), e))
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, AttributeError> {
        let resolved = self
            .host_path(path)
            .canonicalize()
            .map_err(|e| AttributeError::from_io(path, e))?;

        // A link leaving the mount can't be expressed as a sysfs path.
        self.tree_path(&resolved)
            .ok_or_else(|| AttributeError::NotFound {
                path: path.to_path_buf(),
            })
    }
}
