//! In-memory stand-ins for the hardware metadata tree and the vendor
//! diagnostic tool.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Error};

use sastopo_api::{error::AttributeError, AttributeSource, DiagnosticRunner};

#[derive(Debug, Default)]
pub struct MemorySource {
    dirs: BTreeSet<PathBuf>,
    attributes: BTreeMap<PathBuf, Vec<u8>>,
    links: BTreeMap<PathBuf, PathBuf>,
}

impl MemorySource {
    fn add_dir(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.add_dir(Path::new(path));
        self
    }

    pub fn with_attribute(self, dir: &str, name: &str, value: &str) -> Self {
        self.with_raw_attribute(dir, name, value.as_bytes())
    }

    pub fn with_raw_attribute(mut self, dir: &str, name: &str, value: &[u8]) -> Self {
        self.add_dir(Path::new(dir));
        self.attributes
            .insert(Path::new(dir).join(name), value.to_vec());
        self
    }

    pub fn with_link(mut self, path: &str, target: &str) -> Self {
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.links.insert(path.to_path_buf(), PathBuf::from(target));
        self
    }

    fn children(&self, path: &Path) -> BTreeSet<String> {
        self.dirs
            .iter()
            .chain(self.attributes.keys())
            .chain(self.links.keys())
            .filter(|entry| entry.parent() == Some(path))
            .filter_map(|entry| entry.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

impl AttributeSource for MemorySource {
    fn list_children(&self, path: &Path) -> Result<Vec<String>, AttributeError> {
        if !self.dirs.contains(path) {
            return Err(AttributeError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(self.children(path).into_iter().collect())
    }

    fn read_attribute(&self, path: &Path, name: &str) -> Result<String, AttributeError> {
        let raw = self.read_raw_attribute(path, name)?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    fn read_raw_attribute(&self, path: &Path, name: &str) -> Result<Vec<u8>, AttributeError> {
        self.attributes
            .get(&path.join(name))
            .cloned()
            .ok_or_else(|| AttributeError::NotFound {
                path: path.join(name),
            })
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, AttributeError> {
        if let Some(target) = self.links.get(path) {
            return Ok(target.clone());
        }
        if self.dirs.contains(path) || self.attributes.contains_key(path) {
            return Ok(path.to_path_buf());
        }
        Err(AttributeError::NotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Diagnostic runner returning canned outputs, by device special file.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    outputs: BTreeMap<PathBuf, Result<Vec<u8>, String>>,
    calls: Mutex<Vec<(u8, PathBuf)>>,
}

impl ScriptedRunner {
    pub fn with_output(mut self, device: impl Into<PathBuf>, output: &str) -> Self {
        self.outputs
            .insert(device.into(), Ok(output.as_bytes().to_vec()));
        self
    }

    pub fn with_failure(mut self, device: impl Into<PathBuf>, message: &str) -> Self {
        self.outputs.insert(device.into(), Err(message.into()));
        self
    }

    pub fn calls(&self) -> Vec<(u8, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl DiagnosticRunner for ScriptedRunner {
    fn diagnostic_page(&self, page: u8, device: &Path) -> Result<Vec<u8>, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((page, device.to_path_buf()));
        match self.outputs.get(device) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(message)) => Err(anyhow!("{message}")),
            None => Err(anyhow!("No output scripted for '{}'", device.display())),
        }
    }
}

/// Formats bytes the way `sg_ses --raw` does: 16 space-separated hex bytes
/// per line.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|line| {
            line.iter()
                .map(|byte| format!("{byte:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}
