use std::{path::Path, time::Duration};

use anyhow::{Context, Error};

use sastopo_api::DiagnosticRunner;

use crate::dependencies::Dependency;

/// Fetches SES diagnostic pages with `sg_ses`.
#[derive(Debug, Clone)]
pub struct SgSes {
    timeout: Duration,
}

impl SgSes {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl DiagnosticRunner for SgSes {
    /// Returns the textual hex dump printed by `sg_ses --raw`.
    fn diagnostic_page(&self, page: u8, device: &Path) -> Result<Vec<u8>, Error> {
        Dependency::SgSes
            .cmd()
            .arg(format!("--page=0x{page:x}"))
            .arg("--raw")
            .arg(device)
            .output_with_timeout(self.timeout)
            .and_then(|output| output.check_raw_stdout())
            .map_err(|e| Error::new(*e))
            .with_context(|| {
                format!(
                    "Failed to read SES page 0x{page:x} of '{}'",
                    device.display()
                )
            })
    }
}
