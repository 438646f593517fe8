//! Decoding of enclosure serial numbers out of SES diagnostic pages.

use anyhow::{ensure, Context, Error};

use sastopo_api::config::SesLayout;

use super::identity::printable_serial;

/// Decodes the textual hex dump printed by `sg_ses --raw` into bytes. All
/// whitespace, including line breaks, is ignored.
pub fn decode_hex_dump(dump: &[u8]) -> Result<Vec<u8>, Error> {
    let compact = dump
        .iter()
        .copied()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect::<Vec<_>>();
    hex::decode(compact).context("Failed to decode SES page hex dump")
}

/// Extracts the serial number from a decoded SES element descriptor page.
pub fn serial_from_page(page: &[u8], layout: SesLayout) -> Result<String, Error> {
    let end = layout
        .end()
        .with_context(|| format!("SES layout {layout:?} extends past the addressable range"))?;
    ensure!(
        page.len() >= end,
        "SES page is {} bytes long, serial expected at bytes {}..{}",
        page.len(),
        layout.offset,
        end
    );
    Ok(printable_serial(&page[layout.offset..end]))
}

/// Extracts the serial number from the raw output of `sg_ses --raw`.
pub fn serial_from_dump(dump: &[u8], layout: SesLayout) -> Result<String, Error> {
    serial_from_page(&decode_hex_dump(dump)?, layout)
}
