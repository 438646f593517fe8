//! Rendering of discovered topologies.

use std::fmt::{self, Write};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use sastopo_api::{Device, Enclosure, LogicalUnitId, Topology};

use crate::logging::LogEntry;

/// Format of the discovery output.
#[derive(clap::ValueEnum, Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// Human readable summary and mismatch report
    #[default]
    Text,
    /// Full topology as JSON
    Json,
    /// Full topology as YAML
    Yaml,
}

/// Everything a discovery run produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub topology: Topology,
    pub warnings: Vec<LogEntry>,
}

fn or_unknown(value: Option<&str>) -> &str {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => "-",
    }
}

/// Returns the devices whose logical unit isn't reachable through the
/// expected number of paths. Devices without a unit have no path.
pub fn mismatched<'a>(topology: &'a Topology, expected_path_count: usize) -> Vec<(&'a Device, usize)> {
    topology
        .devices
        .values()
        .map(|device| (device, topology.path_count(device)))
        .filter(|(_, count)| *count != expected_path_count)
        .collect()
}

fn write_mismatch(
    out: &mut String,
    topology: &Topology,
    expected_path_count: usize,
) -> fmt::Result {
    for (device, count) in mismatched(topology, expected_path_count) {
        writeln!(
            out,
            "Path count mismatch: device '{}' (serial '{}'), found {count} path(s), expected {expected_path_count}",
            device.id, device.serial
        )?;
    }
    Ok(())
}

/// Renders one line per device reached through an unexpected number of
/// paths.
pub fn mismatch(topology: &Topology, expected_path_count: usize) -> Result<String, Error> {
    let mut out = String::new();
    write_mismatch(&mut out, topology, expected_path_count)
        .context("Failed to render path count mismatches")?;
    Ok(out)
}

fn unit_identity(topology: &Topology, unit: LogicalUnitId) -> (String, String, String) {
    match topology.representative(unit) {
        Some(device) => (
            device.vendor.clone(),
            device.model.clone(),
            device.serial.clone(),
        ),
        None => Default::default(),
    }
}

fn write_enclosure(out: &mut String, topology: &Topology, enclosure: &Enclosure) -> fmt::Result {
    let (vendor, model, serial) = unit_identity(topology, enclosure.logical_unit);
    writeln!(out, "Enclosure {}:", enclosure.id.0)?;
    writeln!(out, "    Vendor: {vendor}, Model: {model}, Serial: {serial}")?;

    writeln!(out, "    Paths:")?;
    for device in topology.unit_devices(enclosure.logical_unit) {
        let hba = device
            .hba
            .as_ref()
            .and_then(|bus_id| topology.hbas.get(bus_id));
        let phy_ids = match (hba, &device.port) {
            (Some(hba), Some(port)) => hba
                .port(port)
                .map(|port| port.phy_ids().join(","))
                .unwrap_or_default(),
            _ => String::new(),
        };
        writeln!(
            out,
            "        HBA: {}, Label: {}, Port: {}, Phy IDs: {}",
            or_unknown(device.hba.as_deref()),
            or_unknown(hba.and_then(|hba| hba.label.as_deref())),
            or_unknown(device.port.as_deref()),
            or_unknown(Some(phy_ids.as_str())),
        )?;
    }

    writeln!(out, "    Slots: {} populated", enclosure.slots.len())?;
    for (slot, unit) in &enclosure.slots {
        let (vendor, model, serial) = unit_identity(topology, *unit);
        writeln!(out, "    Slot {slot}:")?;
        writeln!(
            out,
            "        Vendor: {vendor}, Model: {model}, Serial: {serial}"
        )?;
        writeln!(out, "        Paths:")?;
        for device in topology.unit_devices(*unit) {
            let label = device
                .hba
                .as_ref()
                .and_then(|bus_id| topology.hbas.get(bus_id))
                .and_then(|hba| hba.label.as_deref());
            writeln!(
                out,
                "            HBA: {}, SG: {}, Device: {}",
                or_unknown(label.or(device.hba.as_deref())),
                or_unknown(device.generic.as_deref()),
                or_unknown(device.block.as_deref()),
            )?;
        }
    }
    Ok(())
}

fn write_summary(out: &mut String, topology: &Topology) -> fmt::Result {
    writeln!(out, "Found {} SAS device(s)", topology.devices.len())?;
    writeln!(
        out,
        "Found {} unique multi-pathed SAS device(s)",
        topology.logical_units.len()
    )?;
    for hba in topology.hbas.values() {
        writeln!(
            out,
            "Found HBA: {}, Label: {}, Host: {}",
            hba.bus_id,
            or_unknown(hba.label.as_deref()),
            hba.host
        )?;
    }

    writeln!(out, "Found {} enclosure(s)", topology.enclosures.len())?;
    for enclosure in &topology.enclosures {
        write_enclosure(out, topology, enclosure)?;
    }
    Ok(())
}

/// Renders a human readable summary of the topology.
pub fn summary(topology: &Topology) -> Result<String, Error> {
    let mut out = String::new();
    write_summary(&mut out, topology).context("Failed to render topology summary")?;
    Ok(out)
}

/// Serializes a snapshot in one of the structured formats.
pub fn serialize(snapshot: &Snapshot, format: OutputFormat) -> Result<String, Error> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(snapshot).context("Failed to serialize topology to JSON")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(snapshot).context("Failed to serialize topology to YAML")
        }
        OutputFormat::Text => Err(anyhow::anyhow!("Text output is not a serialization format")),
    }
}
