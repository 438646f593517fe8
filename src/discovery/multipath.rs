//! Merges the devices reaching the same physical unit through different
//! paths into logical units.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use sastopo_api::{Device, IdentityKey, LogicalUnit, LogicalUnitId};

/// Device ids bucketed by identity value. Empty values are never indexed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdentityIndex {
    pub by_serial: BTreeMap<String, BTreeSet<String>>,
    pub by_sas_address: BTreeMap<String, BTreeSet<String>>,
}

impl IdentityIndex {
    pub fn insert(&mut self, device: &Device) {
        if !device.serial.is_empty() {
            self.by_serial
                .entry(device.serial.clone())
                .or_default()
                .insert(device.id.clone());
        }
        if !device.sas_address.is_empty() {
            self.by_sas_address
                .entry(device.sas_address.clone())
                .or_default()
                .insert(device.id.clone());
        }
    }

    pub fn build<'a>(devices: impl IntoIterator<Item = &'a Device>) -> Self {
        let mut index = Self::default();
        for device in devices {
            index.insert(device);
        }
        index
    }
}

/// Picks the identity a device is grouped by, or None for orphans.
fn identity_key(
    device: &Device,
    devices: &BTreeMap<String, Device>,
    index: &IdentityIndex,
) -> Option<IdentityKey> {
    if !device.serial.is_empty() {
        return Some(IdentityKey::Serial(device.serial.clone()));
    }
    if device.sas_address.is_empty() {
        return None;
    }

    // Serials of the other paths sharing this SAS address, in device id order
    let serials = index
        .by_sas_address
        .get(&device.sas_address)
        .into_iter()
        .flatten()
        .filter_map(|id| devices.get(id))
        .map(|other| other.serial.as_str())
        .filter(|serial| !serial.is_empty())
        .collect::<Vec<_>>();

    match serials.first() {
        Some(serial) => {
            let distinct = serials.iter().collect::<BTreeSet<_>>();
            if distinct.len() > 1 {
                warn!(
                    "Devices with SAS address '{}' report different serials {:?}, \
                    grouping device '{}' with serial '{}'",
                    device.sas_address, distinct, device.id, serial
                );
            }
            Some(IdentityKey::Serial(serial.to_string()))
        }
        None => Some(IdentityKey::SasAddress(device.sas_address.clone())),
    }
}

/// Groups the devices into logical units and sets their unit handle.
///
/// Two devices end up in the same unit when they share a non-empty serial, or
/// when one of them has no serial and both share a non-empty SAS address.
/// Devices with neither a serial nor a SAS address are left without a unit.
/// Units are numbered in the order of their first device id.
pub fn merge(devices: &mut BTreeMap<String, Device>, index: &IdentityIndex) -> Vec<LogicalUnit> {
    let keys = devices
        .values()
        .map(|device| (device.id.clone(), identity_key(device, devices, index)))
        .collect::<Vec<_>>();

    let mut units: Vec<LogicalUnit> = Vec::new();
    let mut by_key: BTreeMap<IdentityKey, LogicalUnitId> = BTreeMap::new();

    for (id, key) in keys {
        let Some(device) = devices.get_mut(&id) else {
            continue;
        };
        let Some(key) = key else {
            warn!("Device '{id}' has neither a serial nor a SAS address, it can't be merged");
            device.logical_unit = None;
            continue;
        };

        let unit_id = *by_key.entry(key.clone()).or_insert_with(|| {
            let unit_id = LogicalUnitId(units.len());
            units.push(LogicalUnit {
                id: unit_id,
                key,
                paths: BTreeSet::new(),
            });
            unit_id
        });
        units[unit_id.0].paths.insert(id);
        device.logical_unit = Some(unit_id);
    }

    debug!(
        "Merged {} device(s) into {} logical unit(s)",
        devices.len(),
        units.len()
    );

    units
}
