//! Groups enclosure devices into physical enclosures and attributes disks to
//! their slots.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use sastopo_api::{Device, DevicePath, Enclosure, EnclosureId, LogicalUnitId};

/// Builds one enclosure per logical unit of enclosure devices, then attaches
/// every device whose first `match_depth` path elements match those of one of
/// the enclosure's devices.
pub fn assign(devices: &mut BTreeMap<String, Device>, match_depth: usize) -> Vec<Enclosure> {
    let units = devices
        .values()
        .filter(|device| device.is_enclosure())
        .filter_map(|device| device.logical_unit)
        .collect::<BTreeSet<LogicalUnitId>>();

    let mut enclosures = units
        .into_iter()
        .enumerate()
        .map(|(index, logical_unit)| Enclosure {
            id: EnclosureId(index),
            logical_unit,
            slots: BTreeMap::new(),
        })
        .collect::<Vec<_>>();
    let by_unit = enclosures
        .iter()
        .map(|enclosure| (enclosure.logical_unit, enclosure.id))
        .collect::<BTreeMap<_, _>>();

    let mut by_prefix: BTreeMap<DevicePath, EnclosureId> = BTreeMap::new();
    for device in devices.values().filter(|device| device.is_enclosure()) {
        let Some(enclosure) = device.logical_unit.and_then(|unit| by_unit.get(&unit)) else {
            continue;
        };
        let prefix = device.path.prefix(match_depth);
        if let Some(previous) = by_prefix.insert(prefix.clone(), *enclosure) {
            if previous != *enclosure {
                warn!(
                    "Enclosures {} and {} share path prefix '{prefix}'",
                    previous.0, enclosure.0
                );
            }
        }
    }

    for device in devices.values_mut() {
        let Some(enclosure) = by_prefix.get(&device.path.prefix(match_depth)) else {
            continue;
        };
        device.enclosure = Some(*enclosure);

        if let (true, Some(slot), Some(unit)) = (device.is_disk(), device.slot, device.logical_unit)
        {
            enclosures[enclosure.0].slots.insert(slot, unit);
        }
    }

    for enclosure in &enclosures {
        debug!(
            "Enclosure {} has {} populated slot(s)",
            enclosure.id.0,
            enclosure.slots.len()
        );
    }

    enclosures
}
