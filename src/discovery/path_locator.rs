//! Extracts location information from device paths.

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use strum_macros::{Display, IntoStaticStr};

use sastopo_api::{
    constants::{
        ATTR_BAY_IDENTIFIER, ENCLOSURE_DEVICE_PREFIX, END_DEVICE_DEPTH, MIN_DEVICE_PATH_ELEMENTS,
        PCI_BUS_ID_ELEMENT, PORT_ELEMENT, SAS_DEVICE_DIR, SCSI_HOST_ELEMENT,
    },
    error::DiscoveryError,
    AttributeSource, Device, DevicePath,
};

lazy_static! {
    /// Trailing slot number of an enclosure device link label, e.g. "Slot 03".
    static ref SLOT_NUMBER: Regex = Regex::new(r"(\d+)\s*$").unwrap();
}

/// Where a device path attaches to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HbaLocation {
    /// PCI bus id of the HBA, e.g. `0000:90:00.0`.
    pub bus_id: String,

    /// SCSI host, e.g. `host2`.
    pub host: String,

    /// Path of the SCSI host node, holding the HBA's ports.
    pub host_path: DevicePath,

    /// HBA port, e.g. `port-2:0`.
    pub port: String,
}

/// Splits a device path into HBA and port.
pub fn locate(path: &DevicePath) -> Result<HbaLocation, DiscoveryError> {
    let elements = path.elements();
    if elements.len() < MIN_DEVICE_PATH_ELEMENTS {
        return Err(DiscoveryError::MalformedPath {
            path: path.to_string(),
            expected: MIN_DEVICE_PATH_ELEMENTS,
            found: elements.len(),
        });
    }

    Ok(HbaLocation {
        bus_id: elements[PCI_BUS_ID_ELEMENT].to_string(),
        host: elements[SCSI_HOST_ELEMENT].to_string(),
        host_path: path.prefix(SCSI_HOST_ELEMENT + 1),
        port: elements[PORT_ELEMENT].to_string(),
    })
}

/// Ways of finding the enclosure slot of a disk, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SlotStrategy {
    /// `bay_identifier` of the disk's SAS end device. Exposed by newer
    /// kernels.
    BayIdentifier,

    /// `enclosure_device:<slot name>` link in the device node. Exposed by
    /// older kernels.
    EnclosureDeviceLink,
}

pub const SLOT_STRATEGIES: [SlotStrategy; 2] = [
    SlotStrategy::BayIdentifier,
    SlotStrategy::EnclosureDeviceLink,
];

impl SlotStrategy {
    /// Returns the slot of the device, or None when the strategy doesn't apply
    /// to it.
    pub fn resolve(&self, source: &dyn AttributeSource, device: &Device) -> Option<u32> {
        match self {
            SlotStrategy::BayIdentifier => {
                let end_device = device.path.ancestor(END_DEVICE_DEPTH);
                let sas_device =
                    end_device.join(&format!("{SAS_DEVICE_DIR}/{}", end_device.name()));
                source
                    .read_int_attribute(sas_device.as_path(), ATTR_BAY_IDENTIFIER)
                    .ok()
                    .and_then(|bay| u32::try_from(bay).ok())
            }

            SlotStrategy::EnclosureDeviceLink => {
                let links = source
                    .list_children(device.path.as_path())
                    .ok()?
                    .into_iter()
                    .filter(|child| child.starts_with(ENCLOSURE_DEVICE_PREFIX))
                    .collect::<Vec<_>>();

                let link = links.first()?;
                if links.len() > 1 {
                    warn!(
                        "Found more than one enclosure device for device '{}', using '{}'",
                        device.id, link
                    );
                }

                slot_from_link(link)
            }
        }
    }
}

/// Parses the slot number out of an enclosure device link name, e.g.
/// `enclosure_device:Slot 3` or `enclosure_device:7`.
pub fn slot_from_link(link: &str) -> Option<u32> {
    let (_, label) = link.split_once(':')?;
    SLOT_NUMBER
        .captures(label)
        .and_then(|captures| captures[1].parse().ok())
}

/// Resolves the enclosure slot of a disk with the first strategy that
/// applies. Devices other than disks never have a slot.
pub fn resolve_slot(
    source: &dyn AttributeSource,
    device: &Device,
) -> Option<(u32, SlotStrategy)> {
    if !device.is_disk() {
        return None;
    }

    SLOT_STRATEGIES.iter().find_map(|strategy| {
        strategy
            .resolve(source, device)
            .map(|slot| (slot, *strategy))
    })
}
