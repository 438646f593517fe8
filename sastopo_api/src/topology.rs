use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::constants::{SCSI_TYPE_DISK, SCSI_TYPE_ENCLOSURE};

/// Path of a device node in the hardware metadata tree, e.g.
/// `/sys/devices/pci0000:80/0000:80:03.0/0000:90:00.0/host2/port-2:0/...`.
///
/// Elements are the '/'-separated parts of the path, including the empty
/// element before the leading slash.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct DevicePath(String);

impl DevicePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn elements(&self) -> Vec<&str> {
        self.0.split('/').collect()
    }

    /// Name of the last element.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Returns the path made of the first `n` elements, or the whole path
    /// when it is shorter.
    pub fn prefix(&self, n: usize) -> DevicePath {
        let elements = self.elements();
        DevicePath(elements[..n.min(elements.len())].join("/"))
    }

    /// Returns the path `levels` elements up.
    pub fn ancestor(&self, levels: usize) -> DevicePath {
        let len = self.elements().len();
        self.prefix(len.saturating_sub(levels))
    }

    pub fn join(&self, child: &str) -> DevicePath {
        DevicePath(format!("{}/{}", self.0, child.trim_matches('/')))
    }
}

impl Display for DevicePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for DevicePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// SCSI peripheral device type.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    Disk,
    Enclosure,
    Unknown(i64),
}

impl DeviceClass {
    pub fn from_code(code: i64) -> Self {
        match code {
            SCSI_TYPE_DISK => DeviceClass::Disk,
            SCSI_TYPE_ENCLOSURE => DeviceClass::Enclosure,
            other => DeviceClass::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            DeviceClass::Disk => SCSI_TYPE_DISK,
            DeviceClass::Enclosure => SCSI_TYPE_ENCLOSURE,
            DeviceClass::Unknown(code) => *code,
        }
    }
}

/// Handle of a logical unit inside `Topology::logical_units`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct LogicalUnitId(pub usize);

/// Handle of an enclosure inside `Topology::enclosures`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct EnclosureId(pub usize);

/// One SCSI device, as seen through one I/O path.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// SCSI address of the device, e.g. `2:0:0:0`.
    pub id: String,

    pub class: DeviceClass,

    pub vendor: String,

    pub model: String,

    pub revision: String,

    /// Empty when the device doesn't expose one.
    pub sas_address: String,

    /// Empty when it could not be resolved.
    pub serial: String,

    /// Block device name, e.g. `sdb`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,

    /// SCSI generic device name, e.g. `sg3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<String>,

    /// Enclosure slot. Only resolved for disks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,

    /// PCI bus id of the HBA this path goes through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hba: Option<String>,

    /// HBA port this path goes through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_unit: Option<LogicalUnitId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosure: Option<EnclosureId>,

    pub path: DevicePath,
}

impl Device {
    pub fn new(id: impl Into<String>, path: DevicePath) -> Self {
        Self {
            id: id.into(),
            class: DeviceClass::Unknown(-1),
            vendor: String::new(),
            model: String::new(),
            revision: String::new(),
            sas_address: String::new(),
            serial: String::new(),
            block: None,
            generic: None,
            slot: None,
            hba: None,
            port: None,
            logical_unit: None,
            enclosure: None,
            path,
        }
    }

    pub fn is_disk(&self) -> bool {
        self.class == DeviceClass::Disk
    }

    pub fn is_enclosure(&self) -> bool {
        self.class == DeviceClass::Enclosure
    }
}

/// Value a logical unit was grouped by. Serial numbers and SAS addresses are
/// never compared with each other.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityKey {
    Serial(String),
    SasAddress(String),
}

/// One physical unit, reachable through one or more devices.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogicalUnit {
    pub id: LogicalUnitId,

    pub key: IdentityKey,

    /// Ids of the devices reaching this unit. Never empty.
    pub paths: BTreeSet<String>,
}

/// A SAS phy lane.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Phy {
    pub identifier: String,
    pub sas_address: String,
}

/// A SAS port of an HBA.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HbaPort {
    /// Port name, e.g. `port-2:0`.
    pub id: String,
    pub phys: Vec<Phy>,
}

impl HbaPort {
    pub fn phy_ids(&self) -> Vec<&str> {
        self.phys.iter().map(|phy| phy.identifier.as_str()).collect()
    }
}

/// A PCI SAS host bus adapter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hba {
    /// PCI bus id, e.g. `0000:90:00.0`.
    pub bus_id: String,

    /// SCSI host, e.g. `host2`.
    pub host: String,

    /// Label describing the physical location of the card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub ports: Vec<HbaPort>,
}

impl Hba {
    pub fn port(&self, id: &str) -> Option<&HbaPort> {
        self.ports.iter().find(|port| port.id == id)
    }

    pub fn phy_ids(&self) -> Vec<&str> {
        self.ports.iter().flat_map(|port| port.phy_ids()).collect()
    }
}

/// A physical enclosure chassis.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Enclosure {
    pub id: EnclosureId,

    /// Logical unit of the enclosure's own SES device.
    pub logical_unit: LogicalUnitId,

    /// Disk units, by slot number.
    pub slots: BTreeMap<u32, LogicalUnitId>,
}

/// Result of a discovery run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub devices: BTreeMap<String, Device>,
    pub logical_units: Vec<LogicalUnit>,
    pub enclosures: Vec<Enclosure>,
    pub hbas: BTreeMap<String, Hba>,
}

impl Topology {
    pub fn logical_unit(&self, id: LogicalUnitId) -> Option<&LogicalUnit> {
        self.logical_units.get(id.0)
    }

    /// Returns the devices reaching a logical unit, sorted by id.
    pub fn unit_devices(&self, id: LogicalUnitId) -> Vec<&Device> {
        self.logical_unit(id)
            .map(|unit| {
                unit.paths
                    .iter()
                    .filter_map(|path| self.devices.get(path))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the first device of a logical unit, to read the attributes
    /// shared by all of its paths.
    pub fn representative(&self, id: LogicalUnitId) -> Option<&Device> {
        self.unit_devices(id).into_iter().next()
    }

    /// Returns the number of paths reaching the unit of a device. Devices
    /// without a unit have no usable path.
    pub fn path_count(&self, device: &Device) -> usize {
        device
            .logical_unit
            .and_then(|id| self.logical_unit(id))
            .map(|unit| unit.paths.len())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use maplit::btreeset;

    const DISK_PATH: &str = "/sys/devices/pci0000:80/0000:80:03.0/0000:90:00.0/host2/port-2:0/expander-2:0/port-2:0:0/end_device-2:0:0/target2:0:0/2:0:0:0";

    #[test]
    fn test_device_path() {
        let path = DevicePath::new(DISK_PATH);
        assert_eq!(path.elements().len(), 13);
        assert_eq!(path.elements()[0], "");
        assert_eq!(path.elements()[5], "0000:90:00.0");
        assert_eq!(path.name(), "2:0:0:0");
        assert_eq!(
            path.prefix(8).as_str(),
            "/sys/devices/pci0000:80/0000:80:03.0/0000:90:00.0/host2/port-2:0"
        );
        assert_eq!(path.prefix(100), path);
        assert_eq!(path.prefix(0).as_str(), "");
        assert_eq!(path.ancestor(2).name(), "end_device-2:0:0");
        assert_eq!(
            path.ancestor(2).join("sas_device/end_device-2:0:0").as_str(),
            "/sys/devices/pci0000:80/0000:80:03.0/0000:90:00.0/host2/port-2:0/expander-2:0/port-2:0:0/end_device-2:0:0/sas_device/end_device-2:0:0"
        );

        // Trailing slashes are dropped
        assert_eq!(DevicePath::new("/sys/devices/").name(), "devices");
    }

    #[test]
    fn test_device_class() {
        assert_eq!(DeviceClass::from_code(0), DeviceClass::Disk);
        assert_eq!(DeviceClass::from_code(13), DeviceClass::Enclosure);
        assert_eq!(DeviceClass::from_code(99), DeviceClass::Unknown(99));
        assert_eq!(DeviceClass::Unknown(99).code(), 99);
        assert_eq!(DeviceClass::Enclosure.code(), 13);
    }

    #[test]
    fn test_hba_phy_ids() {
        let hba = Hba {
            bus_id: "0000:90:00.0".into(),
            host: "host2".into(),
            label: None,
            ports: vec![
                HbaPort {
                    id: "port-2:0".into(),
                    phys: vec![
                        Phy {
                            identifier: "0".into(),
                            sas_address: "0x500605b0000272b0".into(),
                        },
                        Phy {
                            identifier: "1".into(),
                            sas_address: "0x500605b0000272b0".into(),
                        },
                    ],
                },
                HbaPort {
                    id: "port-2:1".into(),
                    phys: vec![Phy {
                        identifier: "4".into(),
                        sas_address: "0x500605b0000272b0".into(),
                    }],
                },
            ],
        };

        assert_eq!(hba.phy_ids(), vec!["0", "1", "4"]);
        assert_eq!(hba.port("port-2:1").unwrap().phy_ids(), vec!["4"]);
        assert!(hba.port("port-2:2").is_none());
    }

    #[test]
    fn test_topology_lookups() {
        let mut topology = Topology::default();
        for id in ["1:0:0:0", "2:0:0:0", "3:0:0:0"] {
            let mut device = Device::new(id, DevicePath::new(DISK_PATH));
            device.serial = "SN1".into();
            topology.devices.insert(id.into(), device);
        }
        topology.logical_units.push(LogicalUnit {
            id: LogicalUnitId(0),
            key: IdentityKey::Serial("SN1".into()),
            paths: btreeset! {"2:0:0:0".to_string(), "1:0:0:0".to_string()},
        });
        topology.devices.get_mut("1:0:0:0").unwrap().logical_unit = Some(LogicalUnitId(0));
        topology.devices.get_mut("2:0:0:0").unwrap().logical_unit = Some(LogicalUnitId(0));

        let devices = topology.unit_devices(LogicalUnitId(0));
        assert_eq!(devices.len(), 2);
        assert_eq!(
            topology.representative(LogicalUnitId(0)).unwrap().id,
            "1:0:0:0"
        );
        assert!(topology.unit_devices(LogicalUnitId(1)).is_empty());
        assert_eq!(topology.path_count(&topology.devices["1:0:0:0"]), 2);
        assert_eq!(topology.path_count(&topology.devices["3:0:0:0"]), 0);
    }
}
