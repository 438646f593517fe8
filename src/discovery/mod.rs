//! Discovery of the SAS topology of the host.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Error};
use log::{debug, info, warn};
use rayon::prelude::*;

use sastopo_api::{
    config::Conf,
    constants::{DEVICE_LINK, SCSI_DEVICE_CLASS_PATH},
    AttributeSource, Device, DevicePath, DiagnosticRunner, Topology,
};

pub mod enclosure;
pub mod hba_graph;
pub mod identity;
pub mod multipath;
pub mod path_locator;
pub mod ses;

use hba_graph::HbaGraphBuilder;
use identity::IdentityResolver;
use multipath::IdentityIndex;
use path_locator::HbaLocation;

/// A device, along with where it attaches to the host.
struct ProbedDevice {
    device: Device,
    location: Option<HbaLocation>,
}

/// Lists the SCSI devices of the host and the canonical path of each.
fn list_devices(source: &dyn AttributeSource) -> Result<Vec<(String, DevicePath)>, Error> {
    let class_path = Path::new(SCSI_DEVICE_CLASS_PATH);
    let ids = source
        .list_children(class_path)
        .with_context(|| format!("Failed to list SCSI devices in '{SCSI_DEVICE_CLASS_PATH}'"))?;

    Ok(ids
        .into_iter()
        .filter_map(
            |id| match source.resolve(&class_path.join(&id).join(DEVICE_LINK)) {
                Ok(path) => {
                    let path = DevicePath::new(path.to_string_lossy());
                    Some((id, path))
                }
                Err(e) => {
                    warn!("Failed to resolve path of device '{id}': {e}");
                    None
                }
            },
        )
        .collect())
}

/// Reads everything that can be learned about a device on its own. Returns
/// None when the device must be left out of the topology.
fn probe(
    resolver: &IdentityResolver,
    source: &dyn AttributeSource,
    mut device: Device,
) -> Option<ProbedDevice> {
    if let Err(e) = resolver.read_attributes(&mut device) {
        warn!("Skipping device '{}' ({}): {e:#}", device.id, e.kind());
        return None;
    }

    match resolver.resolve_serial(&device) {
        Ok((serial, strategy)) => {
            debug!(
                "Resolved serial '{serial}' of device '{}' from {strategy}",
                device.id
            );
            device.serial = serial;
        }
        Err(e) if e.drops_device() => {
            warn!("Skipping device '{}' ({}): {e}", device.id, e.kind());
            return None;
        }
        Err(e) => warn!(
            "Keeping device '{}' without serial ({}): {e}",
            device.id,
            e.kind()
        ),
    }

    let location = match path_locator::locate(&device.path) {
        Ok(location) => {
            device.hba = Some(location.bus_id.clone());
            device.port = Some(location.port.clone());
            Some(location)
        }
        Err(e) => {
            warn!(
                "Cannot locate HBA of device '{}' ({}): {e}",
                device.id,
                e.kind()
            );
            None
        }
    };

    if let Some((slot, strategy)) = path_locator::resolve_slot(source, &device) {
        debug!("Device '{}' is in slot {slot}, from {strategy}", device.id);
        device.slot = Some(slot);
    }

    Some(ProbedDevice { device, location })
}

/// Discovers the SAS topology visible through `source`.
///
/// Problems with individual devices are logged and never abort the
/// discovery. Only failing to list the devices at all is an error.
pub fn discover(
    source: &dyn AttributeSource,
    runner: &dyn DiagnosticRunner,
    conf: &Conf,
) -> Result<Topology, Error> {
    let entries = list_devices(source)?;
    info!("Probing {} SCSI device(s)", entries.len());

    let resolver = IdentityResolver::new(source, runner, conf);
    let probed = entries
        .into_par_iter()
        .filter_map(|(id, path)| probe(&resolver, source, Device::new(id, path)))
        .collect::<Vec<_>>();

    let mut hba_graph = HbaGraphBuilder::new(source, conf);
    let mut index = IdentityIndex::default();
    let mut devices = BTreeMap::new();
    for ProbedDevice { device, location } in probed {
        if let Some(location) = location {
            hba_graph.ensure(&location.bus_id, &location.host, &location.host_path);
        }
        index.insert(&device);
        devices.insert(device.id.clone(), device);
    }

    let logical_units = multipath::merge(&mut devices, &index);
    let enclosures = enclosure::assign(&mut devices, conf.path_prefix_match_depth);
    let hbas = hba_graph.build();

    info!(
        "Found {} device(s), {} logical unit(s), {} enclosure(s) and {} HBA(s)",
        devices.len(),
        logical_units.len(),
        enclosures.len(),
        hbas.len()
    );

    Ok(Topology {
        devices,
        logical_units,
        enclosures,
        hbas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use maplit::btreemap;
    use sastopo_api::{DeviceClass, EnclosureId, IdentityKey, LogicalUnitId};

    use crate::testutils::{MemorySource, ScriptedRunner};

    const PORT_A: &str = "/sys/devices/pci0000:80/0000:80:03.0/0000:90:00.0/host2/port-2:0";
    const PORT_B: &str = "/sys/devices/pci0000:00/0000:00:02.0/0000:11:00.0/host0/port-0:0";
    const EXPANDER_A: &str = "/sys/devices/pci0000:80/0000:80:03.0/0000:90:00.0/host2/port-2:0/expander-2:0";
    const EXPANDER_B: &str = "/sys/devices/pci0000:00/0000:00:02.0/0000:11:00.0/host0/port-0:0/expander-0:0";

    struct Fixture {
        source: MemorySource,
    }

    impl Fixture {
        fn new() -> Self {
            let source = MemorySource::default().with_dir("/sys/class/scsi_device");
            let mut fixture = Self { source };
            fixture.phy(PORT_A, "phy-2:0", "0");
            fixture.phy(PORT_A, "phy-2:1", "1");
            fixture.phy(PORT_B, "phy-0:4", "4");
            fixture
        }

        fn update(&mut self, f: impl FnOnce(MemorySource) -> MemorySource) {
            self.source = f(std::mem::take(&mut self.source));
        }

        fn phy(&mut self, port: &str, phy: &str, identifier: &str) {
            let sas_phy = format!("{port}/{phy}/sas_phy/{phy}");
            self.update(|source| {
                source
                    .with_attribute(&sas_phy, "phy_identifier", identifier)
                    .with_attribute(&sas_phy, "sas_address", "0x500605b00ab12340")
            });
        }

        /// Adds a device below an expander and returns its path.
        fn device(
            &mut self,
            id: &str,
            expander: &str,
            class: i64,
            model: &str,
            sas_address: &str,
            serial: Option<&str>,
        ) -> String {
            let target = id.strip_suffix(":0").unwrap_or(id);
            let path = format!("{expander}/port-{target}/end_device-{target}/target{target}/{id}");
            self.device_at(id, &path, class, model, sas_address, serial);
            path
        }

        fn device_at(
            &mut self,
            id: &str,
            path: &str,
            class: i64,
            model: &str,
            sas_address: &str,
            serial: Option<&str>,
        ) {
            let mut vpd = b"\x00\x80\x00\x14".to_vec();
            vpd.extend(serial.unwrap_or_default().as_bytes());
            self.update(|source| {
                let source = source
                    .with_link(&format!("/sys/class/scsi_device/{id}/device"), path)
                    .with_attribute(path, "model", model)
                    .with_attribute(path, "vendor", "HGST")
                    .with_attribute(path, "rev", "A3Z0")
                    .with_attribute(path, "type", &class.to_string());
                let source = match serial {
                    Some(_) => source.with_raw_attribute(path, "vpd_pg80", &vpd),
                    None => source,
                };
                match sas_address {
                    "" => source,
                    sas_address => source.with_attribute(path, "sas_address", sas_address),
                }
            });
        }

        fn bay(&mut self, device_path: &str, bay: u32) {
            let end_device = DevicePath::new(device_path).ancestor(2);
            let sas_device = format!("{end_device}/sas_device/{}", end_device.name());
            self.update(|source| source.with_attribute(&sas_device, "bay_identifier", &bay.to_string()));
        }

        fn discover(&self, conf: &Conf) -> Topology {
            discover(&self.source, &ScriptedRunner::default(), conf).unwrap()
        }
    }

    /// Dual-path enclosure holding two disks.
    fn dual_path() -> Fixture {
        let mut fixture = Fixture::new();
        fixture.device("2:0:9:0", EXPANDER_A, 13, "SP-2584", "0x5000ccab0405db7d", Some("ENC1"));
        fixture.device("0:0:9:0", EXPANDER_B, 13, "SP-2584", "0x5000ccab0405db3d", Some("ENC1"));
        let path = fixture.device("2:0:0:0", EXPANDER_A, 0, "HUH721010AL5200", "0x5000cca2510a5d21", Some("SN123"));
        fixture.bay(&path, 0);
        let path = fixture.device("0:0:0:0", EXPANDER_B, 0, "HUH721010AL5200", "0x5000cca2510a5d22", Some("SN123"));
        fixture.bay(&path, 0);
        let path = fixture.device("2:0:1:0", EXPANDER_A, 0, "HUH721010AL5200", "0x5000cca2510a6000", Some("SN456"));
        fixture.bay(&path, 1);
        fixture
    }

    #[test]
    fn test_discover() {
        let topology = dual_path().discover(&Conf::default());

        assert_eq!(
            topology.devices.keys().collect::<Vec<_>>(),
            vec!["0:0:0:0", "0:0:9:0", "2:0:0:0", "2:0:1:0", "2:0:9:0"]
        );

        let disk = &topology.devices["2:0:0:0"];
        assert_eq!(disk.class, DeviceClass::Disk);
        assert_eq!(disk.vendor, "HGST");
        assert_eq!(disk.model, "HUH721010AL5200");
        assert_eq!(disk.serial, "SN123");
        assert_eq!(disk.slot, Some(0));
        assert_eq!(disk.hba.as_deref(), Some("0000:90:00.0"));
        assert_eq!(disk.port.as_deref(), Some("port-2:0"));

        assert_eq!(topology.logical_units.len(), 3);
        assert_eq!(
            topology.logical_units[0].key,
            IdentityKey::Serial("SN123".into())
        );
        assert_eq!(
            topology.logical_units[1].key,
            IdentityKey::Serial("ENC1".into())
        );
        assert_eq!(
            topology.logical_units[2].key,
            IdentityKey::Serial("SN456".into())
        );

        assert_eq!(topology.enclosures.len(), 1);
        assert_eq!(topology.enclosures[0].logical_unit, LogicalUnitId(1));
        assert_eq!(
            topology.enclosures[0].slots,
            btreemap! {
                0 => LogicalUnitId(0),
                1 => LogicalUnitId(2),
            }
        );
        assert!(topology
            .devices
            .values()
            .all(|device| device.enclosure == Some(EnclosureId(0))));

        assert_eq!(
            topology.hbas.keys().collect::<Vec<_>>(),
            vec!["0000:11:00.0", "0000:90:00.0"]
        );
        assert_eq!(topology.hbas["0000:90:00.0"].host, "host2");
        assert_eq!(topology.hbas["0000:90:00.0"].phy_ids(), vec!["0", "1"]);
        assert_eq!(topology.hbas["0000:11:00.0"].phy_ids(), vec!["4"]);
    }

    #[test]
    fn test_multipath_disk() {
        let topology = dual_path().discover(&Conf::default());

        let a = &topology.devices["2:0:0:0"];
        let b = &topology.devices["0:0:0:0"];
        assert_eq!(a.logical_unit, b.logical_unit);
        assert_eq!(topology.path_count(a), 2);
        assert_ne!(a.hba, b.hba);
        assert_eq!(
            topology
                .unit_devices(LogicalUnitId(0))
                .iter()
                .map(|device| device.id.as_str())
                .collect::<Vec<_>>(),
            vec!["0:0:0:0", "2:0:0:0"]
        );
        assert_eq!(topology.path_count(&topology.devices["2:0:1:0"]), 1);
    }

    #[test]
    fn test_unknown_device_type_dropped() {
        let mut fixture = dual_path();
        fixture.device("2:0:5:0", EXPANDER_A, 99, "DVD", "0x1", Some("CD1"));
        fixture.device("2:0:6:0", EXPANDER_A, 5, "CD-ROM", "0x2", Some("CD2"));

        let topology = fixture.discover(&Conf::default());

        assert!(!topology.devices.contains_key("2:0:5:0"));
        assert!(!topology.devices.contains_key("2:0:6:0"));
        assert_eq!(topology.devices.len(), 5);
    }

    #[test]
    fn test_unreadable_device_dropped() {
        let mut fixture = dual_path();
        let path = format!("{EXPANDER_A}/port-2:0:7/end_device-2:0:7/target2:0:7/2:0:7:0");
        fixture.update(|source| {
            source
                .with_link("/sys/class/scsi_device/2:0:7:0/device", &path)
                .with_attribute(&path, "vendor", "HGST")
        });
        // Dangling entry
        fixture.update(|source| source.with_dir("/sys/class/scsi_device/2:0:8:0"));

        let topology = fixture.discover(&Conf::default());

        assert!(!topology.devices.contains_key("2:0:7:0"));
        assert!(!topology.devices.contains_key("2:0:8:0"));
        assert_eq!(topology.devices.len(), 5);
    }

    #[test]
    fn test_serial_less_disk() {
        let mut fixture = dual_path();
        fixture.device("2:0:2:0", EXPANDER_A, 0, "ST8000NM0075", "0x5000c500a1b2c3d4", None);
        fixture.device("0:0:2:0", EXPANDER_B, 0, "ST8000NM0075", "0x5000c500a1b2c3d4", None);

        let topology = fixture.discover(&Conf::default());

        let device = &topology.devices["2:0:2:0"];
        assert_eq!(device.serial, "");
        let unit = topology.logical_unit(device.logical_unit.unwrap()).unwrap();
        assert_eq!(
            unit.key,
            IdentityKey::SasAddress("0x5000c500a1b2c3d4".into())
        );
        assert_eq!(topology.path_count(device), 2);
    }

    #[test]
    fn test_malformed_path() {
        let mut fixture = dual_path();
        fixture.device_at(
            "9:0:0:0",
            "/sys/devices/virtual/9:0:0:0",
            0,
            "VIRTUAL",
            "",
            Some("VD1"),
        );

        let topology = fixture.discover(&Conf::default());

        let device = &topology.devices["9:0:0:0"];
        assert_eq!(device.serial, "VD1");
        assert_eq!(device.hba, None);
        assert_eq!(device.port, None);
        assert_eq!(device.enclosure, None);
        assert!(device.logical_unit.is_some());
        assert_eq!(topology.hbas.len(), 2);
    }

    #[test]
    fn test_ses_enclosure_without_special_file() {
        let dev_root = tempfile::tempdir().unwrap();
        let mut fixture = dual_path();
        let path = fixture.device("2:0:10:0", EXPANDER_A, 13, "SA4600", "0x50050cc10abc0000", None);
        fixture.update(|source| source.with_dir(&format!("{path}/scsi_generic/sg12")));

        let conf = Conf {
            dev_root: dev_root.path().to_path_buf(),
            ..Default::default()
        };
        let runner = ScriptedRunner::default();
        let topology = discover(&fixture.source, &runner, &conf).unwrap();

        let device = &topology.devices["2:0:10:0"];
        assert_eq!(device.serial, "");
        assert_eq!(device.generic.as_deref(), Some("sg12"));
        let unit = topology.logical_unit(device.logical_unit.unwrap()).unwrap();
        assert_eq!(
            unit.key,
            IdentityKey::SasAddress("0x50050cc10abc0000".into())
        );
        assert!(runner.calls().is_empty());
        // A second enclosure unit on the same path prefix
        assert_eq!(topology.enclosures.len(), 2);
    }

    #[test]
    fn test_idempotence() {
        let mut fixture = dual_path();
        fixture.device("2:0:2:0", EXPANDER_A, 0, "ST8000NM0075", "0x5000c500a1b2c3d4", None);
        fixture.device("2:0:3:0", EXPANDER_A, 0, "ST8000NM0075", "", None);

        let first = fixture.discover(&Conf::default());
        let second = fixture.discover(&Conf::default());
        assert_eq!(first, second);

        let units = |topology: &Topology| {
            topology
                .logical_units
                .iter()
                .map(|unit| unit.paths.clone())
                .collect::<BTreeSet<_>>()
        };
        assert_eq!(units(&first), units(&second));
        // Orphan
        assert_eq!(first.devices["2:0:3:0"].logical_unit, None);
        assert_eq!(first.path_count(&first.devices["2:0:3:0"]), 0);
    }

    #[test]
    fn test_no_device_class() {
        let source = MemorySource::default();
        let err = discover(&source, &ScriptedRunner::default(), &Conf::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to list SCSI devices in '/sys/class/scsi_device'"
        );
    }

    #[test]
    fn test_empty_host() {
        let source = MemorySource::default().with_dir("/sys/class/scsi_device");
        let topology = discover(&source, &ScriptedRunner::default(), &Conf::default()).unwrap();
        assert_eq!(topology, Topology::default());
    }
}
