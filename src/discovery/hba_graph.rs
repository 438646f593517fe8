//! Builds the HBA → port → phy wiring graph.

use std::collections::BTreeMap;

use log::debug;

use sastopo_api::{
    config::Conf,
    constants::{ATTR_PHY_IDENTIFIER, ATTR_SAS_ADDRESS, PHY_PREFIX, PORT_PREFIX, SAS_PHY_DIR},
    AttributeSource, DevicePath, Hba, HbaPort, Phy,
};

/// Accumulates the HBAs reached by the discovered devices. Only one HBA is
/// ever created per PCI bus id.
pub struct HbaGraphBuilder<'a> {
    source: &'a dyn AttributeSource,
    conf: &'a Conf,
    hbas: BTreeMap<String, Hba>,
}

impl<'a> HbaGraphBuilder<'a> {
    pub fn new(source: &'a dyn AttributeSource, conf: &'a Conf) -> Self {
        Self {
            source,
            conf,
            hbas: BTreeMap::new(),
        }
    }

    /// Records the HBA at `bus_id`, reading its ports from `host_path` the
    /// first time it is seen.
    pub fn ensure(&mut self, bus_id: &str, host: &str, host_path: &DevicePath) {
        if !self.hbas.contains_key(bus_id) {
            let hba = Hba {
                bus_id: bus_id.to_string(),
                host: host.to_string(),
                label: self.conf.hba_label(bus_id),
                ports: self.read_ports(host_path),
            };
            debug!(
                "Found HBA '{}' ({}) with {} port(s)",
                hba.bus_id,
                hba.host,
                hba.ports.len()
            );
            self.hbas.insert(bus_id.to_string(), hba);
        }
    }

    fn children_with_prefix(&self, path: &DevicePath, prefix: &str) -> Vec<String> {
        self.source
            .list_children(path.as_path())
            .unwrap_or_default()
            .into_iter()
            .filter(|child| child.starts_with(prefix))
            .collect()
    }

    fn read_ports(&self, host_path: &DevicePath) -> Vec<HbaPort> {
        self.children_with_prefix(host_path, PORT_PREFIX)
            .into_iter()
            .map(|port| {
                let port_path = host_path.join(&port);
                let phys = self
                    .children_with_prefix(&port_path, PHY_PREFIX)
                    .iter()
                    .filter_map(|phy| self.read_phy(&port_path, phy))
                    .collect();
                HbaPort { id: port, phys }
            })
            .collect()
    }

    /// Reads a phy, or returns None when any of its attributes is missing.
    fn read_phy(&self, port_path: &DevicePath, phy: &str) -> Option<Phy> {
        let sas_phy = port_path.join(&format!("{phy}/{SAS_PHY_DIR}/{phy}"));
        Some(Phy {
            identifier: self
                .source
                .read_attribute(sas_phy.as_path(), ATTR_PHY_IDENTIFIER)
                .ok()?,
            sas_address: self
                .source
                .read_attribute(sas_phy.as_path(), ATTR_SAS_ADDRESS)
                .ok()?,
        })
    }

    pub fn build(self) -> BTreeMap<String, Hba> {
        self.hbas
    }
}
