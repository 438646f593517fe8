//! Resolution of device attributes and unique identity.

use log::warn;
use strum_macros::Display;

use sastopo_api::{
    config::Conf,
    constants::{
        ATTR_MODEL, ATTR_REVISION, ATTR_SAS_ADDRESS, ATTR_TYPE, ATTR_VENDOR, ATTR_VPD_PAGE_80,
        BLOCK_DIR, SCSI_GENERIC_DIR, SES_ELEMENT_DESCRIPTOR_PAGE, VPD_SERIAL_MAX_LEN,
        VPD_SERIAL_OFFSET,
    },
    error::DiscoveryError,
    AttributeSource, Device, DeviceClass, DiagnosticRunner,
};

use super::ses;

/// Ways of finding the serial number of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SerialStrategy {
    /// Fixed offset in the SES element descriptor page, for enclosures that
    /// don't implement VPD page 0x80.
    SesDiagnosticPage,

    /// Unit serial number VPD page.
    VpdPage80,
}

const DISK_SERIAL_STRATEGIES: &[SerialStrategy] = &[SerialStrategy::VpdPage80];

const ENCLOSURE_SERIAL_STRATEGIES: &[SerialStrategy] = &[
    SerialStrategy::SesDiagnosticPage,
    SerialStrategy::VpdPage80,
];

impl SerialStrategy {
    /// Strategies to try for a device class, in order. Unknown classes have
    /// none.
    pub fn for_class(class: DeviceClass) -> Option<&'static [SerialStrategy]> {
        match class {
            DeviceClass::Disk => Some(DISK_SERIAL_STRATEGIES),
            DeviceClass::Enclosure => Some(ENCLOSURE_SERIAL_STRATEGIES),
            DeviceClass::Unknown(_) => None,
        }
    }
}

/// Reads identity information of devices.
pub struct IdentityResolver<'a> {
    source: &'a dyn AttributeSource,
    runner: &'a dyn DiagnosticRunner,
    conf: &'a Conf,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        source: &'a dyn AttributeSource,
        runner: &'a dyn DiagnosticRunner,
        conf: &'a Conf,
    ) -> Self {
        Self {
            source,
            runner,
            conf,
        }
    }

    fn required(&self, device: &Device, attribute: &'static str) -> Result<String, DiscoveryError> {
        self.source
            .read_attribute(device.path.as_path(), attribute)
            .map_err(|source| DiscoveryError::AttributeRead {
                device: device.id.clone(),
                attribute,
                source,
            })
    }

    fn first_child(&self, device: &Device, dir: &str) -> Option<String> {
        self.source
            .list_children(&device.path.as_path().join(dir))
            .ok()
            .and_then(|children| children.into_iter().next())
    }

    /// Populates vendor, model, revision, SAS address, class, block and
    /// generic names.
    pub fn read_attributes(&self, device: &mut Device) -> Result<(), DiscoveryError> {
        device.model = self.required(device, ATTR_MODEL)?;
        device.vendor = self.required(device, ATTR_VENDOR)?;
        device.revision = self.required(device, ATTR_REVISION)?;

        // Some devices legitimately lack a SAS address
        device.sas_address = match self
            .source
            .read_attribute(device.path.as_path(), ATTR_SAS_ADDRESS)
        {
            Ok(sas_address) => sas_address,
            Err(e) => {
                warn!("Cannot find SAS address of device '{}': {e}", device.id);
                String::new()
            }
        };

        let code = self
            .source
            .read_int_attribute(device.path.as_path(), ATTR_TYPE)
            .map_err(|source| DiscoveryError::AttributeRead {
                device: device.id.clone(),
                attribute: ATTR_TYPE,
                source,
            })?;
        device.class = DeviceClass::from_code(code);

        device.block = self.first_child(device, BLOCK_DIR);
        device.generic = self.first_child(device, SCSI_GENERIC_DIR);

        Ok(())
    }

    /// Resolves the serial number of a device with the first strategy that
    /// applies to it.
    pub fn resolve_serial(
        &self,
        device: &Device,
    ) -> Result<(String, SerialStrategy), DiscoveryError> {
        let strategies =
            SerialStrategy::for_class(device.class).ok_or(DiscoveryError::UnknownDeviceType {
                device: device.id.clone(),
                class_code: device.class.code(),
            })?;

        for strategy in strategies {
            if let Some(serial) = self.attempt(*strategy, device)? {
                return Ok((serial, *strategy));
            }
        }

        Err(DiscoveryError::SerialResolution {
            device: device.id.clone(),
            reason: "no serial source applies".into(),
        })
    }

    /// Runs one strategy. Returns None when it doesn't apply to the device.
    fn attempt(
        &self,
        strategy: SerialStrategy,
        device: &Device,
    ) -> Result<Option<String>, DiscoveryError> {
        let serial_error = |reason: String| DiscoveryError::SerialResolution {
            device: device.id.clone(),
            reason,
        };

        match strategy {
            SerialStrategy::VpdPage80 => {
                let page = self
                    .source
                    .read_raw_attribute(device.path.as_path(), ATTR_VPD_PAGE_80)
                    .map_err(|e| serial_error(e.to_string()))?;
                Ok(Some(serial_from_vpd_page(&page)))
            }

            SerialStrategy::SesDiagnosticPage => {
                let Some(layout) = self.conf.ses_layout(&device.model) else {
                    return Ok(None);
                };

                let generic = device
                    .generic
                    .as_ref()
                    .ok_or_else(|| serial_error("device has no SCSI generic node".into()))?;
                let special_file = self.conf.dev_root.join(generic);
                if !special_file.exists() {
                    return Err(serial_error(format!(
                        "special file '{}' not found",
                        special_file.display()
                    )));
                }

                let dump = self
                    .runner
                    .diagnostic_page(SES_ELEMENT_DESCRIPTOR_PAGE, &special_file)
                    .map_err(|e| DiscoveryError::Subprocess {
                        device: device.id.clone(),
                        reason: format!("{e:#}"),
                    })?;

                ses::serial_from_dump(&dump, layout)
                    .map(Some)
                    .map_err(|e| serial_error(format!("{e:#}")))
            }
        }
    }
}

/// Extracts the unit serial number from the raw contents of VPD page 0x80.
pub fn serial_from_vpd_page(page: &[u8]) -> String {
    if page.len() <= VPD_SERIAL_OFFSET {
        return String::new();
    }
    let end = page.len().min(VPD_SERIAL_OFFSET + VPD_SERIAL_MAX_LEN);
    printable_serial(&page[VPD_SERIAL_OFFSET..end])
}

/// Strips the space and NUL padding around a serial number, and any byte that
/// isn't printable ASCII.
pub fn printable_serial(bytes: &[u8]) -> String {
    let is_padding = |byte: &u8| *byte == b' ' || *byte == 0;
    let (Some(start), Some(end)) = (
        bytes.iter().position(|byte| !is_padding(byte)),
        bytes.iter().rposition(|byte| !is_padding(byte)),
    ) else {
        return String::new();
    };

    bytes[start..=end]
        .iter()
        .filter(|byte| byte.is_ascii_graphic() || **byte == b' ')
        .map(|byte| *byte as char)
        .collect()
}
