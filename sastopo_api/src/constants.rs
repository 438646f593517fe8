// Sysfs layout constants

/// Mount point of sysfs. Every device path handled by the discovery engine
/// lives under this root, regardless of where the tree is actually read from.
pub const SYSFS_ROOT: &str = "/sys";

/// Directory listing every SCSI device known to the kernel, relative to the
/// sysfs root.
pub const SCSI_DEVICE_CLASS_PATH: &str = "/sys/class/scsi_device";

/// Name of the link from a SCSI device class entry to its device node.
pub const DEVICE_LINK: &str = "device";

/// Default root of the device special files.
pub const DEV_ROOT: &str = "/dev";

// Device path layout

/// Minimum number of '/'-separated elements in a device path, counting the
/// empty element before the leading slash. For example:
/// `/sys/devices/pci0000:80/0000:80:03.0/0000:90:00.0/host2/port-2:0`.
pub const MIN_DEVICE_PATH_ELEMENTS: usize = 8;

/// Index of the HBA's PCI bus id in a device path.
pub const PCI_BUS_ID_ELEMENT: usize = 5;

/// Index of the SCSI host in a device path.
pub const SCSI_HOST_ELEMENT: usize = 6;

/// Index of the HBA port in a device path.
pub const PORT_ELEMENT: usize = 7;

/// Default number of path elements that must match between a device and an
/// enclosure for the device to be attributed to that enclosure. An enclosure
/// shares its path with its disks up to the SCSI port or the first expander.
pub const DEFAULT_PATH_PREFIX_MATCH_DEPTH: usize = 8;

/// Default number of paths expected to reach every device.
pub const DEFAULT_EXPECTED_PATH_COUNT: usize = 2;

/// Number of levels between a disk's device node and its end device node.
pub const END_DEVICE_DEPTH: usize = 2;

// Attribute names

pub const ATTR_MODEL: &str = "model";
pub const ATTR_VENDOR: &str = "vendor";
pub const ATTR_REVISION: &str = "rev";
pub const ATTR_SAS_ADDRESS: &str = "sas_address";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_VPD_PAGE_80: &str = "vpd_pg80";
pub const ATTR_BAY_IDENTIFIER: &str = "bay_identifier";
pub const ATTR_PHY_IDENTIFIER: &str = "phy_identifier";

// Child entry names

pub const BLOCK_DIR: &str = "block";
pub const SCSI_GENERIC_DIR: &str = "scsi_generic";
pub const SAS_DEVICE_DIR: &str = "sas_device";
pub const SAS_PHY_DIR: &str = "sas_phy";
pub const PORT_PREFIX: &str = "port-";
pub const PHY_PREFIX: &str = "phy-";
pub const ENCLOSURE_DEVICE_PREFIX: &str = "enclosure_device:";

// SCSI

/// Peripheral device type of a direct access block device.
pub const SCSI_TYPE_DISK: i64 = 0;

/// Peripheral device type of an enclosure services device.
pub const SCSI_TYPE_ENCLOSURE: i64 = 13;

/// Offset of the unit serial number inside VPD page 0x80.
pub const VPD_SERIAL_OFFSET: usize = 4;

/// Maximum number of bytes of VPD page 0x80 considered for the serial.
pub const VPD_SERIAL_MAX_LEN: usize = 128;

/// SES diagnostic page holding the element descriptors.
pub const SES_ELEMENT_DESCRIPTOR_PAGE: u8 = 0x7;

/// Default timeout of the SES diagnostic command, in seconds.
pub const DEFAULT_SES_TIMEOUT_SECS: u64 = 30;

/// Default configuration file path.
pub const CONFIG_PATH: &str = "/etc/sastopo/config.yaml";
