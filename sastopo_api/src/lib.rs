pub mod config;
pub mod constants;
pub mod error;
pub mod source;
pub mod topology;

pub use source::{AttributeSource, DiagnosticRunner};
pub use topology::{
    Device, DeviceClass, DevicePath, Enclosure, EnclosureId, Hba, HbaPort, IdentityKey,
    LogicalUnit, LogicalUnitId, Phy, Topology,
};
