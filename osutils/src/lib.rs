pub mod dependencies;
pub mod sg_ses;
pub mod sysfs;
