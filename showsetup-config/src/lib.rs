//! Provisioning configuration for Perforce show setup.
//!
//! A configuration file maps division keys (`VFX`, `TS`, ...) to the
//! protection lines, groups and streams every new show of that division
//! receives. This crate owns the data model and the file loader; rendering
//! the `{show}`/`{user}`/`{mdy_str}` placeholders happens at provisioning
//! time.

pub mod config;
pub mod loader;

pub use config::{
    ConfigError, DivisionConfigs, GroupSpec, MemberRef, ProvisioningConfig, Relation,
    StreamTemplate, StreamType, EMPTY_GROUP_SENTINEL,
};
pub use loader::{load_file, ConfigLoader};
