//! Configuration, store records, and naming rules for storefleet.
//!
//! This crate defines the schema layer: TOML configuration parsing
//! (`FleetConfig`), the `StoreDescriptor` record handed to the persistence
//! collaborator, deterministic derivation of every per-store resource name
//! from the store id (`StoreNames`), and the structured provisioning log
//! (`ProvisioningLog`) rendered as the `[Step k/N]` audit trail.

pub mod config;
pub mod log;
pub mod naming;
pub mod types;

pub use config::{
    load_config, parse_config_str, ConfigError, DockerSection, DokkuSection, FleetConfig,
    ProviderSection, ServiceSection, TopologySection, Workdir,
};
pub use log::{LogEntry, ProvisioningLog, StepTag};
pub use naming::{derive_password, NamingRules, StoreNames};
pub use types::{StoreDescriptor, StoreId, StoreStatus, LOCATION_UNKNOWN};
