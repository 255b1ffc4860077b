use crate::spec::VolumeBind;
use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub driver: String,
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub running: bool,
}

impl ContainerSummary {
    /// Runtimes report names with or without a leading `/`.
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    }
}

/// Observed configuration of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub hostname: String,
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub network_mode: String,
    pub binds: Vec<String>,
}

impl ContainerDetails {
    pub fn parsed_binds(&self) -> Vec<VolumeBind> {
        self.binds.iter().filter_map(|b| VolumeBind::parse(b)).collect()
    }
}

/// Read-only queries against a container runtime.
///
/// Lookups by name are exact matches; `Ok(None)` means the resource does not
/// exist, errors are reserved for transport or parse failures.
pub trait ResourceProbe: Send + Sync {
    fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>, RuntimeError>;

    fn find_volume(&self, name: &str) -> Result<Option<VolumeInfo>, RuntimeError>;

    /// All containers, stopped ones included.
    fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    fn find_container(&self, name: &str) -> Result<Option<ContainerSummary>, RuntimeError> {
        Ok(self
            .list_containers()?
            .into_iter()
            .find(|c| c.has_name(name)))
    }

    fn inspect_container(&self, id: &str) -> Result<ContainerDetails, RuntimeError>;
}
