use crate::probe::{ResourceProbe, VolumeInfo};
use crate::spec::{ContainerSpec, VolumeSpec};
use crate::RuntimeError;

pub trait ContainerRuntime: ResourceProbe {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Create a `local` volume bound to `spec.host_path`.
    fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeInfo, RuntimeError>;

    /// Create (but do not start) a container. Returns the runtime id.
    ///
    /// Fails with [`RuntimeError::Conflict`] when the name is taken; there is
    /// no other protection against duplicates.
    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    fn connect_network(&self, network_id: &str, container_id: &str) -> Result<(), RuntimeError>;

    fn start_container(&self, container_id: &str) -> Result<(), RuntimeError>;
}

pub fn select_runtime(name: &str, endpoint: &str) -> Result<Box<dyn ContainerRuntime>, RuntimeError> {
    match name {
        "docker" => Ok(Box::new(crate::docker::DockerCli::with_endpoint(endpoint))),
        "mock" => Ok(Box::new(crate::mock::MockRuntime::new())),
        other => Err(RuntimeError::Unavailable(other.to_owned())),
    }
}
