use crate::neighbour::Neighbour;
use crate::registration::ServiceRegistration;
use crate::RegistryError;

/// Operations the topology service needs from a service registry.
pub trait RegistryClient: Send + Sync {
    fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError>;

    fn deregister(&self, instance_id: &str) -> Result<(), RegistryError>;

    /// Mark the TTL check of `instance_id` as passing.
    ///
    /// Fails with [`RegistryError::NotRegistered`] when the registry no
    /// longer knows the instance.
    fn pass(&self, instance_id: &str) -> Result<(), RegistryError>;

    /// Names of every service in the catalog.
    fn services(&self) -> Result<Vec<String>, RegistryError>;

    fn instances(&self, service_name: &str) -> Result<Vec<Neighbour>, RegistryError>;
}
