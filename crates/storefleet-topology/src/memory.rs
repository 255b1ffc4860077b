use crate::client::RegistryClient;
use crate::neighbour::Neighbour;
use crate::registration::ServiceRegistration;
use crate::RegistryError;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Registry {
    services: BTreeMap<String, ServiceRegistration>,
    calls: Vec<String>,
    unreachable: bool,
}

/// Registry held in process memory.
///
/// Records every call as `"<op> <argument>"` and can simulate an eviction
/// or an unreachable agent.
#[derive(Default)]
pub struct InMemoryRegistry {
    inner: Mutex<Registry>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>, RegistryError> {
        self.inner
            .lock()
            .map_err(|e| RegistryError::Transport(format!("registry poisoned: {e}")))
    }

    /// Add a registration owned by some other process.
    pub fn seed(&self, registration: ServiceRegistration) {
        if let Ok(mut r) = self.inner.lock() {
            r.services.insert(registration.id.clone(), registration);
        }
    }

    /// Drop an instance as if its TTL check had expired.
    pub fn evict(&self, instance_id: &str) -> bool {
        self.inner
            .lock()
            .map(|mut r| r.services.remove(instance_id).is_some())
            .unwrap_or(false)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        if let Ok(mut r) = self.inner.lock() {
            r.unreachable = unreachable;
        }
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.inner
            .lock()
            .map(|r| r.services.contains_key(instance_id))
            .unwrap_or(false)
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|r| r.calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut r) = self.inner.lock() {
            r.calls.clear();
        }
    }

    fn enter(&self, call: String) -> Result<MutexGuard<'_, Registry>, RegistryError> {
        let mut r = self.lock()?;
        r.calls.push(call);
        if r.unreachable {
            return Err(RegistryError::Transport("connection refused".to_owned()));
        }
        Ok(r)
    }
}

impl RegistryClient for InMemoryRegistry {
    fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        let mut r = self.enter(format!("register {}", registration.id))?;
        r.services
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }

    fn deregister(&self, instance_id: &str) -> Result<(), RegistryError> {
        let mut r = self.enter(format!("deregister {instance_id}"))?;
        match r.services.remove(instance_id) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotRegistered(instance_id.to_owned())),
        }
    }

    fn pass(&self, instance_id: &str) -> Result<(), RegistryError> {
        let r = self.enter(format!("pass {instance_id}"))?;
        if r.services.contains_key(instance_id) {
            Ok(())
        } else {
            Err(RegistryError::NotRegistered(instance_id.to_owned()))
        }
    }

    fn services(&self) -> Result<Vec<String>, RegistryError> {
        let r = self.enter("services".to_owned())?;
        let mut names: Vec<String> = r.services.values().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn instances(&self, service_name: &str) -> Result<Vec<Neighbour>, RegistryError> {
        let r = self.enter(format!("instances {service_name}"))?;
        Ok(r.services
            .values()
            .filter(|s| s.name == service_name)
            .map(Neighbour::from_registration)
            .collect())
    }
}
