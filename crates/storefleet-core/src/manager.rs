use crate::lifecycle::validate_transition;
use crate::provider::{InstanceSummary, ProviderRegistry, StoreProvider, StoreRequest};
use crate::ProviderError;
use std::sync::{Arc, OnceLock};
use storefleet_schema::{
    FleetConfig, ProvisioningLog, StoreDescriptor, StoreId, StoreStatus, LOCATION_UNKNOWN,
};
use storefleet_topology::TopologyService;
use tracing::{debug, error, info, warn};

/// Entry point for provisioning requests.
///
/// The configured provider is resolved on first use and shared afterwards.
pub struct StoreManager {
    config: FleetConfig,
    registry: ProviderRegistry,
    provider: OnceLock<Arc<dyn StoreProvider>>,
    topology: Option<Arc<TopologyService>>,
}

impl StoreManager {
    pub fn new(config: FleetConfig) -> Self {
        Self {
            config,
            registry: ProviderRegistry::builtin(),
            provider: OnceLock::new(),
            topology: None,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_topology(mut self, topology: Arc<TopologyService>) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Use `provider` instead of resolving one from the registry.
    #[must_use]
    pub fn with_provider(self, provider: Arc<dyn StoreProvider>) -> Self {
        let _ = self.provider.set(provider);
        self
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn provider(&self) -> Result<Arc<dyn StoreProvider>, ProviderError> {
        if let Some(p) = self.provider.get() {
            return Ok(Arc::clone(p));
        }
        let name = &self.config.provider.name;
        debug!("resolving store provider '{name}'");
        let created: Arc<dyn StoreProvider> = Arc::from(self.registry.create(name, &self.config)?);
        Ok(Arc::clone(self.provider.get_or_init(|| created)))
    }

    /// Provision a store and return its descriptor.
    ///
    /// A pipeline failure is not an error here: the descriptor stays PENDING
    /// and carries the failure log. Only an unresolvable provider settles the
    /// store as FAILED.
    pub fn create_store(
        &self,
        owner: &str,
        name: &str,
        id: Option<StoreId>,
    ) -> Result<StoreDescriptor, ProviderError> {
        let mut store = match id {
            Some(id) => StoreDescriptor::pending_with_id(id, owner, name),
            None => StoreDescriptor::pending(owner, name),
        };
        info!("creating store {} for {owner}", store.id);

        let provider = match self.provider() {
            Ok(p) => p,
            Err(e) => {
                error!("no provider for store {}: {e}", store.id);
                settle(&mut store, StoreStatus::Failed)?;
                store.log = e.to_string();
                return Ok(store);
            }
        };

        let report = provider.create_instance(&StoreRequest::from(&store));
        store.log = report.log.render();
        match report.result {
            Ok(_) => {
                settle(&mut store, StoreStatus::Available)?;
                store.location = self.locate(name);
                info!("store {} available at {}", store.id, store.location);
            }
            Err(e) => {
                warn!("store {} provisioning aborted: {e}", store.id);
                settle(&mut store, StoreStatus::Pending)?;
            }
        }
        Ok(store)
    }

    pub fn list_stores(&self) -> Result<Vec<InstanceSummary>, ProviderError> {
        self.provider()?.list_instances()
    }

    pub fn destroy_store(&self, id: &str) -> Result<ProvisioningLog, ProviderError> {
        info!("destroying store {id}");
        self.provider()?.destroy_instance(id)
    }

    fn locate(&self, name: &str) -> String {
        let Some(topology) = &self.topology else {
            return LOCATION_UNKNOWN.to_owned();
        };
        match topology.lookup(name) {
            Ok(Some(location)) => location,
            Ok(None) => LOCATION_UNKNOWN.to_owned(),
            Err(e) => {
                warn!("location lookup for '{name}' failed: {e}");
                LOCATION_UNKNOWN.to_owned()
            }
        }
    }
}

fn settle(store: &mut StoreDescriptor, to: StoreStatus) -> Result<(), ProviderError> {
    validate_transition(store.status, to)?;
    store.status = to;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProvisioningReport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storefleet_schema::parse_config_str;

    struct CountingProvider {
        created: AtomicUsize,
    }

    impl StoreProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn list_instances(&self) -> Result<Vec<InstanceSummary>, ProviderError> {
            Ok(Vec::new())
        }

        fn create_instance(&self, request: &StoreRequest) -> ProvisioningReport {
            self.created.fetch_add(1, Ordering::SeqCst);
            let mut log = ProvisioningLog::new(1);
            log.completed(1, "done");
            ProvisioningReport {
                log,
                result: Ok(request.id.to_string()),
            }
        }

        fn destroy_instance(&self, _id: &str) -> Result<ProvisioningLog, ProviderError> {
            Ok(ProvisioningLog::new(0))
        }
    }

    fn counting(_: &FleetConfig) -> Result<Box<dyn StoreProvider>, ProviderError> {
        Ok(Box::new(CountingProvider {
            created: AtomicUsize::new(0),
        }))
    }

    #[test]
    fn provider_resolved_once() {
        let cfg = parse_config_str("[provider]\nname = \"counting\"\n").unwrap();
        let mut registry = ProviderRegistry::empty();
        registry.register("counting", counting);
        let manager = StoreManager::new(cfg).with_registry(registry);

        let a = manager.provider().unwrap();
        let b = manager.provider().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "counting");
    }

    #[test]
    fn unknown_provider_fails_store() {
        let cfg = parse_config_str("[provider]\nname = \"k8s\"\n").unwrap();
        let store = StoreManager::new(cfg)
            .create_store("alice", "shop", None)
            .unwrap();
        assert_eq!(store.status, StoreStatus::Failed);
        assert_eq!(store.log, "unable to find a provider for name: k8s");
        assert!(!store.has_location());
    }

    #[test]
    fn success_without_topology_has_unknown_location() {
        let cfg = parse_config_str("[provider]\nname = \"counting\"\n").unwrap();
        let mut registry = ProviderRegistry::empty();
        registry.register("counting", counting);
        let store = StoreManager::new(cfg)
            .with_registry(registry)
            .create_store("alice", "shop", Some(StoreId::from("s-1")))
            .unwrap();
        assert_eq!(store.status, StoreStatus::Available);
        assert_eq!(store.id.as_str(), "s-1");
        assert_eq!(store.location, LOCATION_UNKNOWN);
        assert_eq!(store.log, "[Step 1/1] -COMPLETED- done\n");
    }
}
