use crate::ProviderError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use storefleet_schema::{FleetConfig, ProvisioningLog, StoreDescriptor, StoreId};
use tracing::error;

/// Inputs of one provisioning run. Values are used verbatim in resource
/// names, environment variables and remote command lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub id: StoreId,
    pub owner: String,
    pub name: String,
}

impl StoreRequest {
    pub fn new(id: impl Into<StoreId>, owner: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            owner: owner.to_owned(),
            name: name.to_owned(),
        }
    }
}

impl From<&StoreDescriptor> for StoreRequest {
    fn from(d: &StoreDescriptor) -> Self {
        Self {
            id: d.id.clone(),
            owner: d.owner.clone(),
            name: d.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl fmt::Display for InstanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.image {
            Some(image) => write!(f, "{} / {image}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Outcome of `create_instance`: the step log up to the last executed step,
/// and the store id or the error that aborted the pipeline.
#[derive(Debug)]
pub struct ProvisioningReport {
    pub log: ProvisioningLog,
    pub result: Result<String, ProviderError>,
}

impl ProvisioningReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub trait StoreProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Empty when nothing is deployed; errors only on transport failures.
    fn list_instances(&self) -> Result<Vec<InstanceSummary>, ProviderError>;

    /// Run the provider pipeline. A failing step ends the run; earlier steps
    /// are not rolled back.
    fn create_instance(&self, request: &StoreRequest) -> ProvisioningReport;

    /// Best-effort teardown. Providers without teardown return an empty log.
    fn destroy_instance(&self, id: &str) -> Result<ProvisioningLog, ProviderError>;
}

pub type ProviderFactory = fn(&FleetConfig) -> Result<Box<dyn StoreProvider>, ProviderError>;

/// Name to constructor map, filled once at startup.
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the `docker` and `dokku` providers.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("docker", crate::docker::DockerProvider::from_config);
        registry.register("dokku", crate::dokku::DokkuProvider::from_config);
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: ProviderFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Construct the provider registered as `name`.
    pub fn create(
        &self,
        name: &str,
        config: &FleetConfig,
    ) -> Result<Box<dyn StoreProvider>, ProviderError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            error!("no store provider named '{name}'");
            ProviderError::NotFound(name.to_owned())
        })?;
        factory(config)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Record a failed step and hand the error back to the pipeline.
pub(crate) trait LogStep<T> {
    fn step(self, log: &mut ProvisioningLog, index: usize, what: &str) -> Result<T, ProviderError>;
}

impl<T, E: Into<ProviderError>> LogStep<T> for Result<T, E> {
    fn step(self, log: &mut ProvisioningLog, index: usize, what: &str) -> Result<T, ProviderError> {
        self.map_err(|e| {
            let e = e.into();
            error!("[step {index}/{}] {what}: {e}", log.total());
            log.failed(index, format!("{what}: {e}"));
            e
        })
    }
}
