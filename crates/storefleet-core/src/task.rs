//! Contract between provisioning steps and an external task runner.
//!
//! A runner hands each [`Task`] a string-keyed [`TaskContext`] and a log the
//! task reports into. Tasks validate their own inputs: a missing mandatory key
//! fails the task before any resource is touched.

use crate::docker::{routing_labels, StoreEnv, STORE_ROOT};
use crate::TaskError;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use storefleet_runtime::{verify_or_create, ContainerRuntime, ContainerSpec, ReconciliationOutcome, VolumeBind};
use storefleet_schema::ProvisioningLog;
use tracing::{error, info};

pub const STORE_NETWORK_NAME: &str = "STORE_NETWORK_NAME";
pub const STORE_IMAGE_NAME: &str = "STORE_IMAGE_NAME";
pub const STORE_NAME: &str = "STORE_NAME";
pub const STORE_VOLUME_NAME: &str = "STORE_VOLUME_NAME";
pub const STORE_CONTAINER_NAME: &str = "STORE_CONTAINER_NAME";
pub const STORE_OWNER: &str = "STORE_OWNER";
pub const STORE_FQDN: &str = "STORE_FQDN";
pub const STORE_TOPOLOGY_ENABLED: &str = "STORE_TOPOLOGY_ENABLED";
pub const STORE_TOPOLOGY_HOST: &str = "STORE_TOPOLOGY_HOST";
pub const STORE_TOPOLOGY_PORT: &str = "STORE_TOPOLOGY_PORT";
pub const STORE_DB_CONTAINER_NAME: &str = "STORE_DB_CONTAINER_NAME";
pub const STORE_DB_NAME: &str = "STORE_DB_NAME";
pub const STORE_DB_USER: &str = "STORE_DB_USER";
pub const STORE_DB_PASSWORD: &str = "STORE_DB_PASSWORD";

const DEFAULT_TOPOLOGY_HOST: &str = "consul";
const DEFAULT_TOPOLOGY_PORT: u16 = 8500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskContext {
    values: BTreeMap<String, String>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn mandatory(&self, key: &str) -> Result<&str, TaskError> {
        self.get(key)
            .ok_or_else(|| TaskError::MissingContextValue(key.to_owned()))
    }

    /// Parsed value of `key`, or `default` when the key is absent.
    pub fn value_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, TaskError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| TaskError::InvalidContextValue {
                key: key.to_owned(),
                value: raw.to_owned(),
            }),
        }
    }
}

pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the task once. Progress and the final outcome are reported into
    /// `log`; an error is always preceded by a FAILED entry.
    fn execute(&self, ctx: &TaskContext, log: &mut ProvisioningLog) -> Result<(), TaskError>;
}

/// Verify-or-create the store application container from task inputs.
pub struct CreateStoreContainerTask {
    runtime: Arc<dyn ContainerRuntime>,
}

impl CreateStoreContainerTask {
    pub const NAME: &'static str = "StartDockerStore";

    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Desired container built from the context. Fails on the first missing
    /// mandatory key.
    pub fn container_spec(ctx: &TaskContext) -> Result<ContainerSpec, TaskError> {
        let network = ctx.mandatory(STORE_NETWORK_NAME)?;
        let image = ctx.mandatory(STORE_IMAGE_NAME)?;
        let volume = ctx.mandatory(STORE_VOLUME_NAME)?;
        let container = ctx.mandatory(STORE_CONTAINER_NAME)?;
        let name = ctx.mandatory(STORE_NAME)?;
        let owner = ctx.mandatory(STORE_OWNER)?;
        let fqdn = ctx.mandatory(STORE_FQDN)?;
        let topology_enabled = ctx.value_or(STORE_TOPOLOGY_ENABLED, true)?;
        let topology_host = ctx.get(STORE_TOPOLOGY_HOST).unwrap_or(DEFAULT_TOPOLOGY_HOST);
        let topology_port = ctx.value_or(STORE_TOPOLOGY_PORT, DEFAULT_TOPOLOGY_PORT)?;
        let db_container = ctx.mandatory(STORE_DB_CONTAINER_NAME)?;
        let db_name = ctx.mandatory(STORE_DB_NAME)?;
        let db_user = ctx.mandatory(STORE_DB_USER)?;
        let db_password = ctx.mandatory(STORE_DB_PASSWORD)?;

        let db_url = format!("jdbc:postgresql://{db_container}:5432/{db_name}");
        let env = StoreEnv {
            owner,
            fqdn,
            registry_host: topology_host,
            registry_port: topology_port,
            db_user,
            db_password,
            db_url: &db_url,
        };
        let mut spec = env
            .apply(ContainerSpec::new(
                container,
                image,
                VolumeBind::new(volume, STORE_ROOT),
            ))
            .with_env("STORE.TOPOLOGY.ENABLED", topology_enabled)
            .with_network_mode(network);
        spec.labels = routing_labels(name, network, fqdn);
        Ok(spec)
    }
}

impl Task for CreateStoreContainerTask {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn execute(&self, ctx: &TaskContext, log: &mut ProvisioningLog) -> Result<(), TaskError> {
        let spec = match Self::container_spec(ctx) {
            Ok(spec) => spec,
            Err(e) => {
                log.failed(1, e.to_string());
                return Err(e);
            }
        };

        let outcome = verify_or_create(&*self.runtime, &spec).inspect_err(|e| {
            log.failed(1, format!("Store container lookup failed: {e}"));
        })?;
        match outcome {
            ReconciliationOutcome::Completed(id) => {
                info!("store container '{}' created: {id}", spec.name);
                log.completed(1, format!("Store container created with id: '{id}'"));
                Ok(())
            }
            ReconciliationOutcome::AlreadyExists(id) => {
                log.progress(
                    1,
                    format!(
                        "Found existing store container with name: '{}', id: '{id}'",
                        spec.name
                    ),
                );
                log.completed(
                    1,
                    format!(
                        "Store container already exists for name: '{}' with id: '{id}'",
                        spec.name
                    ),
                );
                Ok(())
            }
            ReconciliationOutcome::Failed(reason) => {
                error!("store container task failed: {reason}");
                log.failed(1, reason.clone());
                Err(TaskError::Failed(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefleet_runtime::mock::MockRuntime;
    use storefleet_schema::StepTag;

    fn context() -> TaskContext {
        TaskContext::new()
            .with(STORE_NETWORK_NAME, "mbyte.net")
            .with(STORE_IMAGE_NAME, "jerome/store:25.1")
            .with(STORE_NAME, "shop")
            .with(STORE_VOLUME_NAME, "mbyte.42.data.volume")
            .with(STORE_CONTAINER_NAME, "mbyte.42.store.cont")
            .with(STORE_OWNER, "alice")
            .with(STORE_FQDN, "shop.stores.mbyte.fr")
            .with(STORE_DB_CONTAINER_NAME, "mbyte.42.db.cont")
            .with(STORE_DB_NAME, "store")
            .with(STORE_DB_USER, "42")
            .with(STORE_DB_PASSWORD, "secret")
    }

    #[test]
    fn missing_key_fails_before_runtime_calls() {
        let rt = Arc::new(MockRuntime::new());
        let task = CreateStoreContainerTask::new(rt.clone());
        let mut ctx = context();
        ctx.values.remove(STORE_FQDN);

        let mut log = ProvisioningLog::new(1);
        let err = task.execute(&ctx, &mut log).unwrap_err();
        assert!(matches!(err, TaskError::MissingContextValue(ref k) if k == STORE_FQDN));
        assert!(rt.calls().is_empty());
        assert_eq!(log.count(StepTag::Failed), 1);
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let ctx = context().with(STORE_TOPOLOGY_ENABLED, "maybe");
        assert!(matches!(
            CreateStoreContainerTask::container_spec(&ctx),
            Err(TaskError::InvalidContextValue { .. })
        ));
    }

    #[test]
    fn spec_defaults() {
        let spec = CreateStoreContainerTask::container_spec(&context()).unwrap();
        assert!(spec.env.contains("STORE.TOPOLOGY.ENABLED=true"));
        assert!(spec.env.contains("STORE.TOPOLOGY.HOST=consul"));
        assert!(spec.env.contains("STORE.TOPOLOGY.PORT=8500"));
        assert_eq!(spec.network_mode.as_deref(), Some("mbyte.net"));
        assert!(spec.labels.contains_key("traefik.http.routers.shop.rule"));
    }

    #[test]
    fn second_run_finds_existing_container() {
        let rt = Arc::new(MockRuntime::new());
        let task = CreateStoreContainerTask::new(rt.clone());

        let mut first = ProvisioningLog::new(1);
        task.execute(&context(), &mut first).unwrap();
        assert_eq!(
            first.last().unwrap().message,
            "Store container created with id: 'mock-0001'"
        );

        let mut second = ProvisioningLog::new(1);
        task.execute(&context(), &mut second).unwrap();
        assert_eq!(
            second.last().unwrap().message,
            "Store container already exists for name: 'mbyte.42.store.cont' with id: 'mock-0001'"
        );
        assert_eq!(rt.container_count(), 1);
    }

    #[test]
    fn drifted_image_fails() {
        let rt = Arc::new(MockRuntime::new());
        let task = CreateStoreContainerTask::new(rt.clone());
        task.execute(&context(), &mut ProvisioningLog::new(1)).unwrap();

        let mut log = ProvisioningLog::new(1);
        let ctx = context().with(STORE_IMAGE_NAME, "jerome/store:26.0");
        let err = task.execute(&ctx, &mut log).unwrap_err();
        assert_eq!(
            err.to_string(),
            "existing container image 'jerome/store:25.1' does not match expected 'jerome/store:26.0'"
        );
        assert!(log.has_failure());
    }
}
