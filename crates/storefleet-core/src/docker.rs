//! Nine-step provisioning pipeline against a container runtime.
//!
//! Volumes (steps 2 and 6) are reused when present. Containers (steps 3 and
//! 7) are created on every run; a retry after a partial failure hits the
//! runtime's name-uniqueness check and fails at that step.

use crate::provider::{InstanceSummary, LogStep, ProvisioningReport, StoreProvider, StoreRequest};
use crate::ProviderError;
use std::collections::BTreeMap;
use std::sync::Arc;
use storefleet_runtime::{
    ensure_volume, select_runtime, ContainerRuntime, ContainerSpec, ReconciliationOutcome, ResourceProbe,
    VolumeBind, VolumeSpec,
};
use storefleet_schema::{DockerSection, FleetConfig, NamingRules, ProvisioningLog, StoreNames};
use tracing::{error, info, warn};

pub const DOCKER_STEPS: usize = 9;
pub const STORE_HTTP_PORT: u16 = 8080;
pub const STORE_ROOT: &str = "/home/jboss";
pub const DB_DATA_DIR: &str = "/var/lib/postgresql/data";

/// Environment of the store application container.
pub struct StoreEnv<'a> {
    pub owner: &'a str,
    pub fqdn: &'a str,
    pub registry_host: &'a str,
    pub registry_port: u16,
    pub db_user: &'a str,
    pub db_password: &'a str,
    pub db_url: &'a str,
}

impl StoreEnv<'_> {
    pub fn apply(&self, spec: ContainerSpec) -> ContainerSpec {
        spec.with_env("QUARKUS_HTTP_PORT", STORE_HTTP_PORT)
            .with_env("STORE.ROOT", STORE_ROOT)
            .with_env("STORE.AUTH.OWNER", self.owner)
            .with_env("STORE.TOPOLOGY.HOST", self.registry_host)
            .with_env("STORE.TOPOLOGY.PORT", self.registry_port)
            .with_env("STORE.TOPOLOGY.SERVICE.HOST", self.fqdn)
            .with_env("QUARKUS.DATASOURCE.USERNAME", self.db_user)
            .with_env("QUARKUS.DATASOURCE.PASSWORD", self.db_password)
            .with_env("QUARKUS.DATASOURCE.JDBC.URL", self.db_url)
    }
}

/// Traefik labels routing `Host(fqdn)` over TLS to the store's HTTP port.
pub fn routing_labels(router: &str, network: &str, fqdn: &str) -> BTreeMap<String, String> {
    let service = format!("{router}-http");
    BTreeMap::from([
        ("traefik.enable".to_owned(), "true".to_owned()),
        ("traefik.docker.network".to_owned(), network.to_owned()),
        (
            format!("traefik.http.routers.{router}.rule"),
            format!("Host(`{fqdn}`)"),
        ),
        (
            format!("traefik.http.routers.{router}.entrypoints"),
            "websecure".to_owned(),
        ),
        (
            format!("traefik.http.routers.{router}.tls"),
            "true".to_owned(),
        ),
        (
            format!("traefik.http.routers.{router}.service"),
            service.clone(),
        ),
        (
            format!("traefik.http.services.{service}.loadbalancer.server.port"),
            STORE_HTTP_PORT.to_string(),
        ),
    ])
}

#[derive(Debug, Clone, Copy)]
enum VolumeKind {
    Database,
    Data,
}

impl VolumeKind {
    fn label(self) -> &'static str {
        match self {
            VolumeKind::Database => "Database",
            VolumeKind::Data => "Data",
        }
    }

    fn lower(self) -> &'static str {
        match self {
            VolumeKind::Database => "database",
            VolumeKind::Data => "data",
        }
    }

    /// Directory naming uses the short form.
    fn short(self) -> &'static str {
        match self {
            VolumeKind::Database => "db",
            VolumeKind::Data => "data",
        }
    }
}

pub struct DockerProvider {
    settings: DockerSection,
    rules: NamingRules,
    runtime: Arc<dyn ContainerRuntime>,
}

impl DockerProvider {
    pub fn new(settings: DockerSection, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let rules = NamingRules::from(&settings);
        Self {
            settings,
            rules,
            runtime,
        }
    }

    pub fn from_config(config: &FleetConfig) -> Result<Box<dyn StoreProvider>, ProviderError> {
        let settings = config.docker()?.clone();
        info!("docker provider using {}", settings.server);
        let runtime: Arc<dyn ContainerRuntime> = Arc::from(select_runtime("docker", &settings.server)?);
        if !runtime.available() {
            warn!("docker client cannot reach {}", settings.server);
        }
        Ok(Box::new(Self::new(settings, runtime)))
    }

    pub fn names(&self, request: &StoreRequest) -> StoreNames {
        StoreNames::derive(&request.id, &request.name, &self.rules)
    }

    pub fn db_container_spec(&self, names: &StoreNames) -> ContainerSpec {
        ContainerSpec::new(
            &names.db_container,
            &self.settings.db_image,
            VolumeBind::new(names.db_volume.clone(), DB_DATA_DIR),
        )
        .with_env("POSTGRES_USER", &names.db_user)
        .with_env("POSTGRES_PASSWORD", &names.db_password)
        .with_env("POSTGRES_DB", &names.db_name)
    }

    pub fn store_container_spec(&self, request: &StoreRequest, names: &StoreNames) -> ContainerSpec {
        let db_url = names.db_url();
        let env = StoreEnv {
            owner: &request.owner,
            fqdn: &names.fqdn,
            registry_host: &self.settings.registry_host,
            registry_port: self.settings.registry_port,
            db_user: &names.db_user,
            db_password: &names.db_password,
            db_url: &db_url,
        };
        let mut spec = env.apply(ContainerSpec::new(
            &names.store_container,
            &self.settings.image,
            VolumeBind::new(names.data_volume.clone(), STORE_ROOT),
        ));
        spec.labels = routing_labels(&request.id, &self.settings.network, &names.fqdn);
        spec
    }

    /// Steps 2 and 6: backing directory, then the bind volume.
    fn volume_step(
        &self,
        log: &mut ProvisioningLog,
        index: usize,
        kind: VolumeKind,
        names: &StoreNames,
    ) -> Result<(), ProviderError> {
        let (volume, local_dir, host_dir) = match kind {
            VolumeKind::Database => (&names.db_volume, &names.db_local_dir, &names.db_host_dir),
            VolumeKind::Data => (&names.data_volume, &names.data_local_dir, &names.data_host_dir),
        };
        let short = kind.short();
        std::fs::create_dir_all(local_dir).step(
            log,
            index,
            &format!(
                "Failed to create directories for store {short} volume: {}",
                local_dir.display()
            ),
        )?;
        info!("created directories for {short} volume: {}", local_dir.display());
        log.progress(
            index,
            format!(
                "Created directories for {short} volume: {}",
                local_dir.display()
            ),
        );

        let spec = VolumeSpec {
            name: volume.clone(),
            host_path: host_dir.clone(),
        };
        let outcome = ensure_volume(&*self.runtime, &spec).step(
            log,
            index,
            &format!("{} volume lookup failed", kind.label()),
        )?;
        match outcome {
            ReconciliationOutcome::Completed(name) => {
                info!("{} volume created: {name}", kind.lower());
                log.completed(index, format!("{} volume created: {name}", kind.label()));
                Ok(())
            }
            ReconciliationOutcome::AlreadyExists(name) => {
                info!("found existing {} volume: {name}", kind.lower());
                log.completed(
                    index,
                    format!("Found existing {} volume: {name}", kind.lower()),
                );
                Ok(())
            }
            ReconciliationOutcome::Failed(reason) => {
                error!("{reason}");
                log.failed(index, reason.clone());
                Err(ProviderError::Reconciliation(reason))
            }
        }
    }

    fn run_pipeline(&self, request: &StoreRequest, log: &mut ProvisioningLog) -> Result<String, ProviderError> {
        let names = self.names(request);
        let network_name = self.settings.network.as_str();

        // 1: the tenant network is a deployment precondition
        let network = self
            .runtime
            .find_network(network_name)
            .step(log, 1, &format!("{network_name} network lookup failed"))?;
        let Some(network) = network else {
            let msg = format!("{network_name} network not found, cannot create store app");
            error!("{msg}");
            log.failed(1, msg.clone());
            return Err(ProviderError::Precondition(msg));
        };
        info!("found existing network, name: {}, id: {}", network.name, network.id);
        log.completed(
            1,
            format!(
                "Found existing network, name:{}, id:{}",
                network.name, network.id
            ),
        );

        // 2
        self.volume_step(log, 2, VolumeKind::Database, &names)?;

        // 3
        let db_container = self
            .runtime
            .create_container(&self.db_container_spec(&names))
            .step(log, 3, "Failed to create database container")?;
        log.completed(
            3,
            format!("Database container created for store: {db_container}"),
        );

        // 4
        self.runtime
            .connect_network(&network.id, &db_container)
            .step(log, 4, "Failed to connect database container")?;
        log.completed(
            4,
            format!("Database container connected to network: {network_name}"),
        );

        // 5
        self.runtime
            .start_container(&db_container)
            .step(log, 5, "Failed to start database container")?;
        log.completed(
            5,
            format!("Database container started for store: {db_container}"),
        );

        // 6
        self.volume_step(log, 6, VolumeKind::Data, &names)?;

        // 7
        let store_container = self
            .runtime
            .create_container(&self.store_container_spec(request, &names))
            .step(log, 7, "Failed to create store container")?;
        log.completed(7, format!("Store container created: {store_container}"));

        // 8
        self.runtime
            .connect_network(&network.id, &store_container)
            .step(log, 8, "Failed to connect store container")?;
        log.completed(
            8,
            format!("Store container connected to network: {network_name}"),
        );

        // 9
        self.runtime
            .start_container(&store_container)
            .step(log, 9, "Failed to start store container")?;
        log.completed(
            9,
            format!("Store container started for id: {store_container}"),
        );

        Ok(request.id.to_string())
    }
}

impl StoreProvider for DockerProvider {
    fn name(&self) -> &str {
        "docker"
    }

    fn list_instances(&self) -> Result<Vec<InstanceSummary>, ProviderError> {
        info!("listing store containers");
        Ok(self
            .runtime
            .list_containers()?
            .into_iter()
            .filter(|c| c.running)
            .map(|c| InstanceSummary {
                name: c.names.concat(),
                image: Some(c.image),
            })
            .collect())
    }

    fn create_instance(&self, request: &StoreRequest) -> ProvisioningReport {
        info!("starting new store creation for {}", request.id);
        let mut log = ProvisioningLog::new(DOCKER_STEPS);
        let result = self.run_pipeline(request, &mut log);
        ProvisioningReport { log, result }
    }

    fn destroy_instance(&self, id: &str) -> Result<ProvisioningLog, ProviderError> {
        info!("destroy requested for {id}: docker provider keeps store resources");
        Ok(ProvisioningLog::new(0))
    }
}
