use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("provider.name must not be empty")]
    EmptyProviderName,
    #[error("provider '{0}' is selected but [provider.{0}] is missing")]
    MissingSection(String),
    #[error("topology is enabled but topology.service.name is empty")]
    EmptyServiceName,
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    pub provider: ProviderSection,
    #[serde(default)]
    pub topology: TopologySection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    pub name: String,
    #[serde(default)]
    pub docker: Option<DockerSection>,
    #[serde(default)]
    pub dokku: Option<DokkuSection>,
}

/// Direct container-runtime backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DockerSection {
    /// Runtime endpoint, passed to the runtime client as its host.
    pub server: String,
    /// Application image for store containers.
    pub image: String,
    #[serde(default = "default_db_image")]
    pub db_image: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_instance_prefix")]
    pub instance_prefix: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Registry endpoint injected into store containers.
    #[serde(default = "default_registry_host")]
    pub registry_host: String,
    #[serde(default = "default_registry_port")]
    pub registry_port: u16,
    pub workdir: Workdir,
}

/// Store directories as seen from this process (`local`) and from the
/// runtime daemon (`host`). Both point at the same storage.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Workdir {
    pub host: PathBuf,
    pub local: PathBuf,
}

/// Remote PaaS control-plane backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DokkuSection {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_ssh_user")]
    pub user: String,
    pub image: String,
    pub identity: PathBuf,
    pub known_hosts: PathBuf,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Optional application settings pushed with `config:set`.
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub oidc_provider_url: Option<String>,
    #[serde(default)]
    pub oidc_client_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TopologySection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_topology_host")]
    pub host: String,
    #[serde(default = "default_registry_port")]
    pub port: u16,
    #[serde(default)]
    pub https: bool,
    /// Naming prefix shared by every store of this deployment.
    #[serde(default = "default_service_prefix")]
    pub prefix: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default)]
    pub service: ServiceSection,
}

impl Default for TopologySection {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_topology_host(),
            port: default_registry_port(),
            https: false,
            prefix: default_service_prefix(),
            heartbeat_secs: default_heartbeat_secs(),
            service: ServiceSection::default(),
        }
    }
}

impl TopologySection {
    /// Base URL of the registry agent API.
    pub fn registry_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// How this process advertises itself in the registry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_service_host")]
    pub host: String,
    #[serde(default = "default_service_port")]
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: default_service_host(),
            port: default_service_port(),
            protocol: default_protocol(),
        }
    }
}

impl FleetConfig {
    /// Structural checks that do not depend on which provider gets resolved.
    ///
    /// A selected provider without its section is reported by
    /// [`FleetConfig::docker`] / [`FleetConfig::dokku`] at lookup time instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.name.trim().is_empty() {
            return Err(ConfigError::EmptyProviderName);
        }
        if self.topology.enabled {
            if self.topology.service.name.trim().is_empty() {
                return Err(ConfigError::EmptyServiceName);
            }
            if self.topology.heartbeat_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "topology.heartbeat_secs",
                    reason: "must be greater than zero".to_owned(),
                });
            }
        }
        if let Some(dokku) = &self.provider.dokku {
            if dokku.poll_interval_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "provider.dokku.poll_interval_ms",
                    reason: "must be greater than zero".to_owned(),
                });
            }
        }
        Ok(())
    }

    pub fn docker(&self) -> Result<&DockerSection, ConfigError> {
        self.provider
            .docker
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSection("docker".to_owned()))
    }

    pub fn dokku(&self) -> Result<&DokkuSection, ConfigError> {
        self.provider
            .dokku
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSection("dokku".to_owned()))
    }
}

fn default_db_image() -> String {
    "postgres:latest".to_owned()
}

fn default_network() -> String {
    "mbyte.net".to_owned()
}

fn default_instance_prefix() -> String {
    "mbyte.".to_owned()
}

fn default_domain() -> String {
    "stores.mbyte.fr".to_owned()
}

fn default_registry_host() -> String {
    "consul".to_owned()
}

fn default_registry_port() -> u16 {
    8500
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_user() -> String {
    "dokku".to_owned()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_topology_host() -> String {
    "localhost".to_owned()
}

fn default_service_prefix() -> String {
    "mbyte.store.".to_owned()
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_service_host() -> String {
    "localhost".to_owned()
}

fn default_service_port() -> u16 {
    80
}

fn default_protocol() -> String {
    "http".to_owned()
}

pub fn parse_config_str(input: &str) -> Result<FleetConfig, ConfigError> {
    let config: FleetConfig = toml::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<FleetConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
