//! Deterministic resource names for a store.
//!
//! Every resource a pipeline touches for a store is named from the store id
//! through [`StoreNames::derive`]. Pipeline steps never build names on their
//! own, so two steps cannot disagree about which volume or container belongs
//! to a store.

use crate::config::{DockerSection, Workdir};
use std::path::PathBuf;

const VOLUME_SUFFIX: &str = ".volume";
const CONTAINER_SUFFIX: &str = ".cont";
const DB_SUFFIX: &str = ".db";
const DATA_SUFFIX: &str = ".data";
const STORE_SUFFIX: &str = ".store";
const DB_PATH_SEGMENT: &str = "db";
const DATA_PATH_SEGMENT: &str = "data";
const DB_NAME: &str = "store";

/// Deployment-wide inputs to name derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRules {
    pub instance_prefix: String,
    pub domain: String,
    pub workdir: Workdir,
}

impl From<&DockerSection> for NamingRules {
    fn from(section: &DockerSection) -> Self {
        Self {
            instance_prefix: section.instance_prefix.clone(),
            domain: section.domain.clone(),
            workdir: section.workdir.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
    pub db_volume: String,
    pub data_volume: String,
    pub db_container: String,
    pub store_container: String,
    pub db_local_dir: PathBuf,
    pub db_host_dir: PathBuf,
    pub data_local_dir: PathBuf,
    pub data_host_dir: PathBuf,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    /// Public hostname, built from the display name rather than the id.
    pub fqdn: String,
}

impl StoreNames {
    pub fn derive(id: &str, name: &str, rules: &NamingRules) -> Self {
        let base = format!("{}{id}", rules.instance_prefix);
        Self {
            db_volume: format!("{base}{DB_SUFFIX}{VOLUME_SUFFIX}"),
            data_volume: format!("{base}{DATA_SUFFIX}{VOLUME_SUFFIX}"),
            db_container: format!("{base}{DB_SUFFIX}{CONTAINER_SUFFIX}"),
            store_container: format!("{base}{STORE_SUFFIX}{CONTAINER_SUFFIX}"),
            db_local_dir: rules.workdir.local.join(id).join(DB_PATH_SEGMENT),
            db_host_dir: rules.workdir.host.join(id).join(DB_PATH_SEGMENT),
            data_local_dir: rules.workdir.local.join(id).join(DATA_PATH_SEGMENT),
            data_host_dir: rules.workdir.host.join(id).join(DATA_PATH_SEGMENT),
            db_name: DB_NAME.to_owned(),
            db_user: id.to_owned(),
            db_password: derive_password(id),
            fqdn: format!("{name}.{}", rules.domain),
        }
    }

    /// JDBC-style connection string of the store database.
    pub fn db_url(&self) -> String {
        format!(
            "jdbc:postgresql://{}:5432/{}",
            self.db_container, self.db_name
        )
    }
}

/// Per-store database password. Same id, same password, so a retried
/// pipeline configures containers identically.
pub fn derive_password(id: &str) -> String {
    let hex = blake3::hash(format!("storefleet-db-credential:{id}").as_bytes())
        .to_hex()
        .to_string();
    hex[..32].to_owned()
}
