use crate::registration::{fqdn_from_tags, ServiceRegistration};
use crate::RegistryError;
use serde::{Deserialize, Serialize};

/// A peer instance discovered in the registry. Recomputed on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbour {
    pub id: String,
    pub service_name: String,
    pub address: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
}

impl Neighbour {
    pub fn from_registration(reg: &ServiceRegistration) -> Self {
        Self {
            id: reg.id.clone(),
            service_name: reg.name.clone(),
            address: reg.address.clone(),
            port: reg.port,
            fqdn: reg.fqdn().map(str::to_owned),
        }
    }

    /// Where clients should reach this neighbour.
    pub fn location(&self) -> String {
        match &self.fqdn {
            Some(fqdn) => fqdn.clone(),
            None => format!("{}:{}", self.address, self.port),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: HealthNode,
    service: HealthService,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthNode {
    #[serde(default)]
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthService {
    #[serde(rename = "ID")]
    id: String,
    service: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    address: String,
    port: u16,
}

/// Parse a `/v1/health/service/<name>` response body.
///
/// An empty service address falls back to the node address, as Consul does.
pub fn parse_health_entries(body: &str) -> Result<Vec<Neighbour>, RegistryError> {
    let entries: Vec<HealthEntry> =
        serde_json::from_str(body).map_err(|e| RegistryError::Decode(e.to_string()))?;
    Ok(entries
        .into_iter()
        .map(|e| {
            let tags = e.service.tags.unwrap_or_default();
            let address = if e.service.address.is_empty() {
                e.node.address
            } else {
                e.service.address
            };
            Neighbour {
                id: e.service.id,
                service_name: e.service.service,
                address,
                port: e.service.port,
                fqdn: fqdn_from_tags(&tags).map(str::to_owned),
            }
        })
        .collect())
}
