pub mod create;
pub mod destroy;
pub mod doctor;
pub mod list;
pub mod neighbours;
pub mod serve;

use std::path::Path;
use std::sync::Arc;
use storefleet_core::ProviderError;
use storefleet_schema::FleetConfig;
use storefleet_topology::{TopologyError, TopologyService};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_PROVISION_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn load(path: &Path) -> Result<FleetConfig, String> {
    storefleet_schema::load_config(path)
        .map_err(|e| format!("config error: {}: {e}", path.display()))
}

/// Prefix provider errors so `main` can pick the exit code.
pub fn provider_error(e: &ProviderError) -> String {
    match e {
        ProviderError::NotFound(_) | ProviderError::Config(_) => format!("config error: {e}"),
        _ => format!("provisioning error: {e}"),
    }
}

pub fn topology_error(e: &TopologyError) -> String {
    format!("topology error: {e}")
}

pub fn require_topology(config: &FleetConfig) -> Result<(), String> {
    if config.topology.enabled {
        Ok(())
    } else {
        Err("config error: topology is disabled ([topology] enabled = false)".to_owned())
    }
}

/// Discovery-only topology service for one-shot commands. It never
/// registers, so it cannot evict a `serve` process sharing the same config.
pub fn observer_topology(config: &FleetConfig) -> Result<Arc<TopologyService>, String> {
    require_topology(config)?;
    Ok(Arc::new(
        TopologyService::consul(config.topology.clone()).read_only(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn provider_errors_are_classified() {
        let nf = provider_error(&ProviderError::NotFound("k8s".to_owned()));
        assert!(nf.starts_with("config error:"));
        let pre = provider_error(&ProviderError::Precondition("no network".to_owned()));
        assert!(pre.starts_with("provisioning error:"));
    }

    #[test]
    fn disabled_topology_is_config_error() {
        let cfg = storefleet_schema::parse_config_str("[provider]\nname = \"docker\"\n").unwrap();
        let err = observer_topology(&cfg).err().unwrap();
        assert!(err.starts_with("config error:"));
    }

    #[test]
    fn one_shot_topology_is_read_only() {
        let cfg = storefleet_schema::parse_config_str(
            "[provider]\nname = \"docker\"\n\n[topology]\nenabled = true\n",
        )
        .unwrap();
        assert!(observer_topology(&cfg).unwrap().is_read_only());
    }
}
