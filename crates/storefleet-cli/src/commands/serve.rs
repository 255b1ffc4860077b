use super::{json_pretty, require_topology, topology_error, EXIT_SUCCESS};
use std::sync::Arc;
use std::time::Duration;
use storefleet_core::{install_signal_handler, wait_for_shutdown};
use storefleet_schema::FleetConfig;
use storefleet_topology::{HeartbeatHandle, TopologyService};
use tracing::{info, warn};

const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

pub fn run(config: &FleetConfig, json: bool) -> Result<u8, String> {
    require_topology(config)?;
    install_signal_handler();

    let service = Arc::new(TopologyService::consul(config.topology.clone()));
    let state = service.activate().map_err(|e| topology_error(&e))?;
    if !service.is_registered() {
        warn!("initial registration failed, the heartbeat will keep retrying");
    }
    if json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({
                "instance_id": service.instance_id(),
                "service": service.service_name(),
                "state": state.to_string(),
            }))?
        );
    } else {
        println!(
            "serving as {} ({state}), Ctrl-C to stop",
            service.instance_id()
        );
    }

    let heartbeat = HeartbeatHandle::spawn(Arc::clone(&service), service.heartbeat_period())
        .map_err(|e| topology_error(&e))?;
    wait_for_shutdown(SHUTDOWN_POLL);

    heartbeat.stop();
    service.shutdown().map_err(|e| topology_error(&e))?;
    info!("{} deregistered", service.instance_id());
    Ok(EXIT_SUCCESS)
}
