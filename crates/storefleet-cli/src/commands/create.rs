use super::{
    json_pretty, observer_topology, EXIT_CONFIG_ERROR, EXIT_PROVISION_ERROR, EXIT_SUCCESS,
};
use storefleet_core::StoreManager;
use storefleet_schema::{FleetConfig, StoreDescriptor, StoreId, StoreStatus};

pub fn run(
    config: FleetConfig,
    owner: &str,
    name: &str,
    id: Option<String>,
    json: bool,
) -> Result<u8, String> {
    let topology = if config.topology.enabled {
        Some(observer_topology(&config)?)
    } else {
        None
    };

    let mut manager = StoreManager::new(config);
    if let Some(t) = &topology {
        manager = manager.with_topology(t.clone());
    }
    let result = manager.create_store(owner, name, id.map(StoreId::from));

    let store = result.map_err(|e| format!("provisioning error: {e}"))?;
    print_store(&store, json)?;
    Ok(match store.status {
        StoreStatus::Available => EXIT_SUCCESS,
        StoreStatus::Pending => EXIT_PROVISION_ERROR,
        StoreStatus::Failed => EXIT_CONFIG_ERROR,
    })
}

fn print_store(store: &StoreDescriptor, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(store)?);
        return Ok(());
    }
    println!("id:       {}", store.id);
    println!("owner:    {}", store.owner);
    println!("name:     {}", store.name);
    println!("status:   {}", store.status);
    println!("location: {}", store.location);
    if !store.log.is_empty() {
        println!();
        print!("{}", store.log);
        if !store.log.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
