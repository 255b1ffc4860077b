use super::{json_pretty, provider_error, EXIT_SUCCESS};
use storefleet_core::StoreManager;
use storefleet_schema::FleetConfig;

pub fn run(config: FleetConfig, id: &str, json: bool) -> Result<u8, String> {
    let manager = StoreManager::new(config);
    let log = manager.destroy_store(id).map_err(|e| provider_error(&e))?;
    if json {
        println!("{}", json_pretty(&log)?);
    } else if log.is_empty() {
        println!("destroy of '{id}' is a no-op for this provider");
    } else {
        print!("{log}");
        println!("destroyed '{id}'");
    }
    Ok(EXIT_SUCCESS)
}
