use super::{json_pretty, provider_error, EXIT_SUCCESS};
use storefleet_core::StoreManager;
use storefleet_schema::FleetConfig;

pub fn run(config: FleetConfig, json: bool) -> Result<u8, String> {
    let manager = StoreManager::new(config);
    let instances = manager.list_stores().map_err(|e| provider_error(&e))?;
    if json {
        println!("{}", json_pretty(&instances)?);
    } else if instances.is_empty() {
        println!("no store instances found");
    } else {
        println!("{:<40} IMAGE", "NAME");
        for instance in &instances {
            println!(
                "{:<40} {}",
                instance.name,
                instance.image.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
