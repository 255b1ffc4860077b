use super::{json_pretty, observer_topology, topology_error, EXIT_SUCCESS};
use storefleet_schema::FleetConfig;

pub fn run(config: &FleetConfig, json: bool) -> Result<u8, String> {
    let topology = observer_topology(config)?;
    let mut neighbours = topology.list().map_err(|e| topology_error(&e))?;
    neighbours.sort_by(|a, b| a.service_name.cmp(&b.service_name).then(a.id.cmp(&b.id)));

    if json {
        println!("{}", json_pretty(&neighbours)?);
    } else if neighbours.is_empty() {
        println!("no neighbours registered");
    } else {
        println!("{:<32} {:<32} LOCATION", "SERVICE", "ID");
        for n in &neighbours {
            println!("{:<32} {:<32} {}", n.service_name, n.id, n.location());
        }
    }
    Ok(EXIT_SUCCESS)
}
