use super::{EXIT_FAILURE, EXIT_SUCCESS};
use std::path::Path;
use storefleet_core::ProviderRegistry;
use storefleet_remote::SshIdentity;
use storefleet_schema::FleetConfig;
use storefleet_topology::{ConsulClient, RegistryClient};

pub fn run(config_path: &Path, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    match storefleet_schema::load_config(config_path) {
        Ok(config) => {
            checks.push(Check::pass(
                "config",
                &format!("Configuration {} is valid", config_path.display()),
            ));
            check_provider(&config, &mut checks, &mut all_pass);
            check_topology(&config, &mut checks);
        }
        Err(e) => {
            all_pass = false;
            checks.push(Check::fail(
                "config",
                &format!("Configuration {}: {e}", config_path.display()),
            ));
        }
    }

    print_results(&checks, all_pass, json_output)
}

fn check_provider(config: &FleetConfig, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let name = config.provider.name.as_str();
    let registry = ProviderRegistry::builtin();
    if !registry.contains(name) {
        *all_pass = false;
        checks.push(Check::fail(
            "provider",
            &format!(
                "Unknown provider '{name}' (available: {})",
                registry.names().join(", ")
            ),
        ));
        return;
    }
    checks.push(Check::pass("provider", &format!("Provider '{name}' is known")));

    let section = match name {
        "docker" => config.docker().map(|_| ()),
        _ => config.dokku().map(|_| ()),
    };
    if let Err(e) = section {
        *all_pass = false;
        checks.push(Check::fail("provider_section", &e.to_string()));
        return;
    }

    if let Ok(dokku) = config.dokku() {
        match SshIdentity::load(&dokku.identity, &dokku.known_hosts) {
            Ok(identity) => checks.push(Check::pass(
                "ssh_identity",
                &format!(
                    "SSH identity loaded ({} trusted host keys)",
                    identity.trusted_hosts
                ),
            )),
            Err(e) => {
                *all_pass = false;
                checks.push(Check::fail("ssh_identity", &e.to_string()));
            }
        }
    }

    if std::env::var("STOREFLEET_SKIP_PREREQS").as_deref() == Ok("1") {
        checks.push(Check::info("prereqs", "Prerequisite checks skipped"));
        return;
    }
    let missing = if name == "docker" {
        storefleet_runtime::check_docker_prereqs()
    } else {
        storefleet_runtime::check_ssh_prereqs()
    };
    if missing.is_empty() {
        checks.push(Check::pass("prereqs", "Backend prerequisites satisfied"));
    } else {
        *all_pass = false;
        checks.push(Check::fail(
            "prereqs",
            &format!(
                "Missing prerequisites:\n{}",
                storefleet_runtime::format_missing(&missing)
            ),
        ));
    }
}

/// Registry problems are warnings: provisioning works without topology.
fn check_topology(config: &FleetConfig, checks: &mut Vec<Check>) {
    if !config.topology.enabled {
        checks.push(Check::info("topology", "Topology disabled"));
        return;
    }
    let url = config.topology.registry_url();
    match ConsulClient::new(&url).services() {
        Ok(services) => checks.push(Check::pass(
            "topology",
            &format!("Registry {url} reachable ({} services)", services.len()),
        )),
        Err(e) => checks.push(Check::warn(
            "topology",
            &format!("Registry {url} not reachable: {e}"),
        )),
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("storefleet doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
