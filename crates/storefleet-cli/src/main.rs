mod commands;

use clap::{Parser, Subcommand};
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_PROVISION_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "storefleet",
    version,
    about = "Provision per-tenant stores and publish them in the service registry"
)]
struct Cli {
    /// Path to the storefleet configuration file.
    #[arg(long, default_value = "storefleet.toml", global = true)]
    config: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List store instances known to the configured provider.
    List,
    /// Provision a new store.
    Create {
        /// Owner of the store.
        #[arg(long)]
        owner: String,
        /// Display name, used for the public hostname.
        #[arg(long)]
        name: String,
        /// Store id. A UUID is generated when omitted.
        #[arg(long)]
        id: Option<String>,
    },
    /// Tear down a store.
    Destroy {
        /// Store id (docker) or app name (dokku).
        id: String,
    },
    /// List neighbour instances registered under the configured prefix.
    Neighbours,
    /// Register in the service registry and heartbeat until Ctrl-C.
    Serve,
    /// Check configuration and backend prerequisites.
    Doctor,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STOREFLEET_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let path = cli.config.as_path();
    let result = match cli.command {
        Commands::Doctor => commands::doctor::run(path, json),
        Commands::List => commands::load(path).and_then(|c| commands::list::run(c, json)),
        Commands::Create { owner, name, id } => commands::load(path)
            .and_then(|c| commands::create::run(c, &owner, &name, id, json)),
        Commands::Destroy { id } => {
            commands::load(path).and_then(|c| commands::destroy::run(c, &id, json))
        }
        Commands::Neighbours => {
            commands::load(path).and_then(|c| commands::neighbours::run(&c, json))
        }
        Commands::Serve => commands::load(path).and_then(|c| commands::serve::run(&c, json)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("provisioning error:") {
                EXIT_PROVISION_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
