//! Topology service for storefleet processes.
//!
//! A process registers itself in a service registry (a Consul agent), keeps
//! the registration alive with a TTL heartbeat, re-registers when the registry
//! has evicted it, and discovers neighbouring stores sharing its naming
//! prefix. All registry access goes through the [`RegistryClient`] trait so
//! the service can run against Consul over HTTP or against an in-memory
//! registry in tests.

pub mod client;
pub mod consul;
pub mod heartbeat;
pub mod memory;
pub mod neighbour;
pub mod registration;
pub mod service;
pub mod state;

pub use client::RegistryClient;
pub use consul::ConsulClient;
pub use heartbeat::HeartbeatHandle;
pub use memory::InMemoryRegistry;
pub use neighbour::Neighbour;
pub use registration::{RegistrationCheck, ServiceRegistration};
pub use service::TopologyService;
pub use state::RegistrationState;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry does not know the service or its TTL check.
    #[error("service '{0}' is not registered")]
    NotRegistered(String),
    #[error("registry transport error: {0}")]
    Transport(String),
    #[error("registry returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected registry payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("invalid registration transition: {from} -> {to}")]
    InvalidTransition {
        from: RegistrationState,
        to: RegistrationState,
    },
    #[error("topology is disabled")]
    Disabled,
    #[error("topology state lock poisoned")]
    Poisoned,
    #[error("topology I/O error: {0}")]
    Io(#[from] std::io::Error),
}
