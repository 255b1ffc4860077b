//! Store provisioning for storefleet.
//!
//! This crate ties the runtime, remote and topology layers together: the
//! `StoreProvider` contract and its static registry, the docker pipeline
//! (nine ordered steps against a container runtime), the dokku pipeline (an
//! ordered batch of remote commands), the store-container task used by the
//! task framework, store status transitions, and the `StoreManager` that turns
//! a request into a `StoreDescriptor`.

pub mod concurrency;
pub mod docker;
pub mod dokku;
pub mod lifecycle;
pub mod manager;
pub mod provider;
pub mod task;

pub use concurrency::{install_signal_handler, shutdown_requested, wait_for_shutdown};
pub use docker::DockerProvider;
pub use dokku::{run_batch, DokkuProvider};
pub use lifecycle::validate_transition;
pub use manager::StoreManager;
pub use provider::{
    InstanceSummary, ProviderFactory, ProviderRegistry, ProvisioningReport, StoreProvider,
    StoreRequest,
};
pub use task::{CreateStoreContainerTask, Task, TaskContext};

use storefleet_runtime::RuntimeError;
use storefleet_schema::{ConfigError, StoreStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unable to find a provider for name: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// A resource exists but differs from what the pipeline expects, or could
    /// not be created.
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),
    #[error("remote command `{command}` exited with status {status}: {output}")]
    RemoteCommand {
        command: String,
        status: i32,
        output: String,
    },
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("remote error: {0}")]
    Remote(#[from] storefleet_remote::RemoteError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: StoreStatus, to: StoreStatus },
}

impl From<ConfigError> for ProviderError {
    fn from(e: ConfigError) -> Self {
        ProviderError::Config(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("missing mandatory context value: {0}")]
    MissingContextValue(String),
    #[error("invalid value '{value}' for context key {key}")]
    InvalidContextValue { key: String, value: String },
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    /// Reconciliation failure, drift included.
    #[error("{0}")]
    Failed(String),
}
