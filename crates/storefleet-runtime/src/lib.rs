//! Container runtime access for storefleet provisioning.
//!
//! This crate implements the resource layer: the read-only `ResourceProbe`
//! that looks up networks, volumes, and containers by name, the mutating
//! `ContainerRuntime` backends (docker CLI and an in-memory mock), the
//! desired-state value types (`VolumeSpec`, `ContainerSpec`), the
//! verify-or-create reconciliation step, and prerequisite checking.

pub mod backend;
pub mod docker;
pub mod mock;
pub mod prereq;
pub mod probe;
pub mod reconcile;
pub mod spec;

pub use backend::{select_runtime, ContainerRuntime};
pub use prereq::{check_docker_prereqs, check_ssh_prereqs, format_missing, MissingPrereq};
pub use probe::{ContainerDetails, ContainerSummary, NetworkInfo, ResourceProbe, VolumeInfo};
pub use reconcile::{
    ensure_volume, verify_existing, verify_or_create, Drift, DriftField, ReconciliationOutcome,
};
pub use spec::{ContainerSpec, VolumeBind, VolumeSpec};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runtime '{0}' is not available on this system")]
    Unavailable(String),
    #[error("runtime command `{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("unexpected runtime output: {0}")]
    Parse(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("resource name already in use: {0}")]
    Conflict(String),
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}
