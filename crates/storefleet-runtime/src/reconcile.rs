//! Verify-or-create reconciliation of single resources.
//!
//! An existing resource is only ever compared against the desired spec, never
//! modified: drift is reported and left for an operator to resolve.

use crate::backend::ContainerRuntime;
use crate::probe::{ContainerDetails, ResourceProbe};
use crate::spec::{ContainerSpec, VolumeSpec};
use crate::RuntimeError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReconciliationOutcome {
    /// The resource did not exist and was created.
    Completed(String),
    /// A matching resource already existed.
    AlreadyExists(String),
    Failed(String),
}

impl ReconciliationOutcome {
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Self::Completed(id) | Self::AlreadyExists(id) => Some(id),
            Self::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriftField {
    Image,
    Hostname,
    Env,
    Labels,
    NetworkMode,
    VolumeBind,
}

impl fmt::Display for DriftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftField::Image => "image",
            DriftField::Hostname => "hostname",
            DriftField::Env => "environment",
            DriftField::Labels => "labels",
            DriftField::NetworkMode => "network mode",
            DriftField::VolumeBind => "volume bind",
        };
        f.write_str(s)
    }
}

/// First observed difference between an existing container and its spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub field: DriftField,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "existing container {} '{}' does not match expected '{}'",
            self.field, self.actual, self.expected
        )
    }
}

/// Compare `existing` against `spec` in a fixed order and return the first
/// mismatch. Environment and labels only need to be supersets of the spec.
pub fn verify_existing(spec: &ContainerSpec, existing: &ContainerDetails) -> Result<(), Drift> {
    if existing.image != spec.image {
        return Err(Drift {
            field: DriftField::Image,
            expected: spec.image.clone(),
            actual: existing.image.clone(),
        });
    }
    if existing.hostname != spec.hostname {
        return Err(Drift {
            field: DriftField::Hostname,
            expected: spec.hostname.clone(),
            actual: existing.hostname.clone(),
        });
    }
    let missing_env: Vec<&str> = spec
        .env
        .iter()
        .filter(|e| !existing.env.contains(*e))
        .map(String::as_str)
        .collect();
    if !missing_env.is_empty() {
        return Err(Drift {
            field: DriftField::Env,
            expected: missing_env.join(","),
            actual: existing.env.join(","),
        });
    }
    let missing_labels: BTreeMap<&str, &str> = spec
        .labels
        .iter()
        .filter(|(k, v)| existing.labels.get(*k) != Some(*v))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if !missing_labels.is_empty() {
        return Err(Drift {
            field: DriftField::Labels,
            expected: render_labels(missing_labels),
            actual: render_labels(
                existing
                    .labels
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect(),
            ),
        });
    }
    if let Some(mode) = &spec.network_mode {
        if existing.network_mode != *mode {
            return Err(Drift {
                field: DriftField::NetworkMode,
                expected: mode.clone(),
                actual: existing.network_mode.clone(),
            });
        }
    }
    if !existing.parsed_binds().contains(&spec.bind) {
        return Err(Drift {
            field: DriftField::VolumeBind,
            expected: spec.bind.to_string(),
            actual: existing.binds.join(","),
        });
    }
    Ok(())
}

fn render_labels(labels: BTreeMap<&str, &str>) -> String {
    labels
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Ensure a container named `spec.name` exists and matches `spec`.
///
/// Lookup covers stopped containers. Probe failures are returned as errors;
/// creation failures and drift are `Failed` outcomes.
pub fn verify_or_create(
    runtime: &dyn ContainerRuntime,
    spec: &ContainerSpec,
) -> Result<ReconciliationOutcome, RuntimeError> {
    let Some(summary) = runtime.find_container(&spec.name)? else {
        return Ok(match runtime.create_container(spec) {
            Ok(id) => {
                info!("container '{}' created: {id}", spec.name);
                ReconciliationOutcome::Completed(id)
            }
            Err(e) => {
                warn!("container '{}' creation failed: {e}", spec.name);
                ReconciliationOutcome::Failed(format!(
                    "failed to create container '{}': {e}",
                    spec.name
                ))
            }
        });
    };

    debug!("found existing container '{}' ({})", spec.name, summary.id);
    let existing = runtime.inspect_container(&summary.id)?;
    match verify_existing(spec, &existing) {
        Ok(()) => Ok(ReconciliationOutcome::AlreadyExists(summary.id)),
        Err(drift) => {
            warn!("container '{}' drifted: {drift}", spec.name);
            Ok(ReconciliationOutcome::Failed(drift.to_string()))
        }
    }
}

/// Reuse the volume named `spec.name` if present, otherwise create it.
pub fn ensure_volume(
    runtime: &dyn ContainerRuntime,
    spec: &VolumeSpec,
) -> Result<ReconciliationOutcome, RuntimeError> {
    if let Some(existing) = runtime.find_volume(&spec.name)? {
        debug!("found existing volume '{}'", existing.name);
        return Ok(ReconciliationOutcome::AlreadyExists(existing.name));
    }
    Ok(match runtime.create_volume(spec) {
        Ok(volume) => ReconciliationOutcome::Completed(volume.name),
        Err(e) => ReconciliationOutcome::Failed(format!(
            "failed to create volume '{}': {e}",
            spec.name
        )),
    })
}
