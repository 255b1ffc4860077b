use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// A named volume bound to a directory on the runtime host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub host_path: PathBuf,
}

/// Volume mounted into a container at `mount_path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeBind {
    pub volume: String,
    pub mount_path: String,
}

impl VolumeBind {
    pub fn new(volume: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            mount_path: mount_path.into(),
        }
    }

    /// Parse a runtime bind string: `source:target[:options]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, ':');
        let volume = parts.next().filter(|s| !s.is_empty())?;
        let mount_path = parts.next().filter(|s| !s.is_empty())?;
        Some(Self::new(volume, mount_path))
    }
}

impl fmt::Display for VolumeBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.volume, self.mount_path)
    }
}

/// Desired state of a container. Environment entries are `KEY=VALUE` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub hostname: String,
    pub env: BTreeSet<String>,
    pub labels: BTreeMap<String, String>,
    /// `None` leaves the runtime default in place and is not verified.
    pub network_mode: Option<String>,
    pub bind: VolumeBind,
}

impl ContainerSpec {
    /// A spec whose hostname equals its name, as used for every store container.
    pub fn new(name: &str, image: &str, bind: VolumeBind) -> Self {
        Self {
            name: name.to_owned(),
            image: image.to_owned(),
            hostname: name.to_owned(),
            env: BTreeSet::new(),
            labels: BTreeMap::new(),
            network_mode: None,
            bind,
        }
    }

    #[must_use]
    pub fn with_env(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.env.insert(format!("{key}={value}"));
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_network_mode(mut self, mode: &str) -> Self {
        self.network_mode = Some(mode.to_owned());
        self
    }
}
