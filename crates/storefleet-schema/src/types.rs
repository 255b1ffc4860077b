//! Store identifiers and the descriptor record created for every provisioning request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Location placeholder for a store that is not (yet) visible in the topology.
pub const LOCATION_UNKNOWN: &str = "#";

/// Opaque store identifier. Generated once per store and used as the seed of
/// every derived resource name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Fresh random identifier (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for StoreId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoreId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for StoreId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreStatus {
    Pending,
    Available,
    Failed,
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreStatus::Pending => "PENDING",
            StoreStatus::Available => "AVAILABLE",
            StoreStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    pub id: StoreId,
    pub owner: String,
    pub name: String,
    pub status: StoreStatus,
    pub location: String,
    /// Rendered provisioning trail, one `[Step k/N]` line per entry.
    pub log: String,
    /// Serialized as RFC 3339.
    pub created_at: DateTime<Utc>,
}

impl StoreDescriptor {
    /// A new PENDING descriptor with a freshly generated id.
    pub fn pending(owner: &str, name: &str) -> Self {
        Self::pending_with_id(StoreId::generate(), owner, name)
    }

    pub fn pending_with_id(id: StoreId, owner: &str, name: &str) -> Self {
        Self {
            id,
            owner: owner.to_owned(),
            name: name.to_owned(),
            status: StoreStatus::Pending,
            location: LOCATION_UNKNOWN.to_owned(),
            log: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_location(&self) -> bool {
        self.location != LOCATION_UNKNOWN
    }
}
