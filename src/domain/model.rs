//! Uniform storage entities
//!
//! Value types that every backend adapter normalizes its native data into:
//! systems, pools, volumes and their status enums. Construction validates
//! the invariants (non-empty identifiers, free <= total); everything else
//! is plain data.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// =============================================================================
// Status
// =============================================================================

/// Health status reported for a system or pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "ok"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Error => write!(f, "error"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl HealthStatus {
    /// Normalize a backend status token. Vendor tools disagree on spelling,
    /// so matching is case-insensitive and unknown tokens map to `Unknown`
    /// rather than failing the whole parse.
    pub fn from_backend_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "ok" | "online" | "optimal" | "good" => HealthStatus::Ok,
            "degraded" | "partially degraded" | "rebuilding" => HealthStatus::Degraded,
            "error" | "failed" | "offline" | "critical" => HealthStatus::Error,
            _ => HealthStatus::Unknown,
        }
    }
}

// =============================================================================
// System
// =============================================================================

/// A storage system discovered behind one adapter session
///
/// Identifiers are unique within the backend connection that reported them.
/// A `System` is owned by the adapter session that discovered it and is not
/// meaningful beyond that session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSystem {
    /// Backend identifier, unique within the connection
    pub id: String,
    /// Human-readable display name
    pub name: String,
    /// Health status
    pub status: HealthStatus,
}

impl StorageSystem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: HealthStatus) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::missing_field("system id", "<empty>"));
        }
        Ok(Self {
            id,
            name: name.into(),
            status,
        })
    }
}

// =============================================================================
// Pool
// =============================================================================

/// A capacity pool belonging to a system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePool {
    /// Backend identifier, unique within the connection
    pub id: String,
    /// Identifier of the owning system (non-owning reference)
    pub system_id: String,
    /// Total capacity in bytes
    pub total_bytes: u64,
    /// Free capacity in bytes, always <= total
    pub free_bytes: u64,
    /// Health status
    pub status: HealthStatus,
}

impl StoragePool {
    pub fn new(
        id: impl Into<String>,
        system_id: impl Into<String>,
        total_bytes: u64,
        free_bytes: u64,
        status: HealthStatus,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::missing_field("pool id", "<empty>"));
        }
        if free_bytes > total_bytes {
            return Err(Error::Parse {
                field: "free_capacity".into(),
                snippet: format!("free {} exceeds total {} on pool {}", free_bytes, total_bytes, id),
            });
        }
        Ok(Self {
            id,
            system_id: system_id.into(),
            total_bytes,
            free_bytes,
            status,
        })
    }

    /// Bytes currently allocated out of the pool
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes - self.free_bytes
    }
}

// =============================================================================
// Volume
// =============================================================================

/// A provisioned volume belonging to a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVolume {
    /// Backend identifier, unique within the connection.
    ///
    /// NOT a durable key while `id_transient` is set: until the backend
    /// exposes a hardware page-83 identifier, this id may change across
    /// adapter versions. Callers must not persist it.
    pub id: String,
    /// Identifier of the owning pool (non-owning reference)
    pub pool_id: String,
    /// Identifier of the owning system (non-owning reference)
    pub system_id: String,
    /// Volume size in bytes
    pub size_bytes: u64,
    /// Set while the identifier is not backed by a hardware page-83 id
    pub id_transient: bool,
}

impl StorageVolume {
    pub fn new(
        id: impl Into<String>,
        pool_id: impl Into<String>,
        system_id: impl Into<String>,
        size_bytes: u64,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::missing_field("volume id", "<empty>"));
        }
        Ok(Self {
            id,
            pool_id: pool_id.into(),
            system_id: system_id.into(),
            size_bytes,
            // No backend in the current adapter set reports page-83 ids yet.
            id_transient: true,
        })
    }
}

// =============================================================================
// Discovery Report
// =============================================================================

/// A named, operator-visible condition attached to a discovery result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum DiscoveryCondition {
    /// More than one vendor tool family is installed; the listed one was
    /// selected by precedence and reported no systems, so the operator may
    /// be pointing the daemon at the wrong family.
    AmbiguousToolInstall {
        selected: String,
        also_installed: Vec<String>,
    },
}

impl std::fmt::Display for DiscoveryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryCondition::AmbiguousToolInstall {
                selected,
                also_installed,
            } => write!(
                f,
                "tool family '{}' selected by precedence reported no systems, \
                 but {} is also installed",
                selected,
                also_installed.join(", ")
            ),
        }
    }
}

/// Result of a system discovery pass
///
/// Carries the systems found plus any named conditions. An empty system list
/// caused by a plausible misconfiguration must arrive with a condition
/// attached, never as a silent empty result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemReport {
    pub systems: Vec<StorageSystem>,
    pub conditions: Vec<DiscoveryCondition>,
}

impl SystemReport {
    pub fn of(systems: Vec<StorageSystem>) -> Self {
        Self {
            systems,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: DiscoveryCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_capacity_invariant() {
        let pool = StoragePool::new("P1", "S1", 1000, 400, HealthStatus::Ok).unwrap();
        assert_eq!(pool.used_bytes(), 600);

        let bad = StoragePool::new("P1", "S1", 400, 1000, HealthStatus::Ok);
        assert!(bad.is_err());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert!(StorageSystem::new("", "sys", HealthStatus::Ok).is_err());
        assert!(StoragePool::new("", "S1", 10, 0, HealthStatus::Ok).is_err());
        assert!(StorageVolume::new("", "P1", "S1", 10).is_err());
    }

    #[test]
    fn test_volume_id_marked_transient() {
        let vol = StorageVolume::new("V1", "P1", "S1", 1 << 30).unwrap();
        assert!(vol.id_transient);
    }

    #[test]
    fn test_status_token_normalization() {
        assert_eq!(HealthStatus::from_backend_token("Optimal"), HealthStatus::Ok);
        assert_eq!(HealthStatus::from_backend_token("ONLINE"), HealthStatus::Ok);
        assert_eq!(
            HealthStatus::from_backend_token("Rebuilding"),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from_backend_token("mystery"),
            HealthStatus::Unknown
        );
    }

    #[test]
    fn test_ambiguous_install_condition_display() {
        let report = SystemReport::of(vec![]).with_condition(
            DiscoveryCondition::AmbiguousToolInstall {
                selected: "smartarray".into(),
                also_installed: vec!["megaraid".into()],
            },
        );
        let text = report.conditions[0].to_string();
        assert!(text.contains("smartarray"));
        assert!(text.contains("megaraid"));
    }
}
