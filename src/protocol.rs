//! Daemon-adapter request/response contract
//!
//! Every operation the daemon issues against an adapter session is one of
//! these typed requests, and every result is one of the typed responses.
//! Mutating requests carry the target system id so the capability gate can
//! run locally, before anything reaches the backend.

use crate::domain::capability::{Capability, CapabilitySet};
use crate::domain::model::{StoragePool, StorageVolume, SystemReport};
use serde::{Deserialize, Serialize};

// =============================================================================
// Requests
// =============================================================================

/// A single operation dispatched to an adapter session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdapterRequest {
    ListSystems,
    ListPools,
    ListVolumes,
    QueryCapabilities {
        system_id: String,
    },
    VolumeCreate {
        system_id: String,
        pool_id: String,
        name: String,
        size_bytes: u64,
    },
    VolumeResize {
        system_id: String,
        volume_id: String,
        new_size_bytes: u64,
    },
    VolumeDelete {
        system_id: String,
        volume_id: String,
    },
}

impl AdapterRequest {
    /// The capability this request exercises
    pub fn capability(&self) -> Capability {
        match self {
            AdapterRequest::ListSystems => Capability::SystemList,
            AdapterRequest::ListPools => Capability::PoolList,
            AdapterRequest::ListVolumes => Capability::VolumeList,
            AdapterRequest::QueryCapabilities { .. } => Capability::CapabilityQuery,
            AdapterRequest::VolumeCreate { .. } => Capability::VolumeCreate,
            AdapterRequest::VolumeResize { .. } => Capability::VolumeResize,
            AdapterRequest::VolumeDelete { .. } => Capability::VolumeDelete,
        }
    }

    /// Target system of a mutating request, if any
    pub fn target_system(&self) -> Option<&str> {
        match self {
            AdapterRequest::VolumeCreate { system_id, .. }
            | AdapterRequest::VolumeResize { system_id, .. }
            | AdapterRequest::VolumeDelete { system_id, .. }
            | AdapterRequest::QueryCapabilities { system_id } => Some(system_id),
            _ => None,
        }
    }

    /// Short operation name for logs and timeout errors
    pub fn name(&self) -> &'static str {
        match self {
            AdapterRequest::ListSystems => "list-systems",
            AdapterRequest::ListPools => "list-pools",
            AdapterRequest::ListVolumes => "list-volumes",
            AdapterRequest::QueryCapabilities { .. } => "query-capabilities",
            AdapterRequest::VolumeCreate { .. } => "volume-create",
            AdapterRequest::VolumeResize { .. } => "volume-resize",
            AdapterRequest::VolumeDelete { .. } => "volume-delete",
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Result of a successfully executed adapter request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum AdapterResponse {
    Systems(SystemReport),
    Pools(Vec<StoragePool>),
    Volumes(Vec<StorageVolume>),
    Capabilities(CapabilitySet),
    VolumeCreated(StorageVolume),
    VolumeResized(StorageVolume),
    VolumeDeleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_capability_mapping() {
        assert_eq!(
            AdapterRequest::ListPools.capability(),
            Capability::PoolList
        );
        let create = AdapterRequest::VolumeCreate {
            system_id: "S1".into(),
            pool_id: "P1".into(),
            name: "vol".into(),
            size_bytes: 1024,
        };
        assert_eq!(create.capability(), Capability::VolumeCreate);
        assert!(create.capability().is_mutating());
        assert_eq!(create.target_system(), Some("S1"));
    }

    #[test]
    fn test_response_round_trips_as_json() {
        use crate::domain::model::{HealthStatus, StoragePool};

        let pool = StoragePool::new("P1", "S1", 1000, 400, HealthStatus::Ok).unwrap();
        let response = AdapterResponse::Pools(vec![pool]);
        let json = serde_json::to_string(&response).unwrap();
        let back: AdapterResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_request_round_trips_as_json() {
        let req = AdapterRequest::VolumeResize {
            system_id: "S1".into(),
            volume_id: "V1".into(),
            new_size_bytes: 2048,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("volume_resize"));
        let back: AdapterRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
