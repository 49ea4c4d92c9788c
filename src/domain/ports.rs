//! Domain ports - core trait definition for backend adapters
//!
//! The `BackendAdapter` trait is the boundary between the uniform daemon
//! core and a vendor backend. Transport adapters (vendor CLI tools, SMI-S
//! providers) implement it and normalize their native data into the uniform
//! entities in [`crate::domain::model`].

use crate::domain::capability::CapabilitySet;
use crate::domain::model::{StoragePool, StorageVolume, SystemReport};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// Backend Adapter Port
// =============================================================================

/// Port implemented by every backend transport adapter
///
/// One adapter instance is bound to one live connection (a resolved local
/// executable, or an authenticated provider session). Listing operations are
/// idempotent and must not mutate adapter or backend state. All entities
/// returned reference systems/pools discovered through the same instance.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Startup handshake. Called exactly once by the registry before the
    /// session becomes ready; a failure here leaves the session uncached.
    async fn startup(&self) -> Result<()>;

    /// Release backend resources. Called on session teardown; best effort.
    async fn shutdown(&self);

    /// Discover systems, with any operator-visible conditions attached
    async fn list_systems(&self) -> Result<SystemReport>;

    /// List pools across all visible systems
    async fn list_pools(&self) -> Result<Vec<StoragePool>>;

    /// List volumes across all visible systems
    async fn list_volumes(&self) -> Result<Vec<StorageVolume>>;

    /// Compute the supported operation set for one system.
    ///
    /// Support may differ across systems under the same adapter (hardware
    /// generation differences); the session layer caches the result per
    /// system, so adapters recompute on every call.
    async fn capabilities(&self, system_id: &str) -> Result<CapabilitySet>;

    /// Create a volume in a pool
    async fn volume_create(
        &self,
        pool_id: &str,
        name: &str,
        size_bytes: u64,
    ) -> Result<StorageVolume>;

    /// Resize an existing volume
    async fn volume_resize(&self, volume_id: &str, new_size_bytes: u64) -> Result<StorageVolume>;

    /// Delete a volume
    async fn volume_delete(&self, volume_id: &str) -> Result<()>;

    /// Short backend name used in logs and error payloads
    fn backend_name(&self) -> &str;
}

pub type BackendAdapterRef = Arc<dyn BackendAdapter>;
