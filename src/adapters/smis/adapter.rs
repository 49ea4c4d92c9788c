//! SMI-S transport adapter
//!
//! Translates the uniform operation set into CIM-XML operations against a
//! remote provider: intrinsic enumeration of the block-services classes for
//! discovery, extrinsic calls on the storage configuration service for
//! volume lifecycle. Provider identifiers are normalized into the uniform
//! entities; volume DeviceIDs are carried as transient identifiers.

use crate::adapters::smis::transport::{SmisParams, SmisTransport};
use crate::adapters::smis::xml::{
    enumerate_instances_request, invoke_method_request, parse_enumerate_response,
    parse_method_response, CimInstance, MethodResponse,
};
use crate::domain::capability::{Capability, CapabilitySet};
use crate::domain::model::{
    HealthStatus, StoragePool, StorageSystem, StorageVolume, SystemReport,
};
use crate::domain::ports::BackendAdapter;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, info};

const CLASS_SYSTEM: &str = "CIM_ComputerSystem";
const CLASS_POOL: &str = "CIM_StoragePool";
const CLASS_VOLUME: &str = "CIM_StorageVolume";
const CLASS_CONFIG_SERVICE: &str = "CIM_StorageConfigurationService";

const METHOD_CREATE_OR_MODIFY: &str = "CreateOrModifyElementFromStoragePool";
const METHOD_RETURN_TO_POOL: &str = "ReturnToStoragePool";

// =============================================================================
// Adapter
// =============================================================================

/// Adapter speaking SMI-S over CIM-XML to a remote provider
pub struct SmisAdapter {
    transport: SmisTransport,
    only_system: Option<String>,
    backend: String,
}

impl SmisAdapter {
    pub fn new(params: &SmisParams) -> Result<Self> {
        let backend = "smis".to_string();
        let transport = SmisTransport::new(params, &backend)?;
        info!(
            backend = %backend,
            url = %params.url(),
            namespace = %params.effective_namespace(),
            scoped_system = params.only_system.as_deref().unwrap_or("<all>"),
            "configured SMI-S provider connection"
        );
        Ok(Self {
            transport,
            only_system: params.only_system.clone(),
            backend,
        })
    }

    async fn enumerate(&self, class_name: &str) -> Result<Vec<CimInstance>> {
        let request = enumerate_instances_request(
            self.transport.namespace(),
            class_name,
            self.transport.next_message_id(),
        );
        let body = self.transport.post("EnumerateInstances", request).await?;
        parse_enumerate_response(&body, &self.backend)
    }

    async fn invoke(&self, method: &str, params: &[(&str, String)]) -> Result<MethodResponse> {
        let request = invoke_method_request(
            self.transport.namespace(),
            CLASS_CONFIG_SERVICE,
            method,
            params,
            self.transport.next_message_id(),
        );
        let body = self.transport.post(method, request).await?;
        let response = parse_method_response(&body, &self.backend)?;
        if response.return_code != 0 {
            let message = response
                .out_params
                .get("ErrorDescription")
                .cloned()
                .unwrap_or_else(|| format!("{} returned code {}", method, response.return_code));
            return Err(Error::BackendCommand {
                backend: self.backend.clone(),
                code: response.return_code.to_string(),
                message,
            });
        }
        Ok(response)
    }

    /// Reject requests outside the configured system scope before any
    /// network traffic happens.
    fn check_scope(&self, system_id: &str) -> Result<()> {
        match &self.only_system {
            Some(scoped) if scoped != system_id => Err(Error::Configuration(format!(
                "connection is scoped to system '{}'; got '{}'",
                scoped, system_id
            ))),
            _ => Ok(()),
        }
    }

    fn in_scope(&self, system_id: &str) -> bool {
        self.only_system
            .as_deref()
            .map(|scoped| scoped == system_id)
            .unwrap_or(true)
    }

    async fn find_volume(&self, volume_id: &str) -> Result<StorageVolume> {
        self.list_volumes()
            .await?
            .into_iter()
            .find(|v| v.id == volume_id)
            .ok_or_else(|| Error::BackendCommand {
                backend: self.backend.clone(),
                code: "not-found".into(),
                message: format!("volume '{}' not visible after operation", volume_id),
            })
    }
}

// =============================================================================
// Projection
// =============================================================================

/// DMTF operational status values narrowed to the uniform enum; textual
/// tokens from non-conforming providers go through the shared normalizer.
fn project_status(instance: &CimInstance) -> HealthStatus {
    match instance.property("OperationalStatus") {
        Some("2") => HealthStatus::Ok,
        Some("3") => HealthStatus::Degraded,
        Some("6") => HealthStatus::Error,
        Some(token) if token.chars().all(|c| c.is_ascii_digit()) => HealthStatus::Unknown,
        Some(token) => HealthStatus::from_backend_token(token),
        None => HealthStatus::Unknown,
    }
}

fn project_system(instance: &CimInstance) -> Result<StorageSystem> {
    let id = instance.require_property("Name")?;
    let name = instance.property("ElementName").unwrap_or(id).to_string();
    StorageSystem::new(id, name, project_status(instance))
}

fn project_pool(instance: &CimInstance) -> Result<StoragePool> {
    let id = instance.require_property("InstanceID")?;
    let system_id = instance.require_property("SystemName")?;
    let total = instance.require_u64("TotalManagedSpace")?;
    let free = instance.require_u64("RemainingManagedSpace")?;
    StoragePool::new(id, system_id, total, free, project_status(instance))
}

fn project_volume(instance: &CimInstance) -> Result<StorageVolume> {
    let id = instance.require_property("DeviceID")?;
    let system_id = instance.require_property("SystemName")?;
    let pool_id = instance.require_property("PoolID")?;
    let block_size = instance.require_u64("BlockSize")?;
    let blocks = instance.require_u64("NumberOfBlocks")?;
    let size_bytes = block_size.checked_mul(blocks).ok_or_else(|| Error::Parse {
        field: "NumberOfBlocks".into(),
        snippet: format!("size overflow: {} blocks of {} bytes", blocks, block_size),
    })?;
    StorageVolume::new(id, pool_id, system_id, size_bytes)
}

// =============================================================================
// BackendAdapter Implementation
// =============================================================================

#[async_trait]
impl BackendAdapter for SmisAdapter {
    async fn startup(&self) -> Result<()> {
        // One enumeration validates reachability, credentials and the
        // configured namespace in a single round trip.
        let systems = self.enumerate(CLASS_SYSTEM).await?;
        debug!(backend = %self.backend, systems = systems.len(), "provider handshake complete");
        Ok(())
    }

    async fn shutdown(&self) {
        // Connections are pooled by the HTTP client and dropped with it.
    }

    async fn list_systems(&self) -> Result<SystemReport> {
        let systems = self
            .enumerate(CLASS_SYSTEM)
            .await?
            .iter()
            .map(project_system)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|s| self.in_scope(&s.id))
            .collect();
        Ok(SystemReport::of(systems))
    }

    async fn list_pools(&self) -> Result<Vec<StoragePool>> {
        Ok(self
            .enumerate(CLASS_POOL)
            .await?
            .iter()
            .map(project_pool)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|p| self.in_scope(&p.system_id))
            .collect())
    }

    async fn list_volumes(&self) -> Result<Vec<StorageVolume>> {
        Ok(self
            .enumerate(CLASS_VOLUME)
            .await?
            .iter()
            .map(project_volume)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|v| self.in_scope(&v.system_id))
            .collect())
    }

    async fn capabilities(&self, system_id: &str) -> Result<CapabilitySet> {
        self.check_scope(system_id)?;

        // Volume lifecycle requires a storage configuration service bound
        // to the system; without one the provider is read-only for us.
        let services = self.enumerate(CLASS_CONFIG_SERVICE).await?;
        let has_service = services.iter().any(|svc| {
            svc.property("SystemName")
                .map(|name| name == system_id)
                .unwrap_or(true)
        });

        let set = if has_service {
            CapabilitySet::read_only()
                .with(Capability::VolumeCreate)
                .with(Capability::VolumeResize)
                .with(Capability::VolumeDelete)
        } else {
            CapabilitySet::read_only()
        };
        debug!(backend = %self.backend, system = system_id, capabilities = %set, "negotiated capabilities");
        Ok(set)
    }

    async fn volume_create(
        &self,
        pool_id: &str,
        name: &str,
        size_bytes: u64,
    ) -> Result<StorageVolume> {
        info!(backend = %self.backend, pool = pool_id, name, size_bytes, "creating volume");
        let response = self
            .invoke(
                METHOD_CREATE_OR_MODIFY,
                &[
                    ("ElementName", name.to_string()),
                    ("Size", size_bytes.to_string()),
                    ("InPool", pool_id.to_string()),
                ],
            )
            .await?;
        let device_id = response.out_params.get("DeviceID").ok_or_else(|| {
            Error::missing_field("DeviceID", "method response out-parameters")
        })?;
        self.find_volume(device_id).await
    }

    async fn volume_resize(&self, volume_id: &str, new_size_bytes: u64) -> Result<StorageVolume> {
        info!(backend = %self.backend, volume = volume_id, new_size_bytes, "resizing volume");
        self.invoke(
            METHOD_CREATE_OR_MODIFY,
            &[
                ("TheElement", volume_id.to_string()),
                ("Size", new_size_bytes.to_string()),
            ],
        )
        .await?;
        self.find_volume(volume_id).await
    }

    async fn volume_delete(&self, volume_id: &str) -> Result<()> {
        info!(backend = %self.backend, volume = volume_id, "deleting volume");
        self.invoke(METHOD_RETURN_TO_POOL, &[("TheElement", volume_id.to_string())])
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        &self.backend
    }
}
