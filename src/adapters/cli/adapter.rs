//! CLI transport adapter
//!
//! Translates the uniform operation set into vendor tool invocations and
//! projects the parsed output into the uniform entities. The adapter holds
//! no mutable state: every listing is a fresh invocation, so read-only
//! discovery is idempotent by construction.

use crate::adapters::cli::exec::run_tool;
use crate::adapters::cli::parse::{parse_blocks, RawRecord};
use crate::adapters::cli::tool::{resolve_tool, CliParams, ResolvedTool};
use crate::domain::capability::{Capability, CapabilitySet};
use crate::domain::model::{
    DiscoveryCondition, HealthStatus, StoragePool, StorageSystem, StorageVolume, SystemReport,
};
use crate::domain::ports::BackendAdapter;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

// =============================================================================
// Adapter
// =============================================================================

/// Adapter driving a local vendor RAID management tool
pub struct CliAdapter {
    tool: ResolvedTool,
    backend: String,
}

impl CliAdapter {
    /// Resolve the executable for the given parameters
    pub fn new(params: &CliParams) -> Result<Self> {
        let tool = resolve_tool(params)?;
        let backend = format!("cli-{}", tool.family);
        info!(
            backend = %backend,
            tool = %tool.path.display(),
            "resolved vendor tool"
        );
        if !tool.also_installed.is_empty() {
            warn!(
                backend = %backend,
                also_installed = ?tool.also_installed,
                "multiple vendor tool families installed; selection followed fixed precedence"
            );
        }
        Ok(Self { tool, backend })
    }

    async fn run(&self, args: Vec<String>) -> Result<String> {
        let output = run_tool(&self.tool.path, &args, &self.backend).await?;
        Ok(output.stdout)
    }

    /// First-stage extraction, rejecting output that parses to nothing.
    /// Blank output is a legitimate empty listing; non-blank output without
    /// a single named field is unparsable.
    fn records(&self, stdout: &str, entity: &str) -> Result<Vec<RawRecord>> {
        let records = parse_blocks(stdout);
        if records.is_empty() && !stdout.trim().is_empty() {
            return Err(Error::missing_field(entity, stdout));
        }
        Ok(records)
    }
}

// =============================================================================
// Projection
// =============================================================================

const SYSTEM_ID: &[&str] = &["system", "controller", "ctrl"];
const POOL_ID: &[&str] = &["pool", "array"];
const VOLUME_ID: &[&str] = &["volume", "ld", "logical_drive"];

fn project_system(record: &RawRecord) -> Result<StorageSystem> {
    let id = record.require(SYSTEM_ID)?;
    let name = record.get(&["name", "model"]).unwrap_or(id).to_string();
    let status = record
        .get(&["status"])
        .map(HealthStatus::from_backend_token)
        .unwrap_or(HealthStatus::Unknown);
    StorageSystem::new(id, name, status)
}

fn project_pool(record: &RawRecord) -> Result<StoragePool> {
    let id = record.require(POOL_ID)?;
    let system_id = record.require(SYSTEM_ID)?;
    let total = record.require_u64(&["total_capacity", "total", "capacity"])?;
    let free = record.require_u64(&["free_capacity", "free"])?;
    let status = record
        .get(&["status"])
        .map(HealthStatus::from_backend_token)
        .unwrap_or(HealthStatus::Unknown);
    StoragePool::new(id, system_id, total, free, status)
}

fn project_volume(record: &RawRecord) -> Result<StorageVolume> {
    let id = record.require(VOLUME_ID)?;
    let pool_id = record.require(POOL_ID)?;
    let system_id = record.require(SYSTEM_ID)?;
    let size = record.require_u64(&["size", "size_bytes", "capacity"])?;
    StorageVolume::new(id, pool_id, system_id, size)
}

/// Map advertised feature tokens to capabilities; unknown tokens are
/// ignored so newer tool revisions do not break older daemons.
fn capabilities_from_features(features: &str) -> CapabilitySet {
    let mut set = CapabilitySet::read_only();
    for token in features.split(',') {
        match token.trim().to_ascii_lowercase().as_str() {
            "create" | "volume-create" => set = set.with(Capability::VolumeCreate),
            "resize" | "expand" | "volume-resize" => set = set.with(Capability::VolumeResize),
            "delete" | "volume-delete" => set = set.with(Capability::VolumeDelete),
            _ => {}
        }
    }
    set
}

// =============================================================================
// BackendAdapter Implementation
// =============================================================================

#[async_trait]
impl BackendAdapter for CliAdapter {
    async fn startup(&self) -> Result<()> {
        // Version probe doubles as the runnability handshake.
        let stdout = self.run(self.tool.family.argv_version()).await?;
        debug!(backend = %self.backend, version = %stdout.trim(), "vendor tool responded");
        Ok(())
    }

    async fn shutdown(&self) {
        // Children are per-invocation and reaped by kill_on_drop.
    }

    async fn list_systems(&self) -> Result<SystemReport> {
        let stdout = self.run(self.tool.family.argv_list_systems()).await?;
        let systems = self
            .records(&stdout, "system")?
            .iter()
            .filter(|r| r.get(SYSTEM_ID).is_some())
            .map(project_system)
            .collect::<Result<Vec<_>>>()?;

        let mut report = SystemReport::of(systems);
        if report.systems.is_empty() && !self.tool.also_installed.is_empty() {
            // Zero systems while another family is installed usually means
            // the operator expected the other tool to be selected.
            let condition = DiscoveryCondition::AmbiguousToolInstall {
                selected: self.tool.family.name().to_string(),
                also_installed: self
                    .tool
                    .also_installed
                    .iter()
                    .map(|f| f.name().to_string())
                    .collect(),
            };
            warn!(backend = %self.backend, %condition, "discovery returned no systems");
            report = report.with_condition(condition);
        }
        Ok(report)
    }

    async fn list_pools(&self) -> Result<Vec<StoragePool>> {
        let stdout = self.run(self.tool.family.argv_list_pools()).await?;
        self.records(&stdout, "pool")?
            .iter()
            .filter(|r| r.get(POOL_ID).is_some())
            .map(project_pool)
            .collect()
    }

    async fn list_volumes(&self) -> Result<Vec<StorageVolume>> {
        let stdout = self.run(self.tool.family.argv_list_volumes()).await?;
        self.records(&stdout, "volume")?
            .iter()
            .filter(|r| r.get(VOLUME_ID).is_some())
            .map(project_volume)
            .collect()
    }

    async fn capabilities(&self, system_id: &str) -> Result<CapabilitySet> {
        let stdout = self.run(self.tool.family.argv_list_systems()).await?;
        let records = self.records(&stdout, "system")?;
        let record = records
            .iter()
            .find(|r| r.get(SYSTEM_ID) == Some(system_id))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "system '{}' is not visible on this connection",
                    system_id
                ))
            })?;

        // Newer firmware advertises its feature set; otherwise fall back to
        // the family baseline.
        let set = match record.get(&["features", "supported_features"]) {
            Some(features) => capabilities_from_features(features),
            None => self.tool.family.default_capabilities(),
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
        let argv = self.tool.family.argv_volume_create(pool_id, name, size_bytes);
        let stdout = self.run(argv).await?;
        self.records(&stdout, "volume")?
            .iter()
            .find(|r| r.get(VOLUME_ID).is_some())
            .map(project_volume)
            .unwrap_or_else(|| Err(Error::missing_field("volume", &stdout)))
    }

    async fn volume_resize(&self, volume_id: &str, new_size_bytes: u64) -> Result<StorageVolume> {
        info!(backend = %self.backend, volume = volume_id, new_size_bytes, "resizing volume");
        let argv = self.tool.family.argv_volume_resize(volume_id, new_size_bytes);
        let stdout = self.run(argv).await?;
        self.records(&stdout, "volume")?
            .iter()
            .find(|r| r.get(VOLUME_ID).is_some())
            .map(project_volume)
            .unwrap_or_else(|| Err(Error::missing_field("volume", &stdout)))
    }

    async fn volume_delete(&self, volume_id: &str) -> Result<()> {
        info!(backend = %self.backend, volume = volume_id, "deleting volume");
        let argv = self.tool.family.argv_volume_delete(volume_id);
        self.run(argv).await?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_pool_field_order_independent() {
        let a = RawRecord::from_pairs(&[
            ("Pool", "P1"),
            ("System", "S1"),
            ("Total", "1000"),
            ("Free", "400"),
            ("Status", "OK"),
        ]);
        let b = RawRecord::from_pairs(&[
            ("Free", "400"),
            ("Status", "OK"),
            ("System", "S1"),
            ("Total", "1000"),
            ("Pool", "P1"),
        ]);
        assert_eq!(project_pool(&a).unwrap(), project_pool(&b).unwrap());
    }

    #[test]
    fn test_project_pool_missing_free_names_field() {
        let record = RawRecord::from_pairs(&[("Pool", "P1"), ("System", "S1"), ("Total", "1000")]);
        let err = project_pool(&record).unwrap_err();
        assert!(err.to_string().contains("free_capacity"));
    }

    #[test]
    fn test_project_pool_invariant_enforced() {
        let record = RawRecord::from_pairs(&[
            ("Pool", "P1"),
            ("System", "S1"),
            ("Total", "100"),
            ("Free", "200"),
        ]);
        assert!(project_pool(&record).is_err());
    }

    #[test]
    fn test_project_volume_is_transient() {
        let record = RawRecord::from_pairs(&[
            ("Volume", "V1"),
            ("Pool", "P1"),
            ("System", "S1"),
            ("Size", "4096"),
        ]);
        let volume = project_volume(&record).unwrap();
        assert!(volume.id_transient);
        assert_eq!(volume.size_bytes, 4096);
    }

    #[test]
    fn test_feature_tokens() {
        let set = capabilities_from_features("create, resize");
        assert!(set.supports(Capability::VolumeCreate));
        assert!(set.supports(Capability::VolumeResize));
        assert!(!set.supports(Capability::VolumeDelete));
        assert!(set.supports(Capability::PoolList));

        // Unknown tokens are ignored
        let set = capabilities_from_features("telemetry, delete");
        assert!(set.supports(Capability::VolumeDelete));
    }
}
