//! Vendor tool families and executable resolution
//!
//! Two RAID controller tool families are supported. Resolution walks an
//! ordered candidate list (family precedence, then search directory order,
//! then binary name order) and picks the first existing runnable executable.
//! An explicit path override beats all defaults. The precedence is fixed and
//! documented here rather than left to installation accidents; when the
//! losing family is also installed, the resolution records that so discovery
//! can surface it to the operator.

use crate::domain::capability::{Capability, CapabilitySet};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directories scanned for vendor tools, in priority order
const DEFAULT_SEARCH_DIRS: [&str; 4] = [
    "/usr/sbin",
    "/usr/bin",
    "/opt/smartstorageadmin/ssacli/bin",
    "/opt/MegaRAID/storcli",
];

// =============================================================================
// Tool Families
// =============================================================================

/// A vendor tool family, in fixed precedence order
///
/// `SmartArray` wins over `MegaRaid` when both are installed and neither an
/// explicit path nor an explicit family was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFamily {
    SmartArray,
    MegaRaid,
}

impl ToolFamily {
    /// All families, in precedence order
    pub const PRECEDENCE: [ToolFamily; 2] = [ToolFamily::SmartArray, ToolFamily::MegaRaid];

    /// Binary names this family installs under, preferred first
    pub fn binary_names(&self) -> &'static [&'static str] {
        match self {
            ToolFamily::SmartArray => &["ssacli", "hpssacli"],
            ToolFamily::MegaRaid => &["storcli64", "storcli"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolFamily::SmartArray => "smartarray",
            ToolFamily::MegaRaid => "megaraid",
        }
    }

    /// Infer the family from an executable file name
    pub fn from_binary_name(file_name: &str) -> Option<Self> {
        Self::PRECEDENCE
            .into_iter()
            .find(|family| family.binary_names().contains(&file_name))
    }

    /// Capability baseline when the tool does not advertise features itself.
    /// The mega family tooling has no in-place logical-drive expansion, so
    /// resize is absent from its baseline.
    pub fn default_capabilities(&self) -> CapabilitySet {
        match self {
            ToolFamily::SmartArray => CapabilitySet::full(),
            ToolFamily::MegaRaid => CapabilitySet::read_only()
                .with(Capability::VolumeCreate)
                .with(Capability::VolumeDelete),
        }
    }

    // ---- argv construction per uniform operation ----

    pub fn argv_version(&self) -> Vec<String> {
        vec!["version".into()]
    }

    pub fn argv_list_systems(&self) -> Vec<String> {
        match self {
            ToolFamily::SmartArray => svec(&["ctrl", "all", "show", "detail"]),
            ToolFamily::MegaRaid => svec(&["show", "ctrl", "all"]),
        }
    }

    pub fn argv_list_pools(&self) -> Vec<String> {
        match self {
            ToolFamily::SmartArray => svec(&["array", "all", "show", "detail"]),
            ToolFamily::MegaRaid => svec(&["show", "array", "all"]),
        }
    }

    pub fn argv_list_volumes(&self) -> Vec<String> {
        match self {
            ToolFamily::SmartArray => svec(&["ld", "all", "show", "detail"]),
            ToolFamily::MegaRaid => svec(&["show", "ld", "all"]),
        }
    }

    pub fn argv_volume_create(&self, pool_id: &str, name: &str, size_bytes: u64) -> Vec<String> {
        match self {
            ToolFamily::SmartArray => svec(&[
                "ld",
                "create",
                &format!("array={}", pool_id),
                &format!("name={}", name),
                &format!("size={}", size_bytes),
            ]),
            ToolFamily::MegaRaid => svec(&[
                "add",
                "ld",
                &format!("array={}", pool_id),
                &format!("name={}", name),
                &format!("size={}", size_bytes),
            ]),
        }
    }

    pub fn argv_volume_resize(&self, volume_id: &str, new_size_bytes: u64) -> Vec<String> {
        // Only meaningful for families whose baseline carries resize.
        svec(&[
            "ld",
            "modify",
            &format!("ld={}", volume_id),
            &format!("size={}", new_size_bytes),
        ])
    }

    pub fn argv_volume_delete(&self, volume_id: &str) -> Vec<String> {
        match self {
            ToolFamily::SmartArray => {
                svec(&["ld", "delete", &format!("ld={}", volume_id), "forced"])
            }
            ToolFamily::MegaRaid => svec(&["del", "ld", &format!("ld={}", volume_id), "force"]),
        }
    }
}

impl std::fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ToolFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "smartarray" | "smart-array" => Ok(ToolFamily::SmartArray),
            "megaraid" | "mega-raid" => Ok(ToolFamily::MegaRaid),
            other => Err(Error::Configuration(format!(
                "unknown tool family: {}",
                other
            ))),
        }
    }
}

fn svec(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Connection Parameters
// =============================================================================

/// Connection parameters for the CLI adapter family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliParams {
    /// Explicit executable path; beats all search-path defaults
    pub tool_path: Option<PathBuf>,
    /// Restrict resolution to one family
    pub family: Option<ToolFamily>,
    /// Directories to scan, in order. Defaults to the documented list.
    pub search_dirs: Vec<PathBuf>,
}

impl Default for CliParams {
    fn default() -> Self {
        Self {
            tool_path: None,
            family: None,
            search_dirs: DEFAULT_SEARCH_DIRS.iter().map(PathBuf::from).collect(),
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Outcome of executable resolution
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    pub family: ToolFamily,
    pub path: PathBuf,
    /// Other families found installed during the scan
    pub also_installed: Vec<ToolFamily>,
}

/// Resolve the executable to drive for the given parameters
///
/// Order: explicit path (family inferred from the file name unless given),
/// then the family precedence list restricted by `params.family`, scanning
/// `params.search_dirs` in order and binary names in preference order.
pub fn resolve_tool(params: &CliParams) -> Result<ResolvedTool> {
    if let Some(path) = &params.tool_path {
        if !is_runnable(path) {
            return Err(Error::BackendUnavailable {
                backend: "cli".into(),
                reason: format!("configured tool path is not runnable: {}", path.display()),
            });
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let family = match params.family.or_else(|| ToolFamily::from_binary_name(file_name)) {
            Some(family) => family,
            None => {
                return Err(Error::Configuration(format!(
                    "cannot infer tool family from '{}'; set the family parameter",
                    path.display()
                )))
            }
        };
        return Ok(ResolvedTool {
            family,
            path: path.clone(),
            also_installed: scan_installed(params)
                .into_iter()
                .map(|(family, _)| family)
                .filter(|f| *f != family)
                .collect(),
        });
    }

    let installed = scan_installed(params);
    let allowed: Vec<ToolFamily> = match params.family {
        Some(family) => vec![family],
        None => ToolFamily::PRECEDENCE.to_vec(),
    };

    let selected = allowed
        .iter()
        .find_map(|family| {
            installed
                .iter()
                .find(|(found, _)| found == family)
                .cloned()
        });

    match selected {
        Some((family, path)) => Ok(ResolvedTool {
            family,
            path,
            also_installed: installed
                .into_iter()
                .map(|(f, _)| f)
                .filter(|f| *f != family)
                .collect(),
        }),
        None => Err(Error::BackendUnavailable {
            backend: "cli".into(),
            reason: format!(
                "no vendor tool found; searched {} for {}",
                params
                    .search_dirs
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                allowed
                    .iter()
                    .map(|f| f.binary_names().join("/"))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }),
    }
}

/// Scan all families over the search directories, keeping the first hit per
/// family. Used both for selection and for ambiguity reporting.
fn scan_installed(params: &CliParams) -> Vec<(ToolFamily, PathBuf)> {
    let mut found = Vec::new();
    for family in ToolFamily::PRECEDENCE {
        'family: for dir in &params.search_dirs {
            for name in family.binary_names() {
                let candidate = dir.join(name);
                if is_runnable(&candidate) {
                    found.push((family, candidate));
                    break 'family;
                }
            }
        }
    }
    found
}

#[cfg(unix)]
fn is_runnable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_runnable(path: &Path) -> bool {
    path.is_file()
}
