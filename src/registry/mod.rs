//! Adapter registry and dispatcher
//!
//! Resolves connection descriptors to live adapter sessions. Adapter family
//! selection is a closed, tagged dispatch on the descriptor scheme so the
//! precedence between families stays auditable. The session cache guarantees
//! at most one live session per descriptor: concurrent first access shares a
//! single in-flight creation, later resolves reuse the cached session, and a
//! closed session is evicted and replaced on the next resolve.

use crate::adapters::cli::{CliAdapter, CliParams};
use crate::adapters::smis::{SmisAdapter, SmisParams};
use crate::domain::ports::BackendAdapterRef;
use crate::error::{Error, Result};
use crate::session::AdapterSession;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

// =============================================================================
// Scheme
// =============================================================================

/// Adapter family selector carried by a connection descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Cli,
    Smis,
}

impl std::str::FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cli" => Ok(Scheme::Cli),
            "smis" | "smispy" => Ok(Scheme::Smis),
            other => Err(Error::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Cli => write!(f, "cli"),
            Scheme::Smis => write!(f, "smis"),
        }
    }
}

// =============================================================================
// Connection Descriptor
// =============================================================================

/// Scheme plus family-specific connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    Cli(CliParams),
    Smis(SmisParams),
}

impl ConnectionDescriptor {
    pub fn scheme(&self) -> Scheme {
        match self {
            ConnectionDescriptor::Cli(_) => Scheme::Cli,
            ConnectionDescriptor::Smis(_) => Scheme::Smis,
        }
    }

    /// Stable cache key over the full parameter set. Internal only; logs use
    /// the redacted `Display` form.
    pub fn cache_key(&self) -> String {
        match self {
            ConnectionDescriptor::Cli(p) => format!(
                "cli|path={}|family={}|dirs={}",
                p.tool_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
                p.family.map(|f| f.name().to_string()).unwrap_or_default(),
                p.search_dirs
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect::<Vec<_>>()
                    .join(":"),
            ),
            ConnectionDescriptor::Smis(p) => format!(
                "smis|{}:{}|tls={}|verify={}|user={}|pass={}|ns={}|sys={}",
                p.host,
                p.effective_port(),
                p.use_tls,
                !p.danger_no_verify_tls,
                p.username,
                p.password,
                p.namespace.as_deref().unwrap_or_default(),
                p.only_system.as_deref().unwrap_or_default(),
            ),
        }
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionDescriptor::Cli(p) => match &p.tool_path {
                Some(path) => write!(f, "cli://{}", path.display()),
                None => write!(
                    f,
                    "cli://auto/{}",
                    p.family.map(|fam| fam.name()).unwrap_or("any")
                ),
            },
            ConnectionDescriptor::Smis(p) => {
                write!(f, "smis://{}@{}:{}", p.username, p.host, p.effective_port())
            }
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Bound on the startup handshake of a new session
    pub handshake_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

type SessionCell = Arc<OnceCell<Arc<AdapterSession>>>;

/// Resolves descriptors to sessions, at most one live session per descriptor
pub struct AdapterRegistry {
    sessions: DashMap<String, SessionCell>,
    config: RegistryConfig,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Resolve a descriptor to a ready session
    ///
    /// First access creates the adapter and runs its handshake; concurrent
    /// first access waits on that single creation. A handshake failure is
    /// returned to the caller and leaves nothing cached, so the next resolve
    /// retries from scratch. A cached session found closed (timeout, cancel,
    /// explicit close) is evicted and built anew.
    pub async fn resolve(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<AdapterSession>> {
        let key = descriptor.cache_key();
        loop {
            let cell = self
                .sessions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();

            let session = cell
                .get_or_try_init(|| self.create_session(descriptor))
                .await?
                .clone();

            if session.is_closed() {
                debug!(descriptor = %descriptor, "evicting closed session");
                self.sessions
                    .remove_if(&key, |_, existing| Arc::ptr_eq(existing, &cell));
                continue;
            }
            return Ok(session);
        }
    }

    async fn create_session(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<AdapterSession>> {
        info!(descriptor = %descriptor, scheme = %descriptor.scheme(), "creating adapter session");
        let adapter = build_adapter(descriptor)?;
        let session = Arc::new(AdapterSession::new(descriptor.to_string(), adapter));
        session.connect(self.config.handshake_timeout).await?;
        Ok(session)
    }

    /// Explicitly disconnect the session for a descriptor, if one is live
    pub async fn disconnect(&self, descriptor: &ConnectionDescriptor) -> bool {
        let key = descriptor.cache_key();
        if let Some((_, cell)) = self.sessions.remove(&key) {
            if let Some(session) = cell.get() {
                session.close().await;
                return true;
            }
        }
        false
    }

    /// Close every live session. Called on daemon shutdown.
    pub async fn shutdown(&self) {
        let cells: Vec<SessionCell> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.sessions.clear();
        let live = cells.iter().filter_map(|cell| cell.get());
        futures::future::join_all(live.map(|session| session.close())).await;
    }

    /// Number of cached descriptors (live or pending)
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Construct the concrete adapter for a descriptor. Closed dispatch: adding
/// a family means adding a variant here, not registering at runtime.
fn build_adapter(descriptor: &ConnectionDescriptor) -> Result<BackendAdapterRef> {
    match descriptor {
        ConnectionDescriptor::Cli(params) => Ok(Arc::new(CliAdapter::new(params)?)),
        ConnectionDescriptor::Smis(params) => Ok(Arc::new(SmisAdapter::new(params)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("cli".parse::<Scheme>().unwrap(), Scheme::Cli);
        assert_eq!("SMIS".parse::<Scheme>().unwrap(), Scheme::Smis);
        let err = "nfs".parse::<Scheme>().unwrap_err();
        assert_matches!(err, Error::UnsupportedScheme { ref scheme } if scheme == "nfs");
    }

    #[test]
    fn test_cache_key_is_stable_and_parameter_sensitive() {
        let a = ConnectionDescriptor::Smis(SmisParams::new("h1", "admin", "secret"));
        let b = ConnectionDescriptor::Smis(SmisParams::new("h1", "admin", "secret"));
        assert_eq!(a.cache_key(), b.cache_key());

        let mut params = SmisParams::new("h1", "admin", "secret");
        params.only_system = Some("S1".into());
        let c = ConnectionDescriptor::Smis(params);
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_display_redacts_credentials() {
        let descriptor = ConnectionDescriptor::Smis(SmisParams::new("h1", "admin", "hunter2"));
        let shown = descriptor.to_string();
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_resolve_unresolvable_cli_leaves_nothing_cached() {
        let registry = AdapterRegistry::new();
        let descriptor = ConnectionDescriptor::Cli(CliParams {
            tool_path: None,
            family: None,
            search_dirs: vec!["/nonexistent-tools".into()],
        });
        let err = registry.resolve(&descriptor).await.unwrap_err();
        assert_matches!(err, Error::BackendUnavailable { .. });
        // The empty cell may remain, but no session was cached
        let err = registry.resolve(&descriptor).await.unwrap_err();
        assert_matches!(err, Error::BackendUnavailable { .. });
    }
}
