//! Adapter sessions and the daemon-adapter execution protocol
//!
//! A session is the live binding between one connection descriptor and one
//! running adapter instance. Each session walks the state machine
//! `UNBOUND -> CONNECTING -> READY -> (OPERATING)* -> CLOSED`, with
//! `CONNECTING -> FAILED` on a handshake failure. Requests on one session
//! serialize on an async mutex; sessions never share a backend channel.
//!
//! A timed-out or cancelled operation closes the session: the in-flight
//! future is dropped (killing any child process with it), the state goes to
//! `CLOSED`, and the registry hands out a fresh session on the next resolve.
//! Closing instead of reconnecting keeps retry an explicit caller decision.

use crate::domain::capability::CapabilitySet;
use crate::domain::ports::BackendAdapterRef;
use crate::error::{Error, Result};
use crate::protocol::{AdapterRequest, AdapterResponse};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-operation timeout
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(30_000);

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of an adapter session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Connecting,
    Ready,
    Operating,
    Failed,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Unbound => "unbound",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Operating => "operating",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Adapter Session
// =============================================================================

/// Live binding between a connection descriptor and an adapter instance
pub struct AdapterSession {
    /// Redacted descriptor text for logs and error payloads
    descriptor: String,
    adapter: BackendAdapterRef,
    state: parking_lot::Mutex<SessionState>,
    /// Serializes requests; one outstanding operation per session
    op_lock: tokio::sync::Mutex<()>,
    /// Capability cache, one entry per system, for the session lifetime
    capabilities: tokio::sync::RwLock<BTreeMap<String, CapabilitySet>>,
    established_at: parking_lot::Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for AdapterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSession")
            .field("descriptor", &self.descriptor)
            .field("backend", &self.adapter.backend_name())
            .field("state", &self.state())
            .finish()
    }
}

impl AdapterSession {
    pub fn new(descriptor: String, adapter: BackendAdapterRef) -> Self {
        Self {
            descriptor,
            adapter,
            state: parking_lot::Mutex::new(SessionState::Unbound),
            op_lock: tokio::sync::Mutex::new(()),
            capabilities: tokio::sync::RwLock::new(BTreeMap::new()),
            established_at: parking_lot::Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the session can no longer accept requests
    pub fn is_closed(&self) -> bool {
        matches!(self.state(), SessionState::Failed | SessionState::Closed)
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn backend_name(&self) -> &str {
        self.adapter.backend_name()
    }

    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        *self.established_at.lock()
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock() = next;
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Run the startup handshake. Called once by the registry; a failure
    /// leaves the session in `FAILED` and uncached.
    pub async fn connect(&self, timeout: Duration) -> Result<()> {
        self.set_state(SessionState::Connecting);
        debug!(descriptor = %self.descriptor, "session connecting");

        match tokio::time::timeout(timeout, self.adapter.startup()).await {
            Ok(Ok(())) => {
                self.set_state(SessionState::Ready);
                *self.established_at.lock() = Some(Utc::now());
                info!(descriptor = %self.descriptor, backend = self.adapter.backend_name(), "session ready");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(descriptor = %self.descriptor, error = %e, "session handshake failed");
                self.set_state(SessionState::Failed);
                Err(e)
            }
            Err(_) => {
                warn!(descriptor = %self.descriptor, "session handshake timed out");
                self.set_state(SessionState::Failed);
                Err(Error::Timeout {
                    operation: "startup".into(),
                    millis: timeout.as_millis() as u64,
                })
            }
        }
    }

    // =========================================================================
    // Request Execution
    // =========================================================================

    /// Execute one request under a timeout
    ///
    /// Requests queue on the session lock and run strictly one at a time.
    /// On timeout the in-flight future is dropped, the session closes and
    /// is never reused; the caller decides whether to re-resolve and retry.
    pub async fn execute(
        &self,
        request: AdapterRequest,
        timeout: Duration,
    ) -> Result<AdapterResponse> {
        let _serialized = self.op_lock.lock().await;

        match self.state() {
            SessionState::Ready => {}
            state => {
                return Err(Error::SessionClosed {
                    descriptor: format!("{} (state: {})", self.descriptor, state),
                })
            }
        }

        // The guard closes the session if this future is dropped mid-flight:
        // a cancelled caller cannot know whether the backend side effect
        // happened, so the binding must not be reused.
        let guard = OperationGuard::begin(self);

        match tokio::time::timeout(timeout, self.dispatch(&request)).await {
            Ok(Ok(response)) => {
                guard.finish(SessionState::Ready);
                Ok(response)
            }
            Ok(Err(e)) => {
                // Per-operation backend errors leave the session usable.
                guard.finish(SessionState::Ready);
                Err(e)
            }
            Err(_) => {
                warn!(
                    descriptor = %self.descriptor,
                    operation = request.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "operation timed out; tearing session down"
                );
                guard.finish(SessionState::Closed);
                self.adapter.shutdown().await;
                Err(Error::Timeout {
                    operation: request.name().into(),
                    millis: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Capability query surface for library callers; same computation and
    /// cache as protocol requests and the command-line surface.
    pub async fn query_capabilities(
        &self,
        system_id: &str,
        timeout: Duration,
    ) -> Result<CapabilitySet> {
        let request = AdapterRequest::QueryCapabilities {
            system_id: system_id.to_string(),
        };
        match self.execute(request, timeout).await? {
            AdapterResponse::Capabilities(set) => Ok(set),
            other => Err(Error::Internal(format!(
                "unexpected response to capability query: {:?}",
                other
            ))),
        }
    }

    /// Explicit disconnect. Waits for any in-flight request, then closes.
    pub async fn close(&self) {
        let _serialized = self.op_lock.lock().await;
        if !self.is_closed() {
            info!(descriptor = %self.descriptor, "session closing");
            self.set_state(SessionState::Closed);
            self.adapter.shutdown().await;
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    async fn dispatch(&self, request: &AdapterRequest) -> Result<AdapterResponse> {
        // Mutating operations are gated on the negotiated capability set
        // before anything reaches the backend.
        let capability = request.capability();
        if capability.is_mutating() {
            let system_id = request
                .target_system()
                .ok_or_else(|| Error::Internal("mutating request without system".into()))?;
            let negotiated = self.negotiated(system_id).await?;
            if !negotiated.supports(capability) {
                return Err(Error::CapabilityUnsupported {
                    capability: capability.to_string(),
                    system_id: system_id.to_string(),
                });
            }
        }

        match request {
            AdapterRequest::ListSystems => {
                Ok(AdapterResponse::Systems(self.adapter.list_systems().await?))
            }
            AdapterRequest::ListPools => {
                Ok(AdapterResponse::Pools(self.adapter.list_pools().await?))
            }
            AdapterRequest::ListVolumes => {
                Ok(AdapterResponse::Volumes(self.adapter.list_volumes().await?))
            }
            AdapterRequest::QueryCapabilities { system_id } => Ok(
                AdapterResponse::Capabilities(self.negotiated(system_id).await?),
            ),
            AdapterRequest::VolumeCreate {
                pool_id,
                name,
                size_bytes,
                ..
            } => Ok(AdapterResponse::VolumeCreated(
                self.adapter.volume_create(pool_id, name, *size_bytes).await?,
            )),
            AdapterRequest::VolumeResize {
                volume_id,
                new_size_bytes,
                ..
            } => Ok(AdapterResponse::VolumeResized(
                self.adapter
                    .volume_resize(volume_id, *new_size_bytes)
                    .await?,
            )),
            AdapterRequest::VolumeDelete { volume_id, .. } => {
                self.adapter.volume_delete(volume_id).await?;
                Ok(AdapterResponse::VolumeDeleted)
            }
        }
    }

    /// The one capability computation behind every query surface
    async fn negotiated(&self, system_id: &str) -> Result<CapabilitySet> {
        if let Some(cached) = self.capabilities.read().await.get(system_id) {
            return Ok(*cached);
        }
        let computed = self.adapter.capabilities(system_id).await?;
        self.capabilities
            .write()
            .await
            .insert(system_id.to_string(), computed);
        Ok(computed)
    }
}

// =============================================================================
// Operation Guard
// =============================================================================

/// RAII transition through `OPERATING`
///
/// Dropping the guard without `finish` means the operation future was
/// cancelled from outside; the session closes rather than risk a desynced
/// backend channel.
struct OperationGuard<'a> {
    session: &'a AdapterSession,
    finished: bool,
}

impl<'a> OperationGuard<'a> {
    fn begin(session: &'a AdapterSession) -> Self {
        session.set_state(SessionState::Operating);
        Self {
            session,
            finished: false,
        }
    }

    fn finish(mut self, next: SessionState) {
        self.session.set_state(next);
        self.finished = true;
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                descriptor = %self.session.descriptor,
                "operation cancelled mid-flight; closing session"
            );
            self.session.set_state(SessionState::Closed);
        }
    }
}
