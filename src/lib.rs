//! Unified Storage Daemon
//!
//! A storage-management abstraction layer: one uniform API for inspecting
//! and manipulating storage resources (systems, pools, volumes, capability
//! sets), with pluggable backend adapters translating the uniform operations
//! into vendor mechanisms.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Daemon Core                              │
//! │  ┌────────────────┐   ┌─────────────────────────────────┐    │
//! │  │ Adapter        │──▶│ Adapter Sessions                │    │
//! │  │ Registry       │   │ (state machine, serialization,  │    │
//! │  │ (scheme        │   │  timeouts, capability cache)    │    │
//! │  │  dispatch)     │   └────────────────┬────────────────┘    │
//! │  └────────────────┘                    │                     │
//! ├────────────────────────────────────────┼─────────────────────┤
//! │               Backend Transport Adapters                     │
//! │  ┌──────────────────────┐  ┌──────────────────────────────┐  │
//! │  │ CLI                  │  │ SMI-S                        │  │
//! │  │ (vendor RAID tools)  │  │ (CIM-XML over HTTP/HTTPS)    │  │
//! │  └──────────────────────┘  └──────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Uniform entities, capabilities, and the adapter port
//! - [`protocol`]: Daemon-adapter request/response contract
//! - [`registry`]: Descriptor resolution and the session cache
//! - [`session`]: Session lifecycle, serialization and timeouts
//! - [`adapters`]: CLI and SMI-S transport adapters
//! - [`error`]: Error taxonomy

pub mod adapters;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use adapters::{CliParams, SmisParams, ToolFamily};
pub use domain::{
    Capability, CapabilitySet, DiscoveryCondition, HealthStatus, StoragePool, StorageSystem,
    StorageVolume, SystemReport,
};
pub use error::{Error, Result};
pub use protocol::{AdapterRequest, AdapterResponse};
pub use registry::{AdapterRegistry, ConnectionDescriptor, RegistryConfig, Scheme};
pub use session::{AdapterSession, SessionState, DEFAULT_OPERATION_TIMEOUT};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
