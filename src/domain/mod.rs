//! Core domain types: uniform entities, capabilities, and the adapter port

pub mod capability;
pub mod model;
pub mod ports;

pub use capability::{Capability, CapabilitySet};
pub use model::{
    DiscoveryCondition, HealthStatus, StoragePool, StorageSystem, StorageVolume, SystemReport,
};
pub use ports::{BackendAdapter, BackendAdapterRef};
