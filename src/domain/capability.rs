//! Capability negotiation types
//!
//! Each backend/system combination supports a subset of the uniform
//! operation set. Adapters report that subset as a `CapabilitySet` bitmask,
//! computed once per system per session and cached for the session lifetime.

use serde::{Deserialize, Serialize};

// =============================================================================
// Capability
// =============================================================================

/// A named operation a backend/system combination may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    SystemList,
    PoolList,
    VolumeList,
    CapabilityQuery,
    VolumeCreate,
    VolumeResize,
    VolumeDelete,
}

impl Capability {
    const ALL: [Capability; 7] = [
        Capability::SystemList,
        Capability::PoolList,
        Capability::VolumeList,
        Capability::CapabilityQuery,
        Capability::VolumeCreate,
        Capability::VolumeResize,
        Capability::VolumeDelete,
    ];

    fn bit(self) -> u64 {
        1 << (self as u64)
    }

    /// Whether the operation mutates backend state and therefore must be
    /// capability-checked before dispatch.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Capability::VolumeCreate | Capability::VolumeResize | Capability::VolumeDelete
        )
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::SystemList => "system-list",
            Capability::PoolList => "pool-list",
            Capability::VolumeList => "volume-list",
            Capability::CapabilityQuery => "capability-query",
            Capability::VolumeCreate => "volume-create",
            Capability::VolumeResize => "volume-resize",
            Capability::VolumeDelete => "volume-delete",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// CapabilitySet
// =============================================================================

/// Bitmask of supported operations, scoped to one system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(u64);

impl CapabilitySet {
    /// Empty set: nothing supported
    pub fn none() -> Self {
        Self(0)
    }

    /// The read-only operations every adapter must provide
    pub fn read_only() -> Self {
        Self::none()
            .with(Capability::SystemList)
            .with(Capability::PoolList)
            .with(Capability::VolumeList)
            .with(Capability::CapabilityQuery)
    }

    /// All operations in the uniform set
    pub fn full() -> Self {
        Capability::ALL
            .iter()
            .fold(Self::none(), |set, cap| set.with(*cap))
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0 |= capability.bit();
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Enumerate supported capabilities, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .iter()
            .copied()
            .filter(move |cap| self.supports(*cap))
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}
