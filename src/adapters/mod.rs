//! Backend transport adapters
//!
//! Two families are provided:
//! - CLI: drives a local vendor RAID management tool
//! - SMI-S: speaks CIM-XML over HTTP(S) to a remote provider
//!
//! Adapter construction is dispatched by the registry from the connection
//! descriptor's scheme; see [`crate::registry`].

pub mod cli;
pub mod smis;

pub use cli::{CliAdapter, CliParams, ToolFamily};
pub use smis::{SmisAdapter, SmisParams};
