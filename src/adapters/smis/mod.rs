//! SMI-S transport adapter family
//!
//! Speaks CIM-XML over HTTP(S) to a remote management provider and
//! normalizes block-services classes into the uniform entities.

pub mod adapter;
pub mod transport;
pub mod xml;

pub use adapter::SmisAdapter;
pub use transport::{SmisParams, DEFAULT_NAMESPACE, DEFAULT_PORT_HTTP, DEFAULT_PORT_HTTPS};
