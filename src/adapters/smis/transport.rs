//! HTTP(S) transport to an SMI-S provider
//!
//! Carries CIM-XML request/response bodies over HTTP POST with basic
//! authentication. Certificate validation is on by default; disabling it is
//! an explicit opt-in recorded in the connection parameters and logged at
//! startup so the exception is auditable.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Default provider ports per DMTF registration
pub const DEFAULT_PORT_HTTP: u16 = 5988;
pub const DEFAULT_PORT_HTTPS: u16 = 5989;

/// Interop namespace used when no vendor namespace is configured
pub const DEFAULT_NAMESPACE: &str = "interop";

// =============================================================================
// Connection Parameters
// =============================================================================

/// Connection parameters for the SMI-S adapter family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmisParams {
    pub host: String,
    /// Defaults to 5988 plaintext / 5989 TLS when unset
    pub port: Option<u16>,
    pub use_tls: bool,
    /// Certificate validation opt-out; validation is the default
    pub danger_no_verify_tls: bool,
    pub username: String,
    pub password: String,
    /// Vendor namespace for providers that need one to disambiguate
    /// otherwise-identical classes; forwarded only when set
    pub namespace: Option<String>,
    /// Restrict all queries to one system id
    pub only_system: Option<String>,
    /// Connect timeout for session establishment
    pub connect_timeout: Duration,
}

impl SmisParams {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            use_tls: false,
            danger_no_verify_tls: false,
            username: username.into(),
            password: password.into(),
            namespace: None,
            only_system: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_tls {
            DEFAULT_PORT_HTTPS
        } else {
            DEFAULT_PORT_HTTP
        })
    }

    pub fn effective_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}/cimom", scheme, self.host, self.effective_port())
    }
}

// =============================================================================
// Transport
// =============================================================================

/// One authenticated HTTP channel to a provider
pub struct SmisTransport {
    http: reqwest::Client,
    url: String,
    username: String,
    password: String,
    namespace: String,
    message_id: AtomicU64,
    backend: String,
}

impl SmisTransport {
    pub fn new(params: &SmisParams, backend: &str) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(params.connect_timeout)
            .use_rustls_tls();

        if params.danger_no_verify_tls {
            warn!(
                backend,
                host = %params.host,
                "TLS certificate validation disabled by explicit configuration"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().map_err(|e| Error::Configuration(format!(
            "failed to build HTTP client: {}",
            e
        )))?;

        Ok(Self {
            http,
            url: params.url(),
            username: params.username.clone(),
            password: params.password.clone(),
            namespace: params.effective_namespace().to_string(),
            message_id: AtomicU64::new(1),
            backend: backend.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Next CIM message id, unique per transport
    pub fn next_message_id(&self) -> u64 {
        self.message_id.fetch_add(1, Ordering::Relaxed)
    }

    /// POST one CIM-XML payload and return the response body
    ///
    /// Connection-level failures map to `BackendUnavailable`, an HTTP 401 to
    /// `Authentication`, and any other non-success status to
    /// `BackendCommand` with the body preserved as the provider diagnostic.
    pub async fn post(&self, cim_method: &str, payload: String) -> Result<String> {
        debug!(backend = %self.backend, method = cim_method, url = %self.url, "posting CIM-XML request");

        let response = self
            .http
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("CIMProtocolVersion", "1.0")
            .header("CIMOperation", "MethodCall")
            .header("CIMMethod", cim_method)
            .header("CIMObject", self.namespace.as_str())
            .body(payload)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::BackendUnavailable {
            backend: self.backend.clone(),
            reason: format!("connection lost reading response: {}", e),
        })?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                backend: self.backend.clone(),
            });
        }
        if !status.is_success() {
            return Err(Error::BackendCommand {
                backend: self.backend.clone(),
                code: status.as_u16().to_string(),
                message: body.trim().to_string(),
            });
        }

        Ok(body)
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        // Refusal, DNS failure, TLS handshake rejection and timeouts all
        // mean the provider was never reached.
        if err.is_connect() || err.is_timeout() {
            Error::BackendUnavailable {
                backend: self.backend.clone(),
                reason: err.to_string(),
            }
        } else {
            Error::BackendUnavailable {
                backend: self.backend.clone(),
                reason: format!("request failed: {}", err),
            }
        }
    }
}
