//! Unified Storage Daemon - operator command-line entry point
//!
//! Thin shell over the library: builds a connection descriptor from flags,
//! resolves a session through the registry, issues one request and prints
//! the normalized result as JSON. Doubles as the interactive capability
//! query surface; the computation behind it is the same one library callers
//! and protocol requests hit.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use unified_storage_daemon::{
    AdapterRegistry, AdapterRequest, CliParams, ConnectionDescriptor, Scheme, SmisParams,
    ToolFamily,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Unified storage daemon - uniform API over pluggable backend adapters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Adapter scheme (cli, smis)
    #[arg(long, env = "USD_SCHEME")]
    scheme: String,

    /// Explicit vendor tool path (cli scheme)
    #[arg(long, env = "USD_TOOL_PATH")]
    tool_path: Option<PathBuf>,

    /// Vendor tool family (cli scheme: smartarray, megaraid)
    #[arg(long, env = "USD_TOOL_FAMILY")]
    tool_family: Option<String>,

    /// Provider host (smis scheme)
    #[arg(long, env = "USD_HOST")]
    host: Option<String>,

    /// Provider port; defaults to 5988 plaintext / 5989 TLS
    #[arg(long, env = "USD_PORT")]
    port: Option<u16>,

    /// Use HTTPS to the provider
    #[arg(long, env = "USD_TLS")]
    tls: bool,

    /// Disable TLS certificate validation (explicit, audited opt-in)
    #[arg(long, env = "USD_NO_VERIFY_TLS")]
    danger_no_verify_tls: bool,

    /// Provider username (smis scheme)
    #[arg(long, env = "USD_USERNAME")]
    username: Option<String>,

    /// Provider password (smis scheme)
    #[arg(long, env = "USD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Vendor namespace for providers that need one
    #[arg(long, env = "USD_NAMESPACE")]
    namespace: Option<String>,

    /// Restrict queries to one system id
    #[arg(long, env = "USD_SYSTEM_SCOPE")]
    system_scope: Option<String>,

    /// Per-operation timeout in milliseconds
    #[arg(long, env = "USD_TIMEOUT_MS", default_value = "30000")]
    timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List discovered systems
    Systems,
    /// List pools across all visible systems
    Pools,
    /// List volumes across all visible systems
    Volumes,
    /// Query the negotiated capability set for a system
    Capabilities {
        /// System identifier
        system: String,
    },
    /// Create a volume in a pool
    VolumeCreate {
        #[arg(long)]
        system: String,
        #[arg(long)]
        pool: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        size_bytes: u64,
    },
    /// Resize a volume
    VolumeResize {
        #[arg(long)]
        system: String,
        #[arg(long)]
        volume: String,
        #[arg(long)]
        size_bytes: u64,
    },
    /// Delete a volume
    VolumeDelete {
        #[arg(long)]
        system: String,
        #[arg(long)]
        volume: String,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Unified Storage Daemon {}", unified_storage_daemon::VERSION);

    let descriptor = build_descriptor(&args)?;
    let request = build_request(&args.command);
    let timeout = Duration::from_millis(args.timeout_ms);

    let registry = AdapterRegistry::new();
    let session = registry.resolve(&descriptor).await?;
    let response = session.execute(request, timeout).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    registry.shutdown().await;
    Ok(())
}

// =============================================================================
// Descriptor / Request Construction
// =============================================================================

fn build_descriptor(args: &Args) -> anyhow::Result<ConnectionDescriptor> {
    let scheme: Scheme = args.scheme.parse()?;
    match scheme {
        Scheme::Cli => {
            let mut params = CliParams::default();
            params.tool_path = args.tool_path.clone();
            params.family = args
                .tool_family
                .as_deref()
                .map(|f| f.parse::<ToolFamily>())
                .transpose()?;
            Ok(ConnectionDescriptor::Cli(params))
        }
        Scheme::Smis => {
            let host = args
                .host
                .clone()
                .ok_or_else(|| anyhow::anyhow!("smis scheme requires --host"))?;
            let username = args
                .username
                .clone()
                .ok_or_else(|| anyhow::anyhow!("smis scheme requires --username"))?;
            let password = args.password.clone().unwrap_or_default();

            let mut params = SmisParams::new(host, username, password);
            params.port = args.port;
            params.use_tls = args.tls;
            params.danger_no_verify_tls = args.danger_no_verify_tls;
            params.namespace = args.namespace.clone();
            params.only_system = args.system_scope.clone();
            Ok(ConnectionDescriptor::Smis(params))
        }
    }
}

fn build_request(command: &Command) -> AdapterRequest {
    match command {
        Command::Systems => AdapterRequest::ListSystems,
        Command::Pools => AdapterRequest::ListPools,
        Command::Volumes => AdapterRequest::ListVolumes,
        Command::Capabilities { system } => AdapterRequest::QueryCapabilities {
            system_id: system.clone(),
        },
        Command::VolumeCreate {
            system,
            pool,
            name,
            size_bytes,
        } => AdapterRequest::VolumeCreate {
            system_id: system.clone(),
            pool_id: pool.clone(),
            name: name.clone(),
            size_bytes: *size_bytes,
        },
        Command::VolumeResize {
            system,
            volume,
            size_bytes,
        } => AdapterRequest::VolumeResize {
            system_id: system.clone(),
            volume_id: volume.clone(),
            new_size_bytes: *size_bytes,
        },
        Command::VolumeDelete { system, volume } => AdapterRequest::VolumeDelete {
            system_id: system.clone(),
            volume_id: volume.clone(),
        },
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=info".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
