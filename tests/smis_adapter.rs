//! End-to-end tests for the SMI-S adapter family against a mock provider
//!
//! A small hyper server stands in for the CIM-XML provider; tests drive it
//! through the registry and session layers over real HTTP.

use assert_matches::assert_matches;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use unified_storage_daemon::{
    AdapterRegistry, AdapterRequest, AdapterResponse, ConnectionDescriptor, Error, HealthStatus,
    SmisParams,
};

const TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Mock Provider
// =============================================================================

#[derive(Clone)]
struct Provider {
    /// Respond 401 to everything
    reject_auth: bool,
    /// Respond with a CIM fault to enumerations
    fault_code: Option<&'static str>,
    requests: Arc<AtomicUsize>,
}

impl Provider {
    fn healthy() -> Self {
        Self {
            reject_auth: false,
            fault_code: None,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn spawn(self) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let provider = self;
        let make_svc = make_service_fn(move |_conn| {
            let provider = provider.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let provider = provider.clone();
                    async move { Ok::<_, Infallible>(provider.handle(req).await) }
                }))
            }
        });

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
        let addr = server.local_addr();
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });
        (addr, handle)
    }

    async fn handle(&self, req: Request<Body>) -> Response<Body> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if self.reject_auth {
            return Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body(Body::from("authorization required"))
                .unwrap();
        }

        let body = hyper::body::to_bytes(req.into_body()).await.unwrap();
        let body = String::from_utf8_lossy(&body);

        if let Some(code) = self.fault_code {
            return xml_response(format!(
                "{}<ERROR CODE=\"{}\" DESCRIPTION=\"CIM_ERR_FAILED: simulated fault\"/>{}",
                RESPONSE_HEAD, code, RESPONSE_TAIL
            ));
        }

        if body.contains("CreateOrModifyElementFromStoragePool") {
            return xml_response(method_response(
                "CreateOrModifyElementFromStoragePool",
                &[("DeviceID", "V9")],
            ));
        }
        if body.contains("ReturnToStoragePool") {
            return xml_response(method_response("ReturnToStoragePool", &[]));
        }

        let payload = if body.contains("CIM_ComputerSystem") {
            SYSTEMS_BODY
        } else if body.contains("CIM_StoragePool") {
            POOLS_BODY
        } else if body.contains("CIM_StorageVolume") {
            VOLUMES_BODY
        } else if body.contains("CIM_StorageConfigurationService") {
            SERVICE_BODY
        } else {
            ""
        };

        xml_response(format!("{}{}{}", RESPONSE_HEAD, payload, RESPONSE_TAIL))
    }
}

fn xml_response(body: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/xml; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

const RESPONSE_HEAD: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
    <CIM CIMVERSION=\"2.0\" DTDVERSION=\"2.0\">\
    <MESSAGE ID=\"1\" PROTOCOLVERSION=\"1.0\"><SIMPLERSP>\
    <IMETHODRESPONSE NAME=\"EnumerateInstances\"><IRETURNVALUE>";
const RESPONSE_TAIL: &str = "</IRETURNVALUE></IMETHODRESPONSE></SIMPLERSP></MESSAGE></CIM>";

const SYSTEMS_BODY: &str = "\
    <VALUE.NAMEDINSTANCE><INSTANCE CLASSNAME=\"CIM_ComputerSystem\">\
    <PROPERTY NAME=\"Name\" TYPE=\"string\"><VALUE>S1</VALUE></PROPERTY>\
    <PROPERTY NAME=\"ElementName\" TYPE=\"string\"><VALUE>Array One</VALUE></PROPERTY>\
    <PROPERTY.ARRAY NAME=\"OperationalStatus\" TYPE=\"uint16\">\
    <VALUE.ARRAY><VALUE>2</VALUE></VALUE.ARRAY></PROPERTY.ARRAY>\
    </INSTANCE></VALUE.NAMEDINSTANCE>\
    <VALUE.NAMEDINSTANCE><INSTANCE CLASSNAME=\"CIM_ComputerSystem\">\
    <PROPERTY NAME=\"Name\" TYPE=\"string\"><VALUE>S2</VALUE></PROPERTY>\
    <PROPERTY.ARRAY NAME=\"OperationalStatus\" TYPE=\"uint16\">\
    <VALUE.ARRAY><VALUE>3</VALUE></VALUE.ARRAY></PROPERTY.ARRAY>\
    </INSTANCE></VALUE.NAMEDINSTANCE>";

const POOLS_BODY: &str = "\
    <VALUE.NAMEDINSTANCE><INSTANCE CLASSNAME=\"CIM_StoragePool\">\
    <PROPERTY NAME=\"InstanceID\" TYPE=\"string\"><VALUE>P1</VALUE></PROPERTY>\
    <PROPERTY NAME=\"SystemName\" TYPE=\"string\"><VALUE>S1</VALUE></PROPERTY>\
    <PROPERTY NAME=\"TotalManagedSpace\" TYPE=\"uint64\"><VALUE>1000</VALUE></PROPERTY>\
    <PROPERTY NAME=\"RemainingManagedSpace\" TYPE=\"uint64\"><VALUE>400</VALUE></PROPERTY>\
    <PROPERTY.ARRAY NAME=\"OperationalStatus\" TYPE=\"uint16\">\
    <VALUE.ARRAY><VALUE>2</VALUE></VALUE.ARRAY></PROPERTY.ARRAY>\
    </INSTANCE></VALUE.NAMEDINSTANCE>";

const VOLUMES_BODY: &str = "\
    <VALUE.NAMEDINSTANCE><INSTANCE CLASSNAME=\"CIM_StorageVolume\">\
    <PROPERTY NAME=\"DeviceID\" TYPE=\"string\"><VALUE>V9</VALUE></PROPERTY>\
    <PROPERTY NAME=\"SystemName\" TYPE=\"string\"><VALUE>S1</VALUE></PROPERTY>\
    <PROPERTY NAME=\"PoolID\" TYPE=\"string\"><VALUE>P1</VALUE></PROPERTY>\
    <PROPERTY NAME=\"BlockSize\" TYPE=\"uint64\"><VALUE>512</VALUE></PROPERTY>\
    <PROPERTY NAME=\"NumberOfBlocks\" TYPE=\"uint64\"><VALUE>4096</VALUE></PROPERTY>\
    </INSTANCE></VALUE.NAMEDINSTANCE>";

const SERVICE_BODY: &str = "\
    <VALUE.NAMEDINSTANCE><INSTANCE CLASSNAME=\"CIM_StorageConfigurationService\">\
    <PROPERTY NAME=\"SystemName\" TYPE=\"string\"><VALUE>S1</VALUE></PROPERTY>\
    </INSTANCE></VALUE.NAMEDINSTANCE>";

fn method_response(method: &str, out_params: &[(&str, &str)]) -> String {
    let params: String = out_params
        .iter()
        .map(|(name, value)| {
            format!(
                "<PARAMVALUE NAME=\"{}\"><VALUE>{}</VALUE></PARAMVALUE>",
                name, value
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <CIM CIMVERSION=\"2.0\" DTDVERSION=\"2.0\">\
         <MESSAGE ID=\"1\" PROTOCOLVERSION=\"1.0\"><SIMPLERSP>\
         <METHODRESPONSE NAME=\"{}\">\
         <RETURNVALUE><VALUE>0</VALUE></RETURNVALUE>{}\
         </METHODRESPONSE></SIMPLERSP></MESSAGE></CIM>",
        method, params
    )
}

fn descriptor_for(addr: SocketAddr) -> ConnectionDescriptor {
    let mut params = SmisParams::new("127.0.0.1", "admin", "secret");
    params.port = Some(addr.port());
    ConnectionDescriptor::Smis(params)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn end_to_end_discovery() {
    let (addr, _server) = Provider::healthy().spawn();

    let registry = AdapterRegistry::new();
    let session = registry.resolve(&descriptor_for(addr)).await.unwrap();

    let report = match session
        .execute(AdapterRequest::ListSystems, TIMEOUT)
        .await
        .unwrap()
    {
        AdapterResponse::Systems(report) => report,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(report.systems.len(), 2);
    assert_eq!(report.systems[0].id, "S1");
    assert_eq!(report.systems[0].name, "Array One");
    assert_eq!(report.systems[0].status, HealthStatus::Ok);
    assert_eq!(report.systems[1].status, HealthStatus::Degraded);

    let pools = match session
        .execute(AdapterRequest::ListPools, TIMEOUT)
        .await
        .unwrap()
    {
        AdapterResponse::Pools(pools) => pools,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].id, "P1");
    assert_eq!(pools[0].system_id, "S1");
    assert_eq!(pools[0].total_bytes, 1000);
    assert_eq!(pools[0].free_bytes, 400);

    let volumes = match session
        .execute(AdapterRequest::ListVolumes, TIMEOUT)
        .await
        .unwrap()
    {
        AdapterResponse::Volumes(volumes) => volumes,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].size_bytes, 512 * 4096);
    assert!(volumes[0].id_transient);
}

#[tokio::test]
async fn rejected_credentials_fail_session_establishment() {
    let provider = Provider {
        reject_auth: true,
        fault_code: None,
        requests: Arc::new(AtomicUsize::new(0)),
    };
    let requests = provider.requests.clone();
    let (addr, _server) = provider.spawn();

    let registry = AdapterRegistry::new();
    let descriptor = descriptor_for(addr);

    let err = registry.resolve(&descriptor).await.unwrap_err();
    assert_matches!(err, Error::Authentication { .. });

    // Nothing was cached: the next resolve runs the handshake again
    let err = registry.resolve(&descriptor).await.unwrap_err();
    assert_matches!(err, Error::Authentication { .. });
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn provider_fault_carries_code() {
    let provider = Provider {
        reject_auth: false,
        fault_code: Some("7"),
        requests: Arc::new(AtomicUsize::new(0)),
    };
    let (addr, _server) = provider.spawn();

    let registry = AdapterRegistry::new();
    // Handshake itself enumerates and hits the fault
    let err = registry.resolve(&descriptor_for(addr)).await.unwrap_err();
    assert_matches!(err, Error::BackendCommand { ref code, ref message, .. }
        if code == "7" && message.contains("simulated fault"));
}

#[tokio::test]
async fn connection_refused_is_backend_unavailable() {
    // Bind and immediately drop a listener to get a port nobody serves
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let registry = AdapterRegistry::new();
    let err = registry.resolve(&descriptor_for(addr)).await.unwrap_err();
    assert_matches!(err, Error::BackendUnavailable { .. });
}

#[tokio::test]
async fn tls_against_plaintext_provider_is_backend_unavailable() {
    let (addr, _server) = Provider::healthy().spawn();

    let mut params = SmisParams::new("127.0.0.1", "admin", "secret");
    params.port = Some(addr.port());
    params.use_tls = true;

    let registry = AdapterRegistry::new();
    let err = registry
        .resolve(&ConnectionDescriptor::Smis(params))
        .await
        .unwrap_err();
    assert_matches!(err, Error::BackendUnavailable { .. });
}

#[tokio::test]
async fn system_scope_filters_discovery() {
    let (addr, _server) = Provider::healthy().spawn();

    let mut params = SmisParams::new("127.0.0.1", "admin", "secret");
    params.port = Some(addr.port());
    params.only_system = Some("S1".into());

    let registry = AdapterRegistry::new();
    let session = registry
        .resolve(&ConnectionDescriptor::Smis(params))
        .await
        .unwrap();
    let report = match session
        .execute(AdapterRequest::ListSystems, TIMEOUT)
        .await
        .unwrap()
    {
        AdapterResponse::Systems(report) => report,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(report.systems.len(), 1);
    assert_eq!(report.systems[0].id, "S1");
}

#[tokio::test]
async fn volume_create_and_delete() {
    let (addr, _server) = Provider::healthy().spawn();

    let registry = AdapterRegistry::new();
    let session = registry.resolve(&descriptor_for(addr)).await.unwrap();

    let created = match session
        .execute(
            AdapterRequest::VolumeCreate {
                system_id: "S1".into(),
                pool_id: "P1".into(),
                name: "vol9".into(),
                size_bytes: 512 * 4096,
            },
            TIMEOUT,
        )
        .await
        .unwrap()
    {
        AdapterResponse::VolumeCreated(volume) => volume,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(created.id, "V9");
    assert_eq!(created.pool_id, "P1");
    assert_eq!(created.system_id, "S1");

    let response = session
        .execute(
            AdapterRequest::VolumeDelete {
                system_id: "S1".into(),
                volume_id: "V9".into(),
            },
            TIMEOUT,
        )
        .await
        .unwrap();
    assert_eq!(response, AdapterResponse::VolumeDeleted);
}

#[tokio::test]
async fn capabilities_depend_on_configuration_service() {
    let (addr, _server) = Provider::healthy().spawn();

    let registry = AdapterRegistry::new();
    let session = registry.resolve(&descriptor_for(addr)).await.unwrap();

    let set = session.query_capabilities("S1", TIMEOUT).await.unwrap();
    assert!(set.supports(unified_storage_daemon::Capability::VolumeCreate));

    // Stable across repeated queries within one session
    let again = session.query_capabilities("S1", TIMEOUT).await.unwrap();
    assert_eq!(set, again);
}
