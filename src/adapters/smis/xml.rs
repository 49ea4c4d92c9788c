//! CIM-XML request construction and response parsing
//!
//! Covers the subset of the CIM-XML grammar the adapter actually exchanges:
//! intrinsic `EnumerateInstances` calls, extrinsic method calls against a
//! service class, instance payloads, and fault responses. Anything outside
//! that subset in a response is ignored; structurally broken XML maps to a
//! parse error carrying the decoder diagnostic.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

// =============================================================================
// Requests
// =============================================================================

fn namespace_path(namespace: &str) -> String {
    namespace
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(|seg| format!("<NAMESPACE NAME=\"{}\"/>", escape(seg)))
        .collect()
}

/// Build an intrinsic EnumerateInstances request
pub fn enumerate_instances_request(namespace: &str, class_name: &str, message_id: u64) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<CIM CIMVERSION=\"2.0\" DTDVERSION=\"2.0\">",
            "<MESSAGE ID=\"{id}\" PROTOCOLVERSION=\"1.0\">",
            "<SIMPLEREQ>",
            "<IMETHODCALL NAME=\"EnumerateInstances\">",
            "<LOCALNAMESPACEPATH>{ns}</LOCALNAMESPACEPATH>",
            "<IPARAMVALUE NAME=\"ClassName\"><CLASSNAME NAME=\"{class}\"/></IPARAMVALUE>",
            "</IMETHODCALL>",
            "</SIMPLEREQ>",
            "</MESSAGE>",
            "</CIM>"
        ),
        id = message_id,
        ns = namespace_path(namespace),
        class = escape(class_name),
    )
}

/// Build an extrinsic method call against a service class
pub fn invoke_method_request(
    namespace: &str,
    service_class: &str,
    method: &str,
    params: &[(&str, String)],
    message_id: u64,
) -> String {
    let rendered_params: String = params
        .iter()
        .map(|(name, value)| {
            format!(
                "<PARAMVALUE NAME=\"{}\"><VALUE>{}</VALUE></PARAMVALUE>",
                escape(*name),
                escape(value)
            )
        })
        .collect();

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<CIM CIMVERSION=\"2.0\" DTDVERSION=\"2.0\">",
            "<MESSAGE ID=\"{id}\" PROTOCOLVERSION=\"1.0\">",
            "<SIMPLEREQ>",
            "<METHODCALL NAME=\"{method}\">",
            "<LOCALCLASSPATH>",
            "<LOCALNAMESPACEPATH>{ns}</LOCALNAMESPACEPATH>",
            "<CLASSNAME NAME=\"{class}\"/>",
            "</LOCALCLASSPATH>",
            "{params}",
            "</METHODCALL>",
            "</SIMPLEREQ>",
            "</MESSAGE>",
            "</CIM>"
        ),
        id = message_id,
        method = escape(method),
        ns = namespace_path(namespace),
        class = escape(service_class),
        params = rendered_params,
    )
}

// =============================================================================
// Responses
// =============================================================================

/// One CIM instance lifted out of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CimInstance {
    pub class_name: String,
    pub properties: IndexMap<String, String>,
}

impl CimInstance {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|s| s.as_str())
    }

    pub fn require_property(&self, name: &str) -> Result<&str> {
        self.property(name).ok_or_else(|| {
            Error::missing_field(name, &format!("{} instance: {:?}", self.class_name, self.properties))
        })
    }

    pub fn require_u64(&self, name: &str) -> Result<u64> {
        let text = self.require_property(name)?;
        text.trim().parse::<u64>().map_err(|_| Error::Parse {
            field: name.to_string(),
            snippet: format!("'{}' in {} instance", text, self.class_name),
        })
    }
}

/// Result of an extrinsic method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodResponse {
    pub return_code: u32,
    pub out_params: IndexMap<String, String>,
}

/// Parsed body of any response we issue
#[derive(Debug, Default)]
struct ResponseBody {
    instances: Vec<CimInstance>,
    return_value: Option<String>,
    out_params: IndexMap<String, String>,
}

fn parse_error(detail: String) -> Error {
    Error::Parse {
        field: "cim-xml".to_string(),
        snippet: detail,
    }
}

/// Walk a CIM-XML response. A provider fault (`<ERROR ...>`) becomes
/// `BackendCommand` with the fault code and description preserved.
fn parse_response(xml: &str, backend: &str) -> Result<ResponseBody> {
    let mut reader = Reader::from_str(xml);
    let mut body = ResponseBody::default();

    // Walker state: the instance and property currently open, plus whether
    // the cursor sits inside RETURNVALUE or a named PARAMVALUE.
    let mut instance: Option<CimInstance> = None;
    let mut property: Option<String> = None;
    let mut in_return_value = false;
    let mut param_name: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_error(format!("malformed CIM-XML: {}", e)))?;
        match event {
            Event::Start(ref start) | Event::Empty(ref start) => {
                let attrs = collect_attributes(start)?;
                match start.name().as_ref() {
                    b"ERROR" => {
                        let code = attrs.get("CODE").cloned().unwrap_or_default();
                        let description = attrs
                            .get("DESCRIPTION")
                            .cloned()
                            .unwrap_or_else(|| "provider fault".to_string());
                        return Err(Error::BackendCommand {
                            backend: backend.to_string(),
                            code,
                            message: description,
                        });
                    }
                    b"INSTANCE" => {
                        instance = Some(CimInstance {
                            class_name: attrs.get("CLASSNAME").cloned().unwrap_or_default(),
                            properties: IndexMap::new(),
                        });
                    }
                    b"PROPERTY" | b"PROPERTY.ARRAY" => {
                        property = attrs.get("NAME").cloned();
                    }
                    b"RETURNVALUE" => in_return_value = true,
                    b"PARAMVALUE" => param_name = attrs.get("NAME").cloned(),
                    _ => {}
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| parse_error(format!("malformed CIM-XML text: {}", e)))?;
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if let (Some(inst), Some(prop)) = (instance.as_mut(), property.as_ref()) {
                    // First value wins for array-valued properties.
                    inst.properties
                        .entry(prop.clone())
                        .or_insert_with(|| value.to_string());
                } else if in_return_value && body.return_value.is_none() {
                    body.return_value = Some(value.to_string());
                } else if let Some(name) = param_name.as_ref() {
                    body.out_params
                        .entry(name.clone())
                        .or_insert_with(|| value.to_string());
                }
            }
            Event::End(end) => match end.name().as_ref() {
                b"INSTANCE" => {
                    if let Some(inst) = instance.take() {
                        body.instances.push(inst);
                    }
                }
                b"PROPERTY" | b"PROPERTY.ARRAY" => property = None,
                b"RETURNVALUE" => in_return_value = false,
                b"PARAMVALUE" => param_name = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(body)
}

fn collect_attributes(start: &quick_xml::events::BytesStart<'_>) -> Result<IndexMap<String, String>> {
    let mut attrs = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(format!("malformed attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| parse_error(format!("malformed attribute value: {}", e)))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Parse an EnumerateInstances response into instances
pub fn parse_enumerate_response(xml: &str, backend: &str) -> Result<Vec<CimInstance>> {
    Ok(parse_response(xml, backend)?.instances)
}

/// Parse an extrinsic method response into return code and out-parameters
pub fn parse_method_response(xml: &str, backend: &str) -> Result<MethodResponse> {
    let body = parse_response(xml, backend)?;
    let raw = body
        .return_value
        .ok_or_else(|| parse_error("response carried no RETURNVALUE".to_string()))?;
    let return_code = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| parse_error(format!("non-numeric RETURNVALUE '{}'", raw)))?;
    Ok(MethodResponse {
        return_code,
        out_params: body.out_params,
    })
}
