//! CloudEvents 1.0 HTTP protocol binding and the upstream event shape.
//!
//! Inbound requests are accepted in either content mode:
//!
//! - **structured**: `Content-Type: application/cloudevents+json`, the whole
//!   event is the JSON body
//! - **binary**: context attributes travel in `ce-*` headers and the body is
//!   the event data
//!
//! Batch mode is rejected.

use crate::domain::error::EnvelopeError;
use axum::http::{header::CONTENT_TYPE, HeaderMap};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The only CloudEvents version this gateway understands
pub const SPEC_VERSION: &str = "1.0";

/// Structured content mode media type
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Batched content mode media type
pub const BATCH_CONTENT_TYPE: &str = "application/cloudevents-batch+json";

/// Prefix of binary-mode attribute headers
const BINARY_HEADER_PREFIX: &str = "ce-";

/// Source of events produced by the gateway
pub const GATEWAY_EVENT_SOURCE: &str = "brigade.sh/cloudevents";

/// Type of events produced by the gateway
pub const GATEWAY_EVENT_TYPE: &str = "cloudevent";

/// Upstream API version and kind for forwarded events
pub const UPSTREAM_API_VERSION: &str = "brigade.sh/v2";
pub const UPSTREAM_KIND: &str = "Event";

/// A CloudEvent received from an event source. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub id: String,
    /// Originator identity; the registry key and salt
    pub source: String,
    pub event_type: String,
    pub spec_version: String,
    pub data_content_type: Option<String>,
    pub data_schema: Option<String>,
    pub subject: Option<String>,
    pub time: Option<String>,
    pub extensions: BTreeMap<String, String>,
    /// Raw data payload
    pub data: Option<Bytes>,
}

impl InboundEvent {
    /// Minimal event with the required attributes set
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            event_type: event_type.into(),
            spec_version: SPEC_VERSION.to_string(),
            data_content_type: None,
            data_schema: None,
            subject: None,
            time: None,
            extensions: BTreeMap::new(),
            data: None,
        }
    }

    /// Attach data with its content type
    pub fn with_data(mut self, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.data_content_type = Some(content_type.into());
        self.data = Some(data.into());
        self
    }

    /// Parse an event from request headers and the buffered body
    pub fn from_http(headers: &HeaderMap, body: &[u8]) -> Result<Self, EnvelopeError> {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type);

        match content_type.as_deref() {
            Some(STRUCTURED_CONTENT_TYPE) => Self::from_structured(body),
            Some(BATCH_CONTENT_TYPE) => Err(EnvelopeError::BatchUnsupported),
            _ if headers.contains_key("ce-specversion") => Self::from_binary(headers, body),
            _ => Err(EnvelopeError::NotACloudEvent),
        }
    }

    /// Parse a structured-mode JSON body
    pub fn from_structured(body: &[u8]) -> Result<Self, EnvelopeError> {
        let mut object: Map<String, Value> =
            serde_json::from_slice(body).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;

        let spec_version = take_required(&mut object, "specversion")?;
        check_spec_version(&spec_version)?;

        let mut event = Self {
            id: take_required(&mut object, "id")?,
            source: take_required(&mut object, "source")?,
            event_type: take_required(&mut object, "type")?,
            spec_version,
            data_content_type: take_optional(&mut object, "datacontenttype")?,
            data_schema: take_optional(&mut object, "dataschema")?,
            subject: take_optional(&mut object, "subject")?,
            time: take_optional(&mut object, "time")?,
            extensions: BTreeMap::new(),
            data: None,
        };

        let data = object.remove("data").filter(|v| !v.is_null());
        let data_base64 = object.remove("data_base64").filter(|v| !v.is_null());
        event.data = match (data, data_base64) {
            (Some(_), Some(_)) => {
                return Err(EnvelopeError::InvalidAttribute {
                    name: "data".into(),
                    reason: "data and data_base64 are mutually exclusive".into(),
                })
            }
            (Some(value), None) => Some(event.structured_data_bytes(value)),
            (None, Some(Value::String(encoded))) => Some(
                BASE64
                    .decode(encoded.as_bytes())
                    .map(Bytes::from)
                    .map_err(|e| EnvelopeError::InvalidBase64(e.to_string()))?,
            ),
            (None, Some(_)) => {
                return Err(EnvelopeError::InvalidAttribute {
                    name: "data_base64".into(),
                    reason: "expected a string".into(),
                })
            }
            (None, None) => None,
        };

        for (name, value) in object {
            let value = match value {
                Value::String(s) => s,
                Value::Bool(_) | Value::Number(_) => value.to_string(),
                Value::Null => continue,
                _ => {
                    return Err(EnvelopeError::InvalidAttribute {
                        name,
                        reason: "extension values must be scalars".into(),
                    })
                }
            };
            event.extensions.insert(name, value);
        }

        Ok(event)
    }

    /// Parse a binary-mode request: attributes in `ce-*` headers, body is data
    pub fn from_binary(headers: &HeaderMap, body: &[u8]) -> Result<Self, EnvelopeError> {
        let mut attributes = BTreeMap::new();
        for (name, value) in headers {
            let Some(attribute) = name.as_str().strip_prefix(BINARY_HEADER_PREFIX) else {
                continue;
            };
            let value = value.to_str().map_err(|_| EnvelopeError::InvalidAttribute {
                name: attribute.to_string(),
                reason: "header value is not visible ASCII".into(),
            })?;
            attributes.insert(attribute.to_string(), value.to_string());
        }

        let mut required = |name: &'static str| {
            attributes
                .remove(name)
                .filter(|v| !v.is_empty())
                .ok_or(EnvelopeError::MissingAttribute(name))
        };
        let spec_version = required("specversion")?;
        check_spec_version(&spec_version)?;
        let id = required("id")?;
        let source = required("source")?;
        let event_type = required("type")?;

        Ok(Self {
            id,
            source,
            event_type,
            spec_version,
            data_content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            data_schema: attributes.remove("dataschema"),
            subject: attributes.remove("subject"),
            time: attributes.remove("time"),
            extensions: attributes,
            data: (!body.is_empty()).then(|| Bytes::copy_from_slice(body)),
        })
    }

    /// Whether the data is JSON (CloudEvents defaults to `application/json`)
    pub fn has_json_data(&self) -> bool {
        self.data_content_type
            .as_deref()
            .map(|ct| is_json_media_type(&media_type(ct)))
            .unwrap_or(true)
    }

    /// Re-serialize the full event in structured JSON form.
    ///
    /// JSON data is embedded as `data`; anything else goes out as
    /// `data_base64`.
    pub fn to_structured_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut object = Map::new();
        object.insert("specversion".into(), Value::String(self.spec_version.clone()));
        object.insert("id".into(), Value::String(self.id.clone()));
        object.insert("source".into(), Value::String(self.source.clone()));
        object.insert("type".into(), Value::String(self.event_type.clone()));
        let optional = [
            ("datacontenttype", &self.data_content_type),
            ("dataschema", &self.data_schema),
            ("subject", &self.subject),
            ("time", &self.time),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                object.insert(name.into(), Value::String(value.clone()));
            }
        }
        for (name, value) in &self.extensions {
            object.insert(name.clone(), Value::String(value.clone()));
        }
        if let Some(data) = &self.data {
            match serde_json::from_slice::<Value>(data) {
                Ok(value) if self.has_json_data() => {
                    object.insert("data".into(), value);
                }
                _ => {
                    object.insert("data_base64".into(), Value::String(BASE64.encode(data)));
                }
            }
        }
        serde_json::to_vec(&Value::Object(object))
    }

    /// Bytes for a structured `data` member.
    ///
    /// A JSON string under a non-JSON content type is the data itself; in
    /// every other case the data is the JSON value's encoding.
    fn structured_data_bytes(&self, value: Value) -> Bytes {
        match value {
            Value::String(s) if !self.has_json_data() => Bytes::from(s),
            other => Bytes::from(other.to_string()),
        }
    }
}

/// Event submitted to the upstream events API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamEvent {
    pub api_version: String,
    pub kind: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Inbound `{source, type}` for downstream routing
    pub qualifiers: BTreeMap<String, String>,
    pub payload: String,
}

impl UpstreamEvent {
    /// Gateway-sourced event carrying the inbound `source` and `type` as
    /// qualifiers
    pub fn for_inbound(inbound: &InboundEvent, payload: String) -> Self {
        let qualifiers = BTreeMap::from([
            ("source".to_string(), inbound.source.clone()),
            ("type".to_string(), inbound.event_type.clone()),
        ]);
        Self {
            api_version: UPSTREAM_API_VERSION.to_string(),
            kind: UPSTREAM_KIND.to_string(),
            source: GATEWAY_EVENT_SOURCE.to_string(),
            event_type: GATEWAY_EVENT_TYPE.to_string(),
            qualifiers,
            payload,
        }
    }
}

/// Lowercased media type without parameters
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_json_media_type(media_type: &str) -> bool {
    media_type == "application/json" || media_type == "text/json" || media_type.ends_with("+json")
}

fn check_spec_version(version: &str) -> Result<(), EnvelopeError> {
    if version == SPEC_VERSION {
        Ok(())
    } else {
        Err(EnvelopeError::UnsupportedSpecVersion(version.to_string()))
    }
}

fn take_required(object: &mut Map<String, Value>, name: &'static str) -> Result<String, EnvelopeError> {
    take_optional(object, name)?
        .filter(|v| !v.is_empty())
        .ok_or(EnvelopeError::MissingAttribute(name))
}

fn take_optional(object: &mut Map<String, Value>, name: &str) -> Result<Option<String>, EnvelopeError> {
    match object.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(EnvelopeError::InvalidAttribute {
            name: name.to_string(),
            reason: "expected a string".into(),
        }),
    }
}
