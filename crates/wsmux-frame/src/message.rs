use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FrameError, Result};

/// Error code used when a failed response carries no error object.
pub const UNKNOWN_ERROR_CODE: &str = "unknown_error";
/// Error message used when a failed response carries no error object.
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";

/// An outbound request before an identifier has been assigned.
///
/// Fields are merged flat into the frame next to `id` and `type`; the peer
/// does not accept a nested payload object.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: String,
    fields: Map<String, Value>,
}

impl Request {
    /// Create a request of the given kind with no extra fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Create a request whose fields are taken from a JSON object.
    ///
    /// `Value::Null` is accepted as "no fields"; any other non-object is rejected.
    pub fn from_value(kind: impl Into<String>, fields: Value) -> Result<Self> {
        let fields = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(FrameError::Malformed(format!(
                    "request fields must be a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };
        Ok(Self {
            kind: kind.into(),
            fields,
        })
    }

    /// Add a single field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Merge a set of fields, replacing existing keys.
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// The request kind, sent as `type`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Kind-specific fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialize the request as a text frame carrying `id`.
    ///
    /// `id` and `type` always come from the multiplexer, even if a caller
    /// supplied fields with the same names.
    pub fn to_frame(&self, id: u64) -> Result<String> {
        let mut frame = self.fields.clone();
        frame.insert("id".to_string(), Value::from(id));
        frame.insert("type".to_string(), Value::String(self.kind.clone()));
        Ok(serde_json::to_string(&Value::Object(frame))?)
    }
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// The error reported when the peer said "no" without saying why.
    pub fn unknown() -> Self {
        Self {
            code: UNKNOWN_ERROR_CODE.to_string(),
            message: UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }

    fn or_defaults(mut self) -> Self {
        if self.code.is_empty() {
            self.code = UNKNOWN_ERROR_CODE.to_string();
        }
        if self.message.is_empty() {
            self.message = UNKNOWN_ERROR_MESSAGE.to_string();
        }
        self
    }
}

/// A response correlated to a pending request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseMessage {
    pub id: u64,
    /// Absent markers are treated as success; only an explicit `false` fails.
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl ResponseMessage {
    /// Build a successful response with no payload (used for `pong`).
    pub fn empty_success(id: u64) -> Self {
        Self {
            id,
            success: Some(true),
            result: None,
            error: None,
        }
    }

    /// Split into the result payload or the peer-reported error.
    ///
    /// A success without `result` yields `Value::Null`. A failure without an
    /// error object yields [`ApiError::unknown`].
    pub fn into_result(self) -> std::result::Result<Value, ApiError> {
        if self.is_failure() {
            Err(self
                .error
                .map(ApiError::or_defaults)
                .unwrap_or_else(ApiError::unknown))
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }

    /// True only when the peer sent `"success": false`.
    pub fn is_failure(&self) -> bool {
        self.success == Some(false)
    }
}

/// An event delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventMessage {
    pub id: u64,
    #[serde(default)]
    pub event: Value,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Routed to the pending-request table.
    Response(ResponseMessage),
    /// Routed to the subscription table.
    Event(EventMessage),
}

impl InboundMessage {
    /// Correlation identifier of the frame.
    pub fn id(&self) -> u64 {
        match self {
            Self::Response(response) => response.id,
            Self::Event(event) => event.id,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireInbound {
    Result(ResponseMessage),
    Pong { id: u64 },
    Event(EventMessage),
}

/// Decode and classify one inbound text frame.
///
/// Anything that is not a `result`, `pong` or `event` frame with an integer
/// `id` is an error; the reader loop drops such frames.
pub fn decode_inbound(text: &str) -> Result<InboundMessage> {
    let wire: WireInbound = serde_json::from_str(text)?;
    Ok(match wire {
        WireInbound::Result(response) => InboundMessage::Response(response),
        WireInbound::Pong { id } => InboundMessage::Response(ResponseMessage::empty_success(id)),
        WireInbound::Event(event) => InboundMessage::Event(event),
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
