//! JSON frames of the WebSocket RPC transport.
//!
//! Every request is one text frame:
//!
//! ```json
//! {"id":7,"method":"keystroke","params":{"key":"c","is_ctrl":true}}
//! {"id":8,"method":"mouse_mv","params":{"x_pos":640,"y_pos":480}}
//! {"id":9,"method":"test"}
//! ```
//!
//! and is answered by one text frame carrying the same `id`:
//!
//! ```json
//! {"id":7,"result":{"success":true,"reason_for_fail":""}}
//! {"id":9,"result":{}}
//! {"id":null,"error":"malformed request frame: expected value at line 1 column 1"}
//! ```
//!
//! `error` replies are for frames that could not be turned into a call at
//! all.  A call that ran and failed is still a `result` with
//! `success = false`.

use keyrelay_core::{Empty, KeyRequest, MouseRequest, Response, WireRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a frame could not be turned into a call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("malformed request frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("invalid params for {method}: {source}")]
    BadParams {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<u64>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A reply frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcReply {
    Result { id: Option<u64>, result: Value },
    Error { id: Option<u64>, error: String },
}

impl RpcReply {
    pub fn response(id: Option<u64>, response: &Response) -> Self {
        let result = serde_json::to_value(response).unwrap_or(Value::Null);
        RpcReply::Result { id, result }
    }

    pub fn empty(id: Option<u64>, _probe: Empty) -> Self {
        RpcReply::Result {
            id,
            result: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn error(id: Option<u64>, error: &TransportError) -> Self {
        RpcReply::Error {
            id,
            error: error.to_string(),
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            RpcReply::Result { id, .. } | RpcReply::Error { id, .. } => *id,
        }
    }
}

/// What a frame asks the server to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCall {
    /// One of the four input operations.
    Input(WireRequest),
    /// The liveness probe.
    Test,
}

impl RpcCall {
    pub fn method(&self) -> &'static str {
        match self {
            RpcCall::Input(request) => request.operation(),
            RpcCall::Test => "test",
        }
    }
}

/// A text frame after decoding.  `id` is recovered even when the call is not.
#[derive(Debug)]
pub struct Inbound {
    pub id: Option<u64>,
    pub call: Result<RpcCall, TransportError>,
}

/// Decodes one text frame.
pub fn decode_frame(text: &str) -> Inbound {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return Inbound {
                id: None,
                call: Err(TransportError::Malformed(e)),
            }
        }
    };
    let id = value.get("id").and_then(Value::as_u64);
    let call = serde_json::from_value::<RpcRequest>(value)
        .map_err(TransportError::Malformed)
        .and_then(into_call);
    Inbound { id, call }
}

fn into_call(request: RpcRequest) -> Result<RpcCall, TransportError> {
    let RpcRequest { method, params, .. } = request;
    let call = match method.as_str() {
        "keystroke" => RpcCall::Input(WireRequest::Keystroke(key_params("keystroke", params)?)),
        "key_down" => RpcCall::Input(WireRequest::KeyDown(key_params("key_down", params)?)),
        "key_up" => RpcCall::Input(WireRequest::KeyUp(key_params("key_up", params)?)),
        "mouse_mv" => RpcCall::Input(WireRequest::MouseMv(
            serde_json::from_value::<MouseRequest>(params).map_err(|source| {
                TransportError::BadParams {
                    method: "mouse_mv",
                    source,
                }
            })?,
        )),
        "test" => RpcCall::Test,
        _ => return Err(TransportError::UnknownMethod(method)),
    };
    Ok(call)
}

fn key_params(method: &'static str, params: Value) -> Result<KeyRequest, TransportError> {
    serde_json::from_value(params).map_err(|source| TransportError::BadParams { method, source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
