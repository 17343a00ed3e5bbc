//! Request and response shapes of the RPC surface.
//!
//! | Operation   | Request          | Response     |
//! |-------------|------------------|--------------|
//! | `keystroke` | [`KeyRequest`]   | [`Response`] |
//! | `key_down`  | [`KeyRequest`]   | [`Response`] |
//! | `key_up`    | [`KeyRequest`]   | [`Response`] |
//! | `mouse_mv`  | [`MouseRequest`] | [`Response`] |
//! | `test`      | [`Empty`]        | [`Empty`]    |
//!
//! Field names match the schema exactly, so the serde representation is the
//! schema's JSON mapping:
//!
//! ```json
//! {"key":"c","is_ctrl":true,"is_shift":false,"is_alt":false}
//! {"x_pos":640,"y_pos":480}
//! {"success":false,"reason_for_fail":"key identifier must not be empty"}
//! ```

use serde::{Deserialize, Serialize};

use crate::modifiers::ModifierFlags;

/// Request of `keystroke`, `key_down` and `key_up`.
///
/// The three flags describe the modifier context the client wants for this
/// event.  Omitted flags default to `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    pub key: String,
    #[serde(default)]
    pub is_ctrl: bool,
    #[serde(default)]
    pub is_shift: bool,
    #[serde(default)]
    pub is_alt: bool,
}

impl KeyRequest {
    /// A request for `key` with no modifiers.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ctrl(mut self) -> Self {
        self.is_ctrl = true;
        self
    }

    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.is_shift = true;
        self
    }

    #[must_use]
    pub fn with_alt(mut self) -> Self {
        self.is_alt = true;
        self
    }

    /// The requested modifier context as a flag set.
    pub fn flags(&self) -> ModifierFlags {
        ModifierFlags::from_bools(self.is_ctrl, self.is_shift, self.is_alt)
    }
}

/// Request of `mouse_mv`: absolute pointer coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseRequest {
    pub x_pos: u32,
    pub y_pos: u32,
}

/// Response of every input operation.
///
/// `reason_for_fail` is empty on success and non-empty on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default)]
    pub reason_for_fail: String,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason_for_fail: String::new(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason_for_fail: reason.into(),
        }
    }
}

/// Request and response of the `test` liveness probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// One of the four input operations, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireRequest {
    Keystroke(KeyRequest),
    KeyDown(KeyRequest),
    KeyUp(KeyRequest),
    MouseMv(MouseRequest),
}

impl WireRequest {
    /// Operation name as it appears on the wire.
    pub fn operation(&self) -> &'static str {
        match self {
            WireRequest::Keystroke(_) => "keystroke",
            WireRequest::KeyDown(_) => "key_down",
            WireRequest::KeyUp(_) => "key_up",
            WireRequest::MouseMv(_) => "mouse_mv",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
