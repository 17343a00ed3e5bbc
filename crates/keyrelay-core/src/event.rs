//! Internal input events and the concrete steps they expand into.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::keys::Key;
use crate::modifiers::ModifierFlags;

/// Absolute pointer position in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: u32,
    pub y: u32,
}

impl PointerPosition {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for PointerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A validated, canonical input event.  One per accepted request.
///
/// `flags` is the modifier context the client *asked for*; the pipeline
/// combines it with the tracker's held set when the event is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown { key: Key, flags: ModifierFlags },
    KeyUp { key: Key, flags: ModifierFlags },
    /// Indivisible down+up of the same key.
    KeyStroke { key: Key, flags: ModifierFlags },
    MouseMove(PointerPosition),
}

impl InputEvent {
    /// Short operation name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::KeyDown { .. } => "key_down",
            InputEvent::KeyUp { .. } => "key_up",
            InputEvent::KeyStroke { .. } => "keystroke",
            InputEvent::MouseMove(_) => "mouse_mv",
        }
    }

    /// The key a key-pressing event would press, if any.
    ///
    /// `KeyUp` and `MouseMove` press nothing.
    pub fn pressed_key(&self) -> Option<&Key> {
        match self {
            InputEvent::KeyDown { key, .. } | InputEvent::KeyStroke { key, .. } => Some(key),
            InputEvent::KeyUp { .. } | InputEvent::MouseMove(_) => None,
        }
    }
}

/// A single OS-level injection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    KeyDown { key: Key, flags: ModifierFlags },
    KeyUp { key: Key, flags: ModifierFlags },
    MouseMove(PointerPosition),
}

impl Step {
    /// The key this step releases, if it is a key-up.
    pub fn released_key(&self) -> Option<&Key> {
        match self {
            Step::KeyUp { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::KeyDown { key, flags } => write!(f, "down {key} [{flags}]"),
            Step::KeyUp { key, flags } => write!(f, "up {key} [{flags}]"),
            Step::MouseMove(pos) => write!(f, "move {pos}"),
        }
    }
}
