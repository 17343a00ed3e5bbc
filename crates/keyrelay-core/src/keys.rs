//! Canonical key identifiers.
//!
//! Clients name keys with free-form strings.  [`Key::parse`] turns such a
//! string into a [`Key`] so that two spellings of the same physical key
//! (`"Return"` and `"enter"`, `" "` and `"space"`) compare equal.  This matters
//! for the "no re-press while held" bookkeeping: a key pressed as `"ENTER"`
//! must be recognised as held when the client later sends `"return"`.
//!
//! # Parsing rules
//!
//! | Input                       | Result                          |
//! |-----------------------------|---------------------------------|
//! | `""`, `"   "`               | `None` (empty identifier)       |
//! | exactly one character       | [`Key::Char`] (case preserved)  |
//! | `" "`, `"\t"`, `"\n"`       | `Space`, `Tab`, `Enter`         |
//! | a known name or alias       | [`Key::Modifier`] / [`Key::Named`] |
//! | anything else               | [`Key::Raw`] (backend decides)  |
//!
//! Names are matched case-insensitively, ignoring `-`, `_` and inner spaces,
//! so `"Page Up"`, `"page-up"` and `"PAGEUP"` are the same key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::modifiers::Modifier;

/// Non-character keys with a well-known name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Insert,
    Space,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    CapsLock,
    Meta,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl NamedKey {
    /// Canonical lowercase name, as used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            NamedKey::Enter => "enter",
            NamedKey::Tab => "tab",
            NamedKey::Escape => "escape",
            NamedKey::Backspace => "backspace",
            NamedKey::Delete => "delete",
            NamedKey::Insert => "insert",
            NamedKey::Space => "space",
            NamedKey::ArrowUp => "up",
            NamedKey::ArrowDown => "down",
            NamedKey::ArrowLeft => "left",
            NamedKey::ArrowRight => "right",
            NamedKey::Home => "home",
            NamedKey::End => "end",
            NamedKey::PageUp => "pageup",
            NamedKey::PageDown => "pagedown",
            NamedKey::CapsLock => "capslock",
            NamedKey::Meta => "meta",
            NamedKey::F1 => "f1",
            NamedKey::F2 => "f2",
            NamedKey::F3 => "f3",
            NamedKey::F4 => "f4",
            NamedKey::F5 => "f5",
            NamedKey::F6 => "f6",
            NamedKey::F7 => "f7",
            NamedKey::F8 => "f8",
            NamedKey::F9 => "f9",
            NamedKey::F10 => "f10",
            NamedKey::F11 => "f11",
            NamedKey::F12 => "f12",
        }
    }
}

/// A canonical key identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// One of the three tracked modifier keys.
    Modifier(Modifier),
    /// A named non-character key.
    Named(NamedKey),
    /// A single printable character.  Case is preserved: `'A'` and `'a'` are
    /// distinct keys as far as held-key bookkeeping is concerned.
    Char(char),
    /// An unrecognised multi-character name, passed through to the injector
    /// backend, which may accept or reject it.
    Raw(String),
}

impl Key {
    /// Parses a client-supplied key identifier.
    ///
    /// Returns `None` when the identifier is empty or whitespace-only (but see
    /// the table in the module docs: a lone `" "` is the space key).
    pub fn parse(ident: &str) -> Option<Key> {
        let mut chars = ident.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(Key::from_char(c));
        }

        let trimmed = ident.trim();
        if trimmed.is_empty() {
            return None;
        }
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(Key::from_char(c));
        }

        Some(lookup_name(trimmed).unwrap_or_else(|| Key::Raw(trimmed.to_string())))
    }

    /// Returns the modifier this key controls, if it is one of ctrl/shift/alt.
    pub fn modifier(&self) -> Option<Modifier> {
        match self {
            Key::Modifier(m) => Some(*m),
            _ => None,
        }
    }

    /// `true` for ctrl, shift and alt.
    pub fn is_modifier(&self) -> bool {
        self.modifier().is_some()
    }

    fn from_char(c: char) -> Key {
        match c {
            ' ' => Key::Named(NamedKey::Space),
            '\t' => Key::Named(NamedKey::Tab),
            '\n' | '\r' => Key::Named(NamedKey::Enter),
            other => Key::Char(other),
        }
    }
}

impl From<Modifier> for Key {
    fn from(m: Modifier) -> Self {
        Key::Modifier(m)
    }
}

impl From<NamedKey> for Key {
    fn from(k: NamedKey) -> Self {
        Key::Named(k)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Modifier(m) => f.write_str(m.name()),
            Key::Named(k) => f.write_str(k.name()),
            Key::Char(c) => write!(f, "'{c}'"),
            Key::Raw(name) => write!(f, "\"{name}\""),
        }
    }
}

/// Resolves a multi-character key name (or alias) to its canonical [`Key`].
fn lookup_name(name: &str) -> Option<Key> {
    let folded: String = name
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect();

    let key = match folded.as_str() {
        "ctrl" | "control" | "ctl" | "lctrl" | "leftctrl" | "controlleft" => {
            Key::Modifier(Modifier::Ctrl)
        }
        "shift" | "lshift" | "leftshift" | "shiftleft" => Key::Modifier(Modifier::Shift),
        "alt" | "option" | "opt" | "lalt" | "leftalt" | "altleft" => Key::Modifier(Modifier::Alt),

        "enter" | "return" | "ret" => Key::Named(NamedKey::Enter),
        "tab" => Key::Named(NamedKey::Tab),
        "esc" | "escape" => Key::Named(NamedKey::Escape),
        "backspace" | "bksp" | "back" => Key::Named(NamedKey::Backspace),
        "delete" | "del" => Key::Named(NamedKey::Delete),
        "insert" | "ins" => Key::Named(NamedKey::Insert),
        "space" | "spacebar" => Key::Named(NamedKey::Space),
        "up" | "arrowup" | "uparrow" => Key::Named(NamedKey::ArrowUp),
        "down" | "arrowdown" | "downarrow" => Key::Named(NamedKey::ArrowDown),
        "left" | "arrowleft" | "leftarrow" => Key::Named(NamedKey::ArrowLeft),
        "right" | "arrowright" | "rightarrow" => Key::Named(NamedKey::ArrowRight),
        "home" => Key::Named(NamedKey::Home),
        "end" => Key::Named(NamedKey::End),
        "pageup" | "pgup" | "prior" => Key::Named(NamedKey::PageUp),
        "pagedown" | "pgdn" | "next" => Key::Named(NamedKey::PageDown),
        "capslock" | "caps" => Key::Named(NamedKey::CapsLock),
        "meta" | "super" | "win" | "windows" | "cmd" | "command" => Key::Named(NamedKey::Meta),

        "f1" => Key::Named(NamedKey::F1),
        "f2" => Key::Named(NamedKey::F2),
        "f3" => Key::Named(NamedKey::F3),
        "f4" => Key::Named(NamedKey::F4),
        "f5" => Key::Named(NamedKey::F5),
        "f6" => Key::Named(NamedKey::F6),
        "f7" => Key::Named(NamedKey::F7),
        "f8" => Key::Named(NamedKey::F8),
        "f9" => Key::Named(NamedKey::F9),
        "f10" => Key::Named(NamedKey::F10),
        "f11" => Key::Named(NamedKey::F11),
        "f12" => Key::Named(NamedKey::F12),

        _ => return None,
    };
    Some(key)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
