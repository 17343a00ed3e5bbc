//! Modifier flags and the modifier state tracker.
//!
//! The tracker is the server's model of which of ctrl/shift/alt are logically
//! held on the target.  It is not a mirror of the real OS state: a user at the
//! physical keyboard can press ctrl without the server ever knowing.  The
//! server treats its own model as the source of truth when composing the
//! modifier context of later events.
//!
//! Lifecycle: empty at start, mutated only after a modifier key-down/key-up has
//! been confirmed by the OS injector, reset only by a restart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::keys::Key;

/// One of the three tracked modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

impl Modifier {
    /// All modifiers, in the order synthesized presses are emitted.
    pub const ALL: [Modifier; 3] = [Modifier::Ctrl, Modifier::Shift, Modifier::Alt];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Alt => "alt",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Modifier::Ctrl => ModifierFlags::CTRL,
            Modifier::Shift => ModifierFlags::SHIFT,
            Modifier::Alt => ModifierFlags::ALT,
        }
    }
}

/// A set of modifiers, packed into a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifierFlags(pub u8);

impl ModifierFlags {
    pub const CTRL: u8 = 1 << 0;
    pub const SHIFT: u8 = 1 << 1;
    pub const ALT: u8 = 1 << 2;

    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a set from the three per-request booleans of the wire schema.
    pub fn from_bools(ctrl: bool, shift: bool, alt: bool) -> Self {
        let mut flags = Self::empty();
        if ctrl {
            flags.insert(Modifier::Ctrl);
        }
        if shift {
            flags.insert(Modifier::Shift);
        }
        if alt {
            flags.insert(Modifier::Alt);
        }
        flags
    }

    /// Returns `true` if Ctrl is in the set.
    pub fn ctrl(&self) -> bool {
        self.contains(Modifier::Ctrl)
    }

    /// Returns `true` if Shift is in the set.
    pub fn shift(&self) -> bool {
        self.contains(Modifier::Shift)
    }

    /// Returns `true` if Alt is in the set.
    pub fn alt(&self) -> bool {
        self.contains(Modifier::Alt)
    }

    pub fn contains(&self, m: Modifier) -> bool {
        self.0 & m.bit() != 0
    }

    pub fn insert(&mut self, m: Modifier) {
        self.0 |= m.bit();
    }

    pub fn remove(&mut self, m: Modifier) {
        self.0 &= !m.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn union(self, other: ModifierFlags) -> Self {
        Self(self.0 | other.0)
    }

    /// Modifiers in `self` that are not in `other`.
    #[must_use]
    pub fn difference(self, other: ModifierFlags) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterates the members in ctrl, shift, alt order.
    pub fn iter(self) -> impl DoubleEndedIterator<Item = Modifier> {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl fmt::Display for ModifierFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Modifier::name).collect();
        f.write_str(&names.join("+"))
    }
}

/// Logical held-state of ctrl/shift/alt across requests.
///
/// Only [`Key::Modifier`] keys change the state; every other key passes
/// through [`apply`](Self::apply) untouched.
#[derive(Debug, Clone, Default)]
pub struct ModifierTracker {
    held: ModifierFlags,
}

impl ModifierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `key` was pressed or released on the target.
    ///
    /// Call this only after the OS injector confirmed the event.
    pub fn apply(&mut self, key: &Key, is_pressed: bool) {
        if let Some(m) = key.modifier() {
            if is_pressed {
                self.held.insert(m);
            } else {
                self.held.remove(m);
            }
        }
    }

    /// The modifiers currently held.
    pub fn current_flags(&self) -> ModifierFlags {
        self.held
    }

    pub fn is_held(&self, m: Modifier) -> bool {
        self.held.contains(m)
    }

    /// Modifiers that `requested` asks for but are not currently held.
    pub fn missing(&self, requested: ModifierFlags) -> ModifierFlags {
        requested.difference(self.held)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
