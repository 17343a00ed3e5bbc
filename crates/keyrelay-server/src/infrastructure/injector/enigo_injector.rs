//! Real OS injection through the `enigo` crate.
//!
//! `enigo` talks to the platform input API (SendInput on Windows, CGEvent on
//! macOS, XTest or libei on Linux).  Each [`Step`](keyrelay_core::Step) maps to
//! one `enigo` call:
//!
//! | Step        | enigo call                                 |
//! |-------------|--------------------------------------------|
//! | key down    | `Keyboard::key(key, Direction::Press)`     |
//! | key up      | `Keyboard::key(key, Direction::Release)`   |
//! | mouse move  | `Mouse::move_mouse(x, y, Coordinate::Abs)` |
//!
//! Modifier keys arrive as their own steps, so the `flags` argument is not
//! needed here.
//!
//! # Thread affinity
//!
//! The handle is kept behind a `Mutex`.  Only the pipeline writer thread ever
//! calls into it.

use std::sync::{Mutex, PoisonError};

use enigo::{Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use keyrelay_core::{Key, Modifier, ModifierFlags, NamedKey};
use tracing::info;

use crate::application::inject::{InjectorError, InputInjector};

pub struct EnigoInjector {
    enigo: Mutex<Enigo>,
}

impl EnigoInjector {
    /// Opens the connection to the platform input API.
    ///
    /// # Errors
    ///
    /// Returns [`InjectorError::Unavailable`] if the connection fails (no
    /// display, missing permissions).
    pub fn new() -> Result<Self, InjectorError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InjectorError::Unavailable(e.to_string()))?;
        info!("enigo injector ready");
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn key(&self, key: &Key, direction: Direction) -> Result<(), InjectorError> {
        let mapped = map_key(key)?;
        self.enigo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .key(mapped, direction)
            .map_err(|e| InjectorError::Os(e.to_string()))
    }
}

impl InputInjector for EnigoInjector {
    fn key_down(&self, key: &Key, _flags: ModifierFlags) -> Result<(), InjectorError> {
        self.key(key, Direction::Press)
    }

    fn key_up(&self, key: &Key, _flags: ModifierFlags) -> Result<(), InjectorError> {
        self.key(key, Direction::Release)
    }

    fn mouse_move(&self, x: u32, y: u32) -> Result<(), InjectorError> {
        let x = i32::try_from(x).map_err(|_| InjectorError::Os(format!("x={x} out of range")))?;
        let y = i32::try_from(y).map_err(|_| InjectorError::Os(format!("y={y} out of range")))?;
        self.enigo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| InjectorError::Os(e.to_string()))
    }
}

/// Translates a canonical key into the `enigo` key.
fn map_key(key: &Key) -> Result<enigo::Key, InjectorError> {
    use enigo::Key as E;

    let mapped = match key {
        Key::Modifier(Modifier::Ctrl) => E::Control,
        Key::Modifier(Modifier::Shift) => E::Shift,
        Key::Modifier(Modifier::Alt) => E::Alt,
        Key::Char(c) => E::Unicode(*c),
        Key::Named(named) => match named {
            NamedKey::Enter => E::Return,
            NamedKey::Tab => E::Tab,
            NamedKey::Escape => E::Escape,
            NamedKey::Backspace => E::Backspace,
            NamedKey::Delete => E::Delete,
            NamedKey::Space => E::Space,
            NamedKey::ArrowUp => E::UpArrow,
            NamedKey::ArrowDown => E::DownArrow,
            NamedKey::ArrowLeft => E::LeftArrow,
            NamedKey::ArrowRight => E::RightArrow,
            NamedKey::Home => E::Home,
            NamedKey::End => E::End,
            NamedKey::PageUp => E::PageUp,
            NamedKey::PageDown => E::PageDown,
            NamedKey::CapsLock => E::CapsLock,
            NamedKey::Meta => E::Meta,
            NamedKey::F1 => E::F1,
            NamedKey::F2 => E::F2,
            NamedKey::F3 => E::F3,
            NamedKey::F4 => E::F4,
            NamedKey::F5 => E::F5,
            NamedKey::F6 => E::F6,
            NamedKey::F7 => E::F7,
            NamedKey::F8 => E::F8,
            NamedKey::F9 => E::F9,
            NamedKey::F10 => E::F10,
            NamedKey::F11 => E::F11,
            NamedKey::F12 => E::F12,
            // Not available on every platform enigo supports.
            NamedKey::Insert => return Err(InjectorError::UnsupportedKey(key.clone())),
        },
        Key::Raw(_) => return Err(InjectorError::UnsupportedKey(key.clone())),
    };
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_key_covers_modifiers_and_chars() {
        assert!(matches!(
            map_key(&Key::Modifier(Modifier::Ctrl)),
            Ok(enigo::Key::Control)
        ));
        assert!(matches!(
            map_key(&Key::Char('x')),
            Ok(enigo::Key::Unicode('x'))
        ));
    }

    #[test]
    fn test_map_key_rejects_raw_names() {
        let raw = Key::Raw("hyper".to_string());
        assert_eq!(map_key(&raw), Err(InjectorError::UnsupportedKey(raw)));
    }
}
