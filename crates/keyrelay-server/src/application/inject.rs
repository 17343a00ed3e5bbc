//! The OS input-injection capability.
//!
//! The pipeline writer is the only caller.  Implementations may therefore
//! assume calls never overlap, but must still be `Send + Sync` because the
//! injector is shared with the thread that owns the writer.

use keyrelay_core::{Key, ModifierFlags};
use thiserror::Error;

/// Error reported by an injector backend.
///
/// The `Display` text is surfaced verbatim to the client as `reason_for_fail`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectorError {
    #[error("{0}")]
    Os(String),
    #[error("unsupported key {0}")]
    UnsupportedKey(Key),
    #[error("injector not available: {0}")]
    Unavailable(String),
}

/// Platform-agnostic input injection.
///
/// `flags` is the modifier context the server believes is active for the
/// event.  Backends that inject raw key transitions may ignore it; the
/// modifier keys themselves arrive as separate steps.
#[cfg_attr(test, mockall::automock)]
pub trait InputInjector: Send + Sync {
    /// Injects a key press.
    fn key_down(&self, key: &Key, flags: ModifierFlags) -> Result<(), InjectorError>;

    /// Injects a key release.
    fn key_up(&self, key: &Key, flags: ModifierFlags) -> Result<(), InjectorError>;

    /// Moves the pointer to an absolute screen position.
    fn mouse_move(&self, x: u32, y: u32) -> Result<(), InjectorError>;
}
