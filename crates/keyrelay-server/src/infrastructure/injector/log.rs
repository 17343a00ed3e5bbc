//! Dry-run injector: logs every step and always succeeds.
//!
//! Useful on headless hosts and for checking what a client sends before
//! letting it drive a real desktop.

use std::sync::atomic::{AtomicU64, Ordering};

use keyrelay_core::{Key, ModifierFlags};
use tracing::info;

use crate::application::inject::{InjectorError, InputInjector};

#[derive(Debug, Default)]
pub struct LogInjector {
    steps: AtomicU64,
}

impl LogInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps logged so far.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    fn next(&self) -> u64 {
        self.steps.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl InputInjector for LogInjector {
    fn key_down(&self, key: &Key, flags: ModifierFlags) -> Result<(), InjectorError> {
        info!(step = self.next(), "key down {key} [{flags}]");
        Ok(())
    }

    fn key_up(&self, key: &Key, flags: ModifierFlags) -> Result<(), InjectorError> {
        info!(step = self.next(), "key up {key} [{flags}]");
        Ok(())
    }

    fn mouse_move(&self, x: u32, y: u32) -> Result<(), InjectorError> {
        info!(step = self.next(), "mouse move ({x}, {y})");
        Ok(())
    }
}
