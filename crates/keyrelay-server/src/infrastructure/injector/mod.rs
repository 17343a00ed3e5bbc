//! `InputInjector` backends.
//!
//! The backend is chosen at startup from configuration:
//!
//! | Backend | Availability          | Effect                                  |
//! |---------|-----------------------|-----------------------------------------|
//! | `log`   | always                | logs each step, injects nothing         |
//! | `enigo` | cargo feature `enigo` | real keyboard/mouse injection on the host |
//!
//! [`mock::MockInjector`] is a recording backend for tests and is never
//! selected by configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::inject::{InjectorError, InputInjector};

#[cfg(feature = "enigo")]
pub mod enigo_injector;
pub mod log;
pub mod mock;

/// Which injector backend the server uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Log,
    Enigo,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(BackendKind::Log),
            "enigo" => Ok(BackendKind::Enigo),
            other => Err(format!(
                "unknown injector backend '{other}' (expected 'log' or 'enigo')"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Log => "log",
            BackendKind::Enigo => "enigo",
        })
    }
}

/// Builds the injector for `kind`.
///
/// # Errors
///
/// Returns [`InjectorError::Unavailable`] when `enigo` is requested but the
/// binary was built without the `enigo` feature, or when the OS connection
/// cannot be opened.
pub fn build_injector(kind: BackendKind) -> Result<Arc<dyn InputInjector>, InjectorError> {
    match kind {
        BackendKind::Log => Ok(Arc::new(log::LogInjector::new())),
        #[cfg(feature = "enigo")]
        BackendKind::Enigo => Ok(Arc::new(enigo_injector::EnigoInjector::new()?)),
        #[cfg(not(feature = "enigo"))]
        BackendKind::Enigo => Err(InjectorError::Unavailable(
            "this build does not include the 'enigo' feature".to_string(),
        )),
    }
}
