//! TOML configuration for the server.
//!
//! Every key is optional; missing keys take the defaults shown here:
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:24810"
//! log_level = "info"
//!
//! [pipeline]
//! queue_capacity = 64
//! queue_policy = "block"            # or "reject"
//! release_held_on_shutdown = true
//!
//! [pointer]
//! policy = "pass_through"           # or "clamp" / "reject"
//! width = 1920
//! height = 1080
//!
//! [injector]
//! backend = "log"                   # or "enigo"
//! ```
//!
//! `width` and `height` only matter for the `clamp` and `reject` pointer
//! policies; `pass_through` hands coordinates to the OS unchanged.

use std::path::{Path, PathBuf};

use keyrelay_core::CoordinatePolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::pipeline::{PipelineConfig, QueuePolicy, DEFAULT_QUEUE_CAPACITY};
use crate::infrastructure::injector::BackendKind;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parsed but do not make sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub pointer: PointerSection,
    #[serde(default)]
    pub injector: InjectorSection,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Address the WebSocket listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Injection queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSection {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub queue_policy: QueuePolicy,
    #[serde(default = "default_true")]
    pub release_held_on_shutdown: bool,
}

/// How `mouse_mv` coordinates are checked against the screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPolicy {
    #[default]
    PassThrough,
    Clamp,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointerSection {
    #[serde(default)]
    pub policy: PointerPolicy,
    /// Screen width in pixels.
    #[serde(default = "default_screen_width")]
    pub width: u32,
    /// Screen height in pixels.
    #[serde(default = "default_screen_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InjectorSection {
    #[serde(default)]
    pub backend: BackendKind,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_addr() -> String {
    "127.0.0.1:24810".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_true() -> bool {
    true
}
fn default_screen_width() -> u32 {
    1920
}
fn default_screen_height() -> u32 {
    1080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            queue_policy: QueuePolicy::default(),
            release_held_on_shutdown: default_true(),
        }
    }
}

impl Default for PointerSection {
    fn default() -> Self {
        Self {
            policy: PointerPolicy::default(),
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

// ── Derived settings ──────────────────────────────────────────────────────────

impl ServerConfig {
    /// Checks values serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero queue capacity or a zero
    /// screen dimension under a bounded pointer policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.pointer.policy != PointerPolicy::PassThrough
            && (self.pointer.width == 0 || self.pointer.height == 0)
        {
            return Err(ConfigError::Invalid(
                "pointer.width and pointer.height must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue_capacity: self.pipeline.queue_capacity,
            queue_policy: self.pipeline.queue_policy,
            release_held_on_shutdown: self.pipeline.release_held_on_shutdown,
        }
    }

    pub fn coordinate_policy(&self) -> CoordinatePolicy {
        let PointerSection {
            policy,
            width,
            height,
        } = self.pointer;
        match policy {
            PointerPolicy::PassThrough => CoordinatePolicy::PassThrough,
            PointerPolicy::Clamp => CoordinatePolicy::Clamp { width, height },
            PointerPolicy::Reject => CoordinatePolicy::Reject { width, height },
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML or unknown enum values,
/// and [`ConfigError::Invalid`] when validation fails.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `path`, or returns the defaults when `path` is
/// `None`.
///
/// A path that was named explicitly must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, plus the errors
/// of [`parse_config`].
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_values() {
        // Arrange / Act
        let cfg = ServerConfig::default();

        // Assert
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:24810");
        assert_eq!(cfg.server.log_level, "info");
        assert_eq!(cfg.pipeline.queue_capacity, 64);
        assert_eq!(cfg.pipeline.queue_policy, QueuePolicy::Block);
        assert!(cfg.pipeline.release_held_on_shutdown);
        assert_eq!(cfg.injector.backend, BackendKind::Log);
        assert_eq!(cfg.coordinate_policy(), CoordinatePolicy::PassThrough);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_load_without_path_yields_defaults() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        // Arrange
        let toml = r#"
            [pipeline]
            queue_policy = "reject"

            [pointer]
            policy = "clamp"
            width = 2560
        "#;

        // Act
        let cfg = parse_config(toml).unwrap();

        // Assert
        assert_eq!(cfg.pipeline.queue_policy, QueuePolicy::Reject);
        assert_eq!(cfg.pipeline.queue_capacity, 64);
        assert_eq!(
            cfg.coordinate_policy(),
            CoordinatePolicy::Clamp {
                width: 2560,
                height: 1080
            }
        );
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:24810");
    }

    #[test]
    fn test_pipeline_config_carries_section_values() {
        let cfg = parse_config(
            "[pipeline]\nqueue_capacity = 8\nrelease_held_on_shutdown = false\n",
        )
        .unwrap();

        let pipeline = cfg.pipeline_config();

        assert_eq!(pipeline.queue_capacity, 8);
        assert!(!pipeline.release_held_on_shutdown);
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let result = parse_config("[injector]\nbackend = \"xtest\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_queue_capacity_is_invalid() {
        let result = parse_config("[pipeline]\nqueue_capacity = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_screen_size_is_invalid_under_reject() {
        let result = parse_config("[pointer]\npolicy = \"reject\"\nheight = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_named_file_is_io_error() {
        let path = std::env::temp_dir().join("keyrelay-config-that-does-not-exist.toml");
        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_config_from_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!(
            "keyrelay-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[server]\nbind_addr = \"0.0.0.0:9000\"\n").unwrap();

        // Act
        let cfg = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);

        // Assert
        assert_eq!(cfg.unwrap().server.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut cfg = ServerConfig::default();
        cfg.pointer.policy = PointerPolicy::Reject;
        cfg.injector.backend = BackendKind::Enigo;

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored = parse_config(&text).expect("deserialize");

        assert_eq!(cfg, restored);
    }
}
