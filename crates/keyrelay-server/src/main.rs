//! keyrelay server: entry point.
//!
//! Accepts keyboard and mouse requests over WebSocket and replays them on this
//! host through a single ordered injection writer.
//!
//! # Usage
//!
//! ```text
//! keyrelay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>            TOML config file
//!   --bind <ADDR>              WebSocket listen address [default from config: 127.0.0.1:24810]
//!   --queue-capacity <N>       Injection queue size
//!   --queue-policy <POLICY>    block | reject
//!   --backend <BACKEND>        log | enigo
//!   --log-level <FILTER>       tracing filter used when RUST_LOG is unset
//! ```
//!
//! Every option can also be set through the matching `KEYRELAY_*` environment
//! variable.  Command-line values override the config file, which overrides
//! the built-in defaults.
//!
//! # Environment variables
//!
//! | Variable                  | Option             |
//! |---------------------------|--------------------|
//! | `KEYRELAY_CONFIG`         | `--config`         |
//! | `KEYRELAY_BIND`           | `--bind`           |
//! | `KEYRELAY_QUEUE_CAPACITY` | `--queue-capacity` |
//! | `KEYRELAY_QUEUE_POLICY`   | `--queue-policy`   |
//! | `KEYRELAY_BACKEND`        | `--backend`        |
//! | `KEYRELAY_LOG_LEVEL`      | `--log-level`      |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use keyrelay_core::Normalizer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keyrelay_server::application::dispatch::Dispatcher;
use keyrelay_server::application::pipeline::{InputState, Pipeline, QueuePolicy};
use keyrelay_server::infrastructure::config::{load_config, ServerConfig};
use keyrelay_server::infrastructure::injector::{build_injector, BackendKind};
use keyrelay_server::infrastructure::rpc::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote keyboard and mouse injection server.
#[derive(Debug, Parser)]
#[command(
    name = "keyrelay-server",
    about = "Replays remote keyboard and mouse requests on this host, in order",
    version
)]
struct Cli {
    /// TOML configuration file.  Defaults apply when omitted.
    #[arg(long, env = "KEYRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address the WebSocket listener binds to.
    #[arg(long, env = "KEYRELAY_BIND")]
    bind: Option<String>,

    /// Jobs the injection queue holds before back-pressure applies.
    #[arg(long, env = "KEYRELAY_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// What a submission does when the queue is full: `block` or `reject`.
    #[arg(long, env = "KEYRELAY_QUEUE_POLICY")]
    queue_policy: Option<QueuePolicy>,

    /// Injector backend: `log` (dry run) or `enigo`.
    #[arg(long, env = "KEYRELAY_BACKEND")]
    backend: Option<BackendKind>,

    /// Log filter used when `RUST_LOG` is not set (e.g. `debug`).
    #[arg(long, env = "KEYRELAY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file, if any, and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the named config file cannot be read or parsed, or
    /// if the combined settings are invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to build default config".to_string(),
        })?;

        if let Some(bind) = self.bind {
            config.server.bind_addr = bind;
        }
        if let Some(capacity) = self.queue_capacity {
            config.pipeline.queue_capacity = capacity;
        }
        if let Some(policy) = self.queue_policy {
            config.pipeline.queue_policy = policy;
        }
        if let Some(backend) = self.backend {
            config.injector.backend = backend;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }

        config.validate().context("invalid settings")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_server_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!(
        "keyrelay server starting: bind={}, backend={}, queue={} ({})",
        config.server.bind_addr,
        config.injector.backend,
        config.pipeline.queue_capacity,
        config.pipeline.queue_policy
    );

    // ── Wiring ────────────────────────────────────────────────────────────────
    let injector = build_injector(config.injector.backend)
        .with_context(|| format!("failed to start '{}' injector", config.injector.backend))?;
    let state = Arc::new(InputState::new());
    let pipeline = Arc::new(
        Pipeline::start(config.pipeline_config(), injector, state)
            .context("failed to start injection pipeline")?,
    );
    let dispatcher = Arc::new(Dispatcher::new(
        Normalizer::new(config.coordinate_policy()),
        Arc::clone(&pipeline),
    ));

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Serve ─────────────────────────────────────────────────────────────────
    let served = run_server(&config.server.bind_addr, dispatcher, running).await;

    // Drain the queue and release held keys even if the listener failed.
    let draining = Arc::clone(&pipeline);
    tokio::task::spawn_blocking(move || draining.shutdown())
        .await
        .context("pipeline shutdown task failed")?;
    let stats = pipeline.stats();
    info!(
        "keyrelay server stopped: {} accepted, {} succeeded, {} failed, {} rejected",
        stats.accepted, stats.succeeded, stats.failed, stats.rejected
    );

    served
}

// ── Tests ─────────────────────────────────────────────────────────────────────
