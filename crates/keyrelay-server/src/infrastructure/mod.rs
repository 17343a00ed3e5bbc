//! Infrastructure layer of the server.
//!
//! Contains the adapters around the application layer: OS injector backends,
//! the TOML configuration file, and the WebSocket RPC transport.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyrelay_core`, but MUST NOT be imported by the `application` layer
//! (test helpers excepted).
//!
//! # Sub-modules
//!
//! - **`injector`** – Implementations of `InputInjector`: a logging dry-run
//!   backend, a recording mock for tests, and the real `enigo` backend behind
//!   the `enigo` cargo feature.
//!
//! - **`config`** – `ServerConfig`, loaded from TOML with defaults for every
//!   missing key.
//!
//! - **`rpc`** – WebSocket server that decodes JSON request frames, forwards
//!   them to the `Dispatcher`, and writes JSON reply frames back.

pub mod config;
pub mod injector;
pub mod rpc;
