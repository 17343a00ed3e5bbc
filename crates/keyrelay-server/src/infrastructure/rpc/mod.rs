//! WebSocket JSON-RPC transport.
//!
//! - **`messages`** – request/reply frame shapes and frame decoding.
//! - **`ws_server`** – accept loop and per-connection sessions.

pub mod messages;
pub mod ws_server;

pub use ws_server::{bind, run_server, serve};
