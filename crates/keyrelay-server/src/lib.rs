//! keyrelay-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the server do?
//!
//! Clients send keyboard and mouse requests (`keystroke`, `key_down`,
//! `key_up`, `mouse_mv`) over a request/response channel.  The server replays
//! them on the host as if they came from physical hardware:
//!
//! 1. The transport decodes a request frame and hands it to the
//!    [`Dispatcher`](application::dispatch::Dispatcher).
//! 2. The dispatcher validates it through the `keyrelay_core::Normalizer`.
//! 3. The resulting event is queued on the
//!    [`Pipeline`](application::pipeline::Pipeline), whose single writer
//!    thread injects events strictly in acceptance order.
//! 4. The outcome travels back as `Response { success, reason_for_fail }`.

/// Application layer: the injection pipeline and the request dispatcher.
pub mod application;

/// Infrastructure layer: OS injector backends, configuration, RPC transport.
pub mod infrastructure;
