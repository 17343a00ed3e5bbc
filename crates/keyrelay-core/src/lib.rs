//! # keyrelay-core
//!
//! Domain layer of the keyrelay input-injection server.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or network
//! sockets.  It defines:
//!
//! - **`keys`** – Canonical key identifiers parsed from the free-form key
//!   strings that clients send (`"a"`, `"Enter"`, `"ctrl"`, `"page-up"`, …).
//!
//! - **`modifiers`** – [`ModifierFlags`] and the [`ModifierTracker`], the
//!   server's own bookkeeping of which of ctrl/shift/alt are logically held.
//!
//! - **`event`** – The internal [`InputEvent`] produced per request and the
//!   concrete [`Step`]s that are handed to the OS injector one at a time.
//!
//! - **`normalize`** – Request validation and canonicalization
//!   ([`Normalizer`]) plus [`reconcile`], which expands an event into steps
//!   against the current modifier state.
//!
//! - **`wire`** – The request/response shapes of the RPC surface.
//!
//! ```text
//! wire request ──normalize──▶ InputEvent ──reconcile(tracker)──▶ [Step, Step, …]
//! ```

pub mod event;
pub mod keys;
pub mod modifiers;
pub mod normalize;
pub mod wire;

pub use event::{InputEvent, PointerPosition, Step};
pub use keys::{Key, NamedKey};
pub use modifiers::{Modifier, ModifierFlags, ModifierTracker};
pub use normalize::{reconcile, CoordinatePolicy, Normalizer, ValidationError};
pub use wire::{Empty, KeyRequest, MouseRequest, Response, WireRequest};
