//! Application layer of the server.
//!
//! - **`inject`** – The [`InputInjector`](inject::InputInjector) trait: the
//!   abstract OS capability.  Implementations live in the infrastructure
//!   layer and are injected at construction time.
//!
//! - **`pipeline`** – The single-writer injection queue.  Every OS-visible
//!   effect goes through it, in acceptance order.
//!
//! - **`dispatch`** – Maps the RPC operations onto normalize → submit and
//!   renders outcomes into wire responses.

pub mod dispatch;
pub mod inject;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;
