//! Request dispatcher: the RPC operations, mapped onto normalize → submit.
//!
//! Each input operation validates its request, hands the event to the
//! pipeline and suspends until the pipeline reports the outcome.  The outcome
//! is rendered as a [`Response`]: success with an empty reason, or failure
//! with a non-empty, human-readable reason.
//!
//! `test` is answered directly.  It never touches the pipeline, so it stays
//! responsive while the queue is full.

use std::sync::Arc;

use keyrelay_core::{Empty, KeyRequest, MouseRequest, Normalizer, Response, WireRequest};
use tracing::{debug, warn};

use crate::application::pipeline::{InjectError, Outcome, Pipeline};

/// Entry point for every RPC operation.
pub struct Dispatcher {
    normalizer: Normalizer,
    pipeline: Arc<Pipeline>,
}

impl Dispatcher {
    pub fn new(normalizer: Normalizer, pipeline: Arc<Pipeline>) -> Self {
        Self {
            normalizer,
            pipeline,
        }
    }

    /// Presses and releases `key` as one indivisible unit.
    pub async fn keystroke(&self, request: KeyRequest) -> Response {
        self.dispatch(WireRequest::Keystroke(request)).await
    }

    /// Presses `key` and leaves it held.
    pub async fn key_down(&self, request: KeyRequest) -> Response {
        self.dispatch(WireRequest::KeyDown(request)).await
    }

    /// Releases `key`.
    pub async fn key_up(&self, request: KeyRequest) -> Response {
        self.dispatch(WireRequest::KeyUp(request)).await
    }

    /// Moves the pointer to absolute coordinates.
    pub async fn mouse_mv(&self, request: MouseRequest) -> Response {
        self.dispatch(WireRequest::MouseMv(request)).await
    }

    /// Liveness probe.  Has no side effects.
    pub fn test(&self, _request: Empty) -> Empty {
        debug!("liveness probe");
        Empty {}
    }

    /// Validates, queues and awaits one input request.
    pub async fn dispatch(&self, request: WireRequest) -> Response {
        let operation = request.operation();
        let outcome = match self.normalizer.normalize(&request) {
            Ok(event) => self.pipeline.submit(event).await,
            Err(err) => Err(InjectError::from(err)),
        };

        match &outcome {
            Ok(()) => debug!("{operation} {} ok", describe(&request)),
            Err(err) => warn!("{operation} {} failed: {err}", describe(&request)),
        }
        render(outcome)
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

/// Turns a pipeline outcome into the wire response.
pub fn render(outcome: Outcome) -> Response {
    match outcome {
        Ok(()) => Response::ok(),
        Err(err) => Response::fail(err.to_string()),
    }
}

fn describe(request: &WireRequest) -> String {
    match request {
        WireRequest::Keystroke(r) | WireRequest::KeyDown(r) | WireRequest::KeyUp(r) => {
            format!("{:?} [{}]", r.key, r.flags())
        }
        WireRequest::MouseMv(r) => format!("({}, {})", r.x_pos, r.y_pos),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
