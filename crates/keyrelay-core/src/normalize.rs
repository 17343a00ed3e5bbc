//! Request validation, canonicalization, and modifier reconciliation.
//!
//! Normalization happens in two phases:
//!
//! 1. [`Normalizer::normalize`] runs on the caller's task as soon as a request
//!    arrives.  It validates the request and turns it into a canonical
//!    [`InputEvent`].  It never looks at shared state, so a malformed request
//!    is rejected without waiting in the injection queue.
//!
//! 2. [`reconcile`] runs on the pipeline writer right before the event is
//!    injected.  It expands the event into concrete [`Step`]s against the
//!    modifier tracker *as it is at that moment*, which is the only point
//!    where the tracker is guaranteed to match what the OS has seen.
//!
//! # Keystroke expansion
//!
//! A keystroke of `c` with `is_ctrl = true` while nothing is held becomes:
//!
//! ```text
//! down ctrl   (synthesized)
//! down 'c'    [ctrl]
//! up   'c'    [ctrl]
//! up   ctrl   (synthesized release)
//! ```
//!
//! If ctrl is already held (an earlier `key_down("ctrl")`), only the middle
//! two steps are produced and ctrl stays held afterwards.

use thiserror::Error;
use tracing::debug;

use crate::event::{InputEvent, PointerPosition, Step};
use crate::keys::Key;
use crate::modifiers::{ModifierFlags, ModifierTracker};
use crate::wire::WireRequest;

/// A request rejected before it reaches the injection pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("key identifier must not be empty")]
    EmptyKey,

    #[error("pointer position ({x}, {y}) is outside the {width}x{height} screen")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// What to do with pointer coordinates outside the configured screen.
///
/// The wire schema declares no bound, so the default passes coordinates
/// through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinatePolicy {
    #[default]
    PassThrough,
    /// Clamp to `0..width` × `0..height`.
    Clamp { width: u32, height: u32 },
    /// Reject coordinates outside `0..width` × `0..height`.
    Reject { width: u32, height: u32 },
}

impl CoordinatePolicy {
    /// Applies the policy to a requested position.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfBounds`] under [`CoordinatePolicy::Reject`]
    /// when the position is off-screen.
    pub fn apply(&self, x: u32, y: u32) -> Result<PointerPosition, ValidationError> {
        match *self {
            CoordinatePolicy::PassThrough => Ok(PointerPosition::new(x, y)),
            CoordinatePolicy::Clamp { width, height } => {
                let clamped = PointerPosition::new(
                    x.min(width.saturating_sub(1)),
                    y.min(height.saturating_sub(1)),
                );
                if clamped.x != x || clamped.y != y {
                    debug!("clamped pointer ({x}, {y}) to {clamped}");
                }
                Ok(clamped)
            }
            CoordinatePolicy::Reject { width, height } => {
                if x >= width || y >= height {
                    Err(ValidationError::OutOfBounds {
                        x,
                        y,
                        width,
                        height,
                    })
                } else {
                    Ok(PointerPosition::new(x, y))
                }
            }
        }
    }
}

/// Validates wire requests and turns them into [`InputEvent`]s.
///
/// Stateless apart from its configuration, so one instance can serve every
/// caller concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    coordinate_policy: CoordinatePolicy,
}

impl Normalizer {
    pub fn new(coordinate_policy: CoordinatePolicy) -> Self {
        Self { coordinate_policy }
    }

    pub fn coordinate_policy(&self) -> CoordinatePolicy {
        self.coordinate_policy
    }

    /// Validates and canonicalizes one request.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyKey`] for a key operation with an empty key.
    /// - [`ValidationError::OutOfBounds`] for a rejected pointer position.
    pub fn normalize(&self, request: &WireRequest) -> Result<InputEvent, ValidationError> {
        let event = match request {
            WireRequest::Keystroke(req) => InputEvent::KeyStroke {
                key: parse_key(&req.key)?,
                flags: req.flags(),
            },
            WireRequest::KeyDown(req) => InputEvent::KeyDown {
                key: parse_key(&req.key)?,
                flags: req.flags(),
            },
            WireRequest::KeyUp(req) => InputEvent::KeyUp {
                key: parse_key(&req.key)?,
                flags: req.flags(),
            },
            WireRequest::MouseMv(req) => {
                InputEvent::MouseMove(self.coordinate_policy.apply(req.x_pos, req.y_pos)?)
            }
        };
        Ok(event)
    }
}

fn parse_key(ident: &str) -> Result<Key, ValidationError> {
    Key::parse(ident).ok_or(ValidationError::EmptyKey)
}

/// Expands `event` into the ordered OS steps to inject, given the current
/// modifier state.
///
/// Every key step carries the requested flags combined with the held set.
/// Only keystrokes synthesize modifier presses; those are always paired with a
/// release inside the same step list, so a keystroke never leaves a modifier
/// held that was not held before it.
pub fn reconcile(event: &InputEvent, tracker: &ModifierTracker) -> Vec<Step> {
    let held = tracker.current_flags();

    match event {
        InputEvent::KeyStroke { key, flags } => {
            let mut missing = tracker.missing(*flags);
            if let Some(own) = key.modifier() {
                // The stroke presses this modifier itself.
                missing.remove(own);
            }

            let mut steps = Vec::with_capacity(2 + 2 * missing.iter().count());
            let mut running = held;
            for m in missing.iter() {
                running.insert(m);
                steps.push(Step::KeyDown {
                    key: Key::Modifier(m),
                    flags: running,
                });
            }

            let mut effective = flags.union(running);
            if let Some(own) = key.modifier() {
                effective.insert(own);
            }
            steps.push(Step::KeyDown {
                key: key.clone(),
                flags: effective,
            });
            steps.push(Step::KeyUp {
                key: key.clone(),
                flags: effective,
            });

            for m in missing.iter().rev() {
                running.remove(m);
                steps.push(Step::KeyUp {
                    key: Key::Modifier(m),
                    flags: running,
                });
            }
            steps
        }
        InputEvent::KeyDown { key, flags } => {
            let mut effective = flags.union(held);
            if let Some(own) = key.modifier() {
                effective.insert(own);
            }
            vec![Step::KeyDown {
                key: key.clone(),
                flags: effective,
            }]
        }
        InputEvent::KeyUp { key, flags } => {
            let mut effective: ModifierFlags = flags.union(held);
            if let Some(own) = key.modifier() {
                effective.remove(own);
            }
            vec![Step::KeyUp {
                key: key.clone(),
                flags: effective,
            }]
        }
        InputEvent::MouseMove(pos) => vec![Step::MouseMove(*pos)],
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
