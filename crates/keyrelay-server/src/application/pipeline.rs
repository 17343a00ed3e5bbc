//! The injection pipeline: one writer, one bounded FIFO queue.
//!
//! Every OS-visible effect goes through [`Pipeline::submit`].  Submissions are
//! queued in acceptance order and drained by a single dedicated writer thread
//! that calls the [`InputInjector`] synchronously, one step at a time.  Two
//! events are therefore never in flight together, and the OS observes them in
//! exactly the order they were accepted, whichever caller sent them.
//!
//! ```text
//! caller A ─┐                         ┌──────────────── writer thread ────────────────┐
//! caller B ─┼─▶ bounded mpsc queue ──▶│ reconcile(event, tracker) → steps → injector │
//! caller C ─┘      (FIFO)             └──────── outcome ─▶ oneshot ─▶ caller ────────┘
//! ```
//!
//! # Composite events
//!
//! A keystroke is queued as one job.  The writer expands it into its steps
//! (synthesized modifier presses, key down, key up, modifier releases) and
//! runs them back to back, so no other job can interleave.  If a step fails,
//! the remaining steps are skipped, except that keys this job already pressed
//! and would have released are released again (best effort).  In particular a
//! failed key-down is never followed by its key-up.
//!
//! # Back-pressure
//!
//! The queue is bounded.  When it is full a submission either waits for room
//! ([`QueuePolicy::Block`]) or fails immediately with
//! [`InjectError::Backpressure`] ([`QueuePolicy::Reject`]).
//!
//! # Cancellation
//!
//! Once a job is in the queue it runs to completion, even if the caller stops
//! waiting.  Physical input cannot be taken back once delivered.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use keyrelay_core::{
    reconcile, InputEvent, Key, ModifierFlags, ModifierTracker, PointerPosition, Step,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::application::inject::{InjectorError, InputInjector};

/// Default number of jobs the queue holds before back-pressure applies.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Failure text used when the backend reports an error without a message.
const UNEXPLAINED_OS_FAILURE: &str = "input injection failed";

/// Why a request did not succeed.
///
/// The `Display` text becomes the wire `reason_for_fail`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    /// Malformed request, rejected before it reached the queue.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The queue is full.  Transient: the client may retry.
    #[error("injection queue is full, retry later")]
    Backpressure,

    /// The OS refused or failed to deliver the event.  Passed through verbatim.
    #[error("{0}")]
    Os(String),

    /// The request would press a key that is already logically held.
    #[error("key {0} is already held; release it first")]
    AlreadyHeld(Key),

    /// The pipeline has been shut down.
    #[error("injection pipeline is shut down")]
    PipelineClosed,
}

impl From<InjectorError> for InjectError {
    fn from(err: InjectorError) -> Self {
        let reason = err.to_string();
        if reason.trim().is_empty() {
            InjectError::Os(UNEXPLAINED_OS_FAILURE.to_string())
        } else {
            InjectError::Os(reason)
        }
    }
}

/// Result of one submission.  Produced exactly once per accepted job.
pub type Outcome = Result<(), InjectError>;

/// Behaviour of [`Pipeline::submit`] when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Suspend the caller until there is room.
    #[default]
    Block,
    /// Fail immediately with [`InjectError::Backpressure`].
    Reject,
}

impl FromStr for QueuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(QueuePolicy::Block),
            "reject" => Ok(QueuePolicy::Reject),
            other => Err(format!("unknown queue policy '{other}' (expected 'block' or 'reject')")),
        }
    }
}

impl fmt::Display for QueuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueuePolicy::Block => "block",
            QueuePolicy::Reject => "reject",
        })
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Jobs the queue holds before back-pressure applies.  Zero is treated as one.
    pub queue_capacity: usize,
    pub queue_policy: QueuePolicy,
    /// Release every key still logically held when the pipeline shuts down.
    pub release_held_on_shutdown: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_policy: QueuePolicy::default(),
            release_held_on_shutdown: true,
        }
    }
}

/// Server-owned input state: the modifier tracker and the last pointer position.
///
/// Written only by the pipeline writer, readable by anyone holding the `Arc`.
#[derive(Debug, Default)]
pub struct InputState {
    modifiers: Mutex<ModifierTracker>,
    pointer: Mutex<Option<PointerPosition>>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The modifiers the server believes are held.
    pub fn current_flags(&self) -> ModifierFlags {
        self.tracker().current_flags()
    }

    /// The last pointer position the OS accepted, if any.
    pub fn last_pointer(&self) -> Option<PointerPosition> {
        *lock(&self.pointer)
    }

    fn tracker(&self) -> MutexGuard<'_, ModifierTracker> {
        lock(&self.modifiers)
    }

    fn record_pointer(&self, pos: PointerPosition) -> Option<PointerPosition> {
        lock(&self.pointer).replace(pos)
    }
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Jobs taken into the queue.
    pub accepted: u64,
    /// Jobs whose every step succeeded.
    pub succeeded: u64,
    /// Jobs that failed in the writer (OS error or already-held key).
    pub failed: u64,
    /// Submissions refused because the queue was full.
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// One unit of work: the event and the handle its outcome is delivered on.
struct InjectionRequest {
    event: InputEvent,
    reply: oneshot::Sender<Outcome>,
}

/// Handle to the single-writer injection queue.
///
/// Share it behind an `Arc`; [`submit`](Self::submit) takes `&self`.
pub struct Pipeline {
    sender: Mutex<Option<mpsc::Sender<InjectionRequest>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    policy: QueuePolicy,
    state: Arc<InputState>,
    counters: Arc<Counters>,
}

impl Pipeline {
    /// Spawns the writer thread and returns the handle.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the OS refuses to spawn the writer thread.
    pub fn start(
        config: PipelineConfig,
        injector: Arc<dyn InputInjector>,
        state: Arc<InputState>,
    ) -> std::io::Result<Self> {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let counters = Arc::new(Counters::default());

        let writer = Writer {
            injector,
            state: Arc::clone(&state),
            held: HashSet::new(),
            counters: Arc::clone(&counters),
            release_held_on_shutdown: config.release_held_on_shutdown,
        };
        let handle = std::thread::Builder::new()
            .name("keyrelay-injector".to_string())
            .spawn(move || writer.run(receiver))?;

        info!(
            "injection pipeline started (capacity {capacity}, policy {})",
            config.queue_policy
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            writer: Mutex::new(Some(handle)),
            policy: config.queue_policy,
            state,
            counters,
        })
    }

    /// Queues `event` and waits for the writer to report its outcome.
    ///
    /// Under [`QueuePolicy::Block`] this suspends while the queue is full.
    /// The caller suspends again until the OS injector has confirmed or
    /// rejected every step of the event.
    pub async fn submit(&self, event: InputEvent) -> Outcome {
        let sender = lock(&self.sender)
            .as_ref()
            .cloned()
            .ok_or(InjectError::PipelineClosed)?;

        let (reply, outcome) = oneshot::channel();
        let request = InjectionRequest { event, reply };

        match self.policy {
            QueuePolicy::Block => sender
                .send(request)
                .await
                .map_err(|_| InjectError::PipelineClosed)?,
            QueuePolicy::Reject => match sender.try_send(request) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(InjectError::Backpressure);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    return Err(InjectError::PipelineClosed);
                }
            },
        }
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);

        // A dropped reply means the writer is gone.
        outcome.await.unwrap_or(Err(InjectError::PipelineClosed))
    }

    /// The shared input state the writer maintains.
    pub fn state(&self) -> &Arc<InputState> {
        &self.state
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Stops accepting submissions and waits for the writer to finish.
    ///
    /// Jobs already accepted still run.  Blocks the calling thread; from async
    /// code call it through `spawn_blocking`.  Calling it twice is a no-op.
    pub fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let handle = lock(&self.writer).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("injection writer thread panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// State owned by the writer thread.
struct Writer {
    injector: Arc<dyn InputInjector>,
    state: Arc<InputState>,
    /// Non-modifier keys currently held via `key_down`.
    held: HashSet<Key>,
    counters: Arc<Counters>,
    release_held_on_shutdown: bool,
}

impl Writer {
    fn run(mut self, mut receiver: mpsc::Receiver<InjectionRequest>) {
        while let Some(request) = receiver.blocking_recv() {
            let kind = request.event.kind();
            let outcome = self.execute(&request.event);

            match &outcome {
                Ok(()) => {
                    self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!("{kind} delivered");
                }
                Err(err) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    debug!("{kind} not delivered: {err}");
                }
            }

            if request.reply.send(outcome).is_err() {
                debug!("{kind} finished after its caller stopped waiting");
            }
        }

        if self.release_held_on_shutdown {
            self.release_all();
        }
        info!("injection writer stopped");
    }

    fn execute(&mut self, event: &InputEvent) -> Outcome {
        self.ensure_not_held(event)?;

        let steps = reconcile(event, &self.state.tracker());

        // Keys pressed by this job whose release has not run yet.
        let mut pressed: Vec<Key> = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            if let Err(err) = self.perform(step) {
                self.compensate(&steps[index + 1..], pressed);
                return Err(err.into());
            }
            match step {
                Step::KeyDown { key, .. } => pressed.push(key.clone()),
                Step::KeyUp { key, .. } => pressed.retain(|k| k != key),
                Step::MouseMove(_) => {}
            }
        }
        Ok(())
    }

    fn ensure_not_held(&self, event: &InputEvent) -> Outcome {
        let Some(key) = event.pressed_key() else {
            return Ok(());
        };
        let held = match key.modifier() {
            Some(m) => self.state.tracker().is_held(m),
            None => self.held.contains(key),
        };
        if held {
            Err(InjectError::AlreadyHeld(key.clone()))
        } else {
            Ok(())
        }
    }

    /// Runs one step and, on success, updates the bookkeeping.
    fn perform(&mut self, step: &Step) -> Result<(), InjectorError> {
        match step {
            Step::KeyDown { key, flags } => {
                self.injector.key_down(key, *flags)?;
                self.record_key(key, true);
            }
            Step::KeyUp { key, flags } => {
                self.injector.key_up(key, *flags)?;
                self.record_key(key, false);
            }
            Step::MouseMove(pos) => {
                self.injector.mouse_move(pos.x, pos.y)?;
                match self.state.record_pointer(*pos) {
                    Some(previous) => debug!("pointer {previous} -> {pos}"),
                    None => debug!("pointer -> {pos}"),
                }
            }
        }
        Ok(())
    }

    fn record_key(&mut self, key: &Key, pressed: bool) {
        if key.is_modifier() {
            self.state.tracker().apply(key, pressed);
        } else if pressed {
            self.held.insert(key.clone());
        } else {
            self.held.remove(key);
        }
    }

    /// Releases, newest first, the keys this job pressed whose release was
    /// still among the skipped steps.
    fn compensate(&mut self, skipped: &[Step], pressed: Vec<Key>) {
        for key in pressed.into_iter().rev() {
            if !skipped.iter().any(|s| s.released_key() == Some(&key)) {
                continue;
            }
            let release = Step::KeyUp {
                flags: self.flags_without(&key),
                key: key.clone(),
            };
            match self.perform(&release) {
                Ok(()) => debug!("released {key} after a failed step"),
                Err(err) => warn!("could not release {key} after a failed step: {err}"),
            }
        }
    }

    /// Releases every key still logically held.  Runs once, at shutdown.
    fn release_all(&mut self) {
        let mut keys: Vec<Key> = self.held.drain().collect();
        keys.extend(self.state.current_flags().iter().rev().map(Key::Modifier));

        for key in keys {
            let release = Step::KeyUp {
                flags: self.flags_without(&key),
                key: key.clone(),
            };
            match self.perform(&release) {
                Ok(()) => info!("released held {key} on shutdown"),
                Err(err) => warn!("could not release held {key} on shutdown: {err}"),
            }
        }
    }

    fn flags_without(&self, key: &Key) -> ModifierFlags {
        let mut flags = self.state.current_flags();
        if let Some(m) = key.modifier() {
            flags.remove(m);
        }
        flags
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
