//! Recording injector for tests.
//!
//! `MockInjector` performs no OS calls.  Every call is appended to an
//! in-memory log so tests can assert exactly what the OS would have seen and
//! in what order.  Two logs are kept:
//!
//! - **attempts** – every call the writer made, successful or not.
//! - **delivered** – only the calls that succeeded.
//!
//! Failures are scripted per key and per direction, or globally with
//! [`MockInjector::set_should_fail`].
//!
//! # Concurrency probe
//!
//! The mock counts calls in flight and remembers the maximum.  With the
//! single-writer pipeline in front of it, [`MockInjector::max_in_flight`] must
//! never exceed 1, however many callers submit at once.
//!
//! # Gating
//!
//! [`MockInjector::gated`] returns a mock that parks inside every call until
//! the test hands out a permit through the returned [`InjectorGate`].  This
//! holds the writer in place so queue-full and ordering behaviour can be
//! observed deterministically.
//!
//! ```ignore
//! let (mock, gate) = MockInjector::gated();
//! let pipeline = Pipeline::start(config, Arc::new(mock), state)?;
//! // ... submit, then:
//! gate.release(3);
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use keyrelay_core::{Key, ModifierFlags, PointerPosition, Step};

use crate::application::inject::{InjectorError, InputInjector};

/// An injector that records calls instead of performing them.
#[derive(Default)]
pub struct MockInjector {
    attempts: Mutex<Vec<Step>>,
    delivered: Mutex<Vec<Step>>,
    fail_down: Mutex<HashSet<Key>>,
    fail_up: Mutex<HashSet<Key>>,
    should_fail: AtomicBool,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Gate>,
}

struct Gate {
    entered: Mutex<mpsc::Sender<()>>,
    permits: Mutex<mpsc::Receiver<()>>,
}

/// Test-side handle of a gated [`MockInjector`].
pub struct InjectorGate {
    entered: mpsc::Receiver<()>,
    permits: mpsc::Sender<()>,
}

impl InjectorGate {
    /// Lets `n` more calls through.
    pub fn release(&self, n: usize) {
        for _ in 0..n {
            let _ = self.permits.send(());
        }
    }

    /// Waits until a call has entered the injector.  Returns `false` on timeout.
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }
}

impl MockInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose calls each wait for a permit from the returned gate.
    ///
    /// Dropping the gate lets every pending and future call through.
    pub fn gated() -> (Self, InjectorGate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (permits_tx, permits_rx) = mpsc::channel();
        let mock = Self {
            gate: Some(Gate {
                entered: Mutex::new(entered_tx),
                permits: Mutex::new(permits_rx),
            }),
            ..Self::default()
        };
        let gate = InjectorGate {
            entered: entered_rx,
            permits: permits_tx,
        };
        (mock, gate)
    }

    /// Makes every call sleep for `latency`, to widen race windows.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every key-down of `key` fail.
    pub fn fail_key_down(&self, key: Key) {
        self.fail_down.lock().unwrap().insert(key);
    }

    /// Makes every key-up of `key` fail.
    pub fn fail_key_up(&self, key: Key) {
        self.fail_up.lock().unwrap().insert(key);
    }

    /// Makes every call fail while set.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Every call made, in order, including failed ones.
    pub fn attempts(&self) -> Vec<Step> {
        self.attempts.lock().unwrap().clone()
    }

    /// Every call that succeeded, in order.
    pub fn delivered(&self) -> Vec<Step> {
        self.delivered.lock().unwrap().clone()
    }

    /// The most calls that were ever inside the injector at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, step: Step, fails: bool) -> Result<(), InjectorError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _ = gate.entered.lock().unwrap().send(());
            let _ = gate.permits.lock().unwrap().recv();
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        self.attempts.lock().unwrap().push(step.clone());
        let result = if fails || self.should_fail.load(Ordering::SeqCst) {
            Err(InjectorError::Os(format!("mock failure: {step}")))
        } else {
            self.delivered.lock().unwrap().push(step);
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl InputInjector for MockInjector {
    fn key_down(&self, key: &Key, flags: ModifierFlags) -> Result<(), InjectorError> {
        let fails = self.fail_down.lock().unwrap().contains(key);
        self.record(
            Step::KeyDown {
                key: key.clone(),
                flags,
            },
            fails,
        )
    }

    fn key_up(&self, key: &Key, flags: ModifierFlags) -> Result<(), InjectorError> {
        let fails = self.fail_up.lock().unwrap().contains(key);
        self.record(
            Step::KeyUp {
                key: key.clone(),
                flags,
            },
            fails,
        )
    }

    fn mouse_move(&self, x: u32, y: u32) -> Result<(), InjectorError> {
        self.record(Step::MouseMove(PointerPosition::new(x, y)), false)
    }
}
