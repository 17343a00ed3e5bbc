//! Helpers shared by the application-layer unit tests.

use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use keyrelay_core::{InputEvent, Key, ModifierFlags};
use tokio_test::task::Spawn;

use crate::infrastructure::injector::mock::{InjectorGate, MockInjector};

pub(crate) fn key(name: &str) -> Key {
    Key::parse(name).expect("test key must parse")
}

pub(crate) fn key_down(name: &str) -> InputEvent {
    InputEvent::KeyDown {
        key: key(name),
        flags: ModifierFlags::empty(),
    }
}

pub(crate) fn keystroke(name: &str, flags: ModifierFlags) -> InputEvent {
    InputEvent::KeyStroke {
        key: key(name),
        flags,
    }
}

/// A gated mock plus the handle that lets its calls through.
pub(crate) struct Gated {
    pub injector: Arc<MockInjector>,
    gate: InjectorGate,
}

impl Gated {
    pub fn release(&self, n: usize) {
        self.gate.release(n);
    }

    pub fn wait_entered(&self, timeout: Duration) {
        assert!(
            self.gate.wait_entered(timeout),
            "writer never entered the injector"
        );
    }
}

pub(crate) fn gated() -> Gated {
    let (mock, gate) = MockInjector::gated();
    Gated {
        injector: Arc::new(mock),
        gate,
    }
}

/// Polls a spawned test future until it completes, failing after five seconds.
pub(crate) async fn finish<F: Future>(task: &mut Spawn<F>) -> F::Output {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Poll::Ready(output) = task.poll() {
            return output;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "future did not complete in time"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
