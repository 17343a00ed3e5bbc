//! Ordering and exclusivity of the injection pipeline under concurrent callers.
//!
//! These tests drive the real `Pipeline` and `Dispatcher` with the recording
//! `MockInjector` and inspect the exact sequence of OS calls.

use std::sync::Arc;
use std::time::Duration;

use keyrelay_core::{
    InputEvent, Key, KeyRequest, ModifierFlags, Normalizer, PointerPosition, Step,
};
use keyrelay_server::application::dispatch::Dispatcher;
use keyrelay_server::application::pipeline::{InputState, Pipeline, PipelineConfig};
use keyrelay_server::infrastructure::injector::mock::MockInjector;

fn pipeline_with(mock: &Arc<MockInjector>) -> Arc<Pipeline> {
    Arc::new(
        Pipeline::start(
            PipelineConfig::default(),
            mock.clone(),
            Arc::new(InputState::new()),
        )
        .unwrap(),
    )
}

fn ctrl() -> Key {
    Key::parse("ctrl").unwrap()
}

fn shift() -> Key {
    Key::parse("shift").unwrap()
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_never_overlap_or_interleave() {
    // Arrange: slow injector to widen any race window
    let mock = Arc::new(MockInjector::new().with_latency(Duration::from_micros(200)));
    let pipeline = pipeline_with(&mock);
    const CALLERS: u32 = 8;
    const ROUNDS: u32 = 10;

    // Act: every caller alternates a keystroke of its own key and a mouse move
    let mut handles = Vec::new();
    for caller in 0..CALLERS {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let key = Key::Char(char::from(b'a' + caller as u8));
            for round in 0..ROUNDS {
                pipeline
                    .submit(InputEvent::KeyStroke {
                        key: key.clone(),
                        flags: ModifierFlags::empty(),
                    })
                    .await
                    .unwrap();
                pipeline
                    .submit(InputEvent::MouseMove(PointerPosition::new(caller, round)))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Assert: one call at a time
    assert_eq!(mock.max_in_flight(), 1);

    // Assert: every key-down is immediately followed by its own key-up
    let delivered = mock.delivered();
    assert_eq!(delivered.len(), (CALLERS * ROUNDS * 3) as usize);
    for (i, step) in delivered.iter().enumerate() {
        if let Step::KeyDown { key, .. } = step {
            assert_eq!(
                delivered[i + 1].released_key(),
                Some(key),
                "keystroke of {key} was interleaved"
            );
        }
    }

    // Assert: each caller's own requests reached the OS in submission order
    for caller in 0..CALLERS {
        let rounds: Vec<u32> = delivered
            .iter()
            .filter_map(|s| match s {
                Step::MouseMove(pos) if pos.x == caller => Some(pos.y),
                _ => None,
            })
            .collect();
        assert_eq!(rounds, (0..ROUNDS).collect::<Vec<_>>());
    }

    let stats = pipeline.stats();
    assert_eq!(stats.accepted, u64::from(CALLERS * ROUNDS * 2));
    assert_eq!(stats.succeeded, stats.accepted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_concurrent_modified_keystrokes_do_not_interleave() {
    // Arrange
    let mock = Arc::new(MockInjector::new().with_latency(Duration::from_millis(1)));
    let dispatcher = Arc::new(Dispatcher::new(Normalizer::default(), pipeline_with(&mock)));

    // Act
    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.keystroke(KeyRequest::new("a").with_ctrl()).await })
    };
    let second = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.keystroke(KeyRequest::new("b").with_shift()).await })
    };
    assert!(first.await.unwrap().success);
    assert!(second.await.unwrap().success);

    // Assert: one whole unit, then the other
    let keys: Vec<(bool, Key)> = mock
        .delivered()
        .into_iter()
        .map(|s| match s {
            Step::KeyDown { key, .. } => (true, key),
            Step::KeyUp { key, .. } => (false, key),
            Step::MouseMove(_) => unreachable!("no pointer requests were sent"),
        })
        .collect();
    let ctrl_a = vec![
        (true, ctrl()),
        (true, Key::Char('a')),
        (false, Key::Char('a')),
        (false, ctrl()),
    ];
    let shift_b = vec![
        (true, shift()),
        (true, Key::Char('b')),
        (false, Key::Char('b')),
        (false, shift()),
    ];
    let a_then_b: Vec<_> = ctrl_a.iter().chain(shift_b.iter()).cloned().collect();
    let b_then_a: Vec<_> = shift_b.iter().chain(ctrl_a.iter()).cloned().collect();
    assert!(
        keys == a_then_b || keys == b_then_a,
        "keystrokes interleaved: {keys:?}"
    );
    assert!(dispatcher.pipeline().state().current_flags().is_empty());
}

// ── Modifier scenarios through the dispatcher ─────────────────────────────────

#[tokio::test]
async fn test_explicit_ctrl_c_sequence() {
    // Arrange
    let mock = Arc::new(MockInjector::new());
    let dispatcher = Dispatcher::new(Normalizer::default(), pipeline_with(&mock));

    // Act
    let responses = vec![
        dispatcher.key_down(KeyRequest::new("ctrl")).await,
        dispatcher.key_down(KeyRequest::new("c")).await,
        dispatcher.key_up(KeyRequest::new("c")).await,
        dispatcher.key_up(KeyRequest::new("ctrl")).await,
    ];

    // Assert: four successes, delivered in order, ctrl active for 'c'
    assert!(responses.iter().all(|r| r.success && r.reason_for_fail.is_empty()));
    let with_ctrl = ModifierFlags::from_bools(true, false, false);
    assert_eq!(
        mock.delivered(),
        vec![
            Step::KeyDown {
                key: ctrl(),
                flags: with_ctrl
            },
            Step::KeyDown {
                key: Key::Char('c'),
                flags: with_ctrl
            },
            Step::KeyUp {
                key: Key::Char('c'),
                flags: with_ctrl
            },
            Step::KeyUp {
                key: ctrl(),
                flags: ModifierFlags::empty()
            },
        ]
    );
    assert!(dispatcher.pipeline().state().current_flags().is_empty());
}

#[tokio::test]
async fn test_ctrl_tracker_round_trip() {
    let mock = Arc::new(MockInjector::new());
    let dispatcher = Dispatcher::new(Normalizer::default(), pipeline_with(&mock));
    let state = Arc::clone(dispatcher.pipeline().state());

    dispatcher.key_down(KeyRequest::new("ctrl")).await;
    assert!(state.current_flags().ctrl());

    dispatcher.key_up(KeyRequest::new("ctrl")).await;
    assert!(!state.current_flags().ctrl());
}

#[tokio::test]
async fn test_keystroke_down_failure_delivers_nothing_for_that_key() {
    // Arrange
    let mock = Arc::new(MockInjector::new());
    mock.fail_key_down(Key::Char('z'));
    let dispatcher = Dispatcher::new(Normalizer::default(), pipeline_with(&mock));

    // Act
    let response = dispatcher.keystroke(KeyRequest::new("z")).await;

    // Assert: the up-half was never even attempted
    assert!(!response.success);
    assert!(!response.reason_for_fail.is_empty());
    assert_eq!(mock.attempts().len(), 1);
    assert!(mock.delivered().is_empty());
}

#[tokio::test]
async fn test_failed_request_does_not_poison_later_ones() {
    let mock = Arc::new(MockInjector::new());
    let dispatcher = Dispatcher::new(Normalizer::default(), pipeline_with(&mock));

    mock.set_should_fail(true);
    assert!(!dispatcher.keystroke(KeyRequest::new("a")).await.success);
    mock.set_should_fail(false);

    assert!(dispatcher.keystroke(KeyRequest::new("a")).await.success);
}
