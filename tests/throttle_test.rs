//! Progress cadence, single-flight and cleanup of the throttle context

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use proptest::prelude::*;
use tokio::time::Instant;

use tonview::app::Handled;
use tonview::core::{BotError, Button, ChatId, InlineAnswer, MessageId, TransportError};
use tonview::domain::NANO;
use tonview::infrastructure::telegram::Transport;
use tonview::modules::throttle::{
    Cadence, ThrottleContext, ThrottleGate, TokioClock, HOURGLASS, MAGNIFIER,
};
use tonview::ui::Keyboard;

use support::*;

const USER: i64 = 3;

fn gate() -> Arc<ThrottleGate> {
    Arc::new(ThrottleGate::new(Arc::new(TokioClock), Duration::from_secs(2)))
}

fn cadence(secs: u64) -> Cadence {
    Cadence {
        interval: Duration::from_secs(secs),
        initial_delay: Duration::ZERO,
        stop_grace: Duration::from_secs(secs + 2),
    }
}

#[tokio::test(start_paused = true)]
async fn test_progress_alternates_on_cadence() {
    let transport = RecordingTransport::new();
    let anchor = transport.send_message(USER, "Information", None).await.unwrap();
    let gate = gate();

    let throttled = ThrottleContext::new(gate.clone(), transport.clone(), USER, USER, Some(anchor))
        .cadence(cadence(3))
        .run(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(42)
        })
        .await
        .unwrap();

    assert_eq!(throttled.outcome, Ok(42));
    assert_eq!(throttled.anchor, Some(anchor));

    let frames = transport.progress_frames();
    let glyphs: Vec<&str> = frames.iter().map(|(_, g)| g.as_str()).collect();
    assert_eq!(glyphs, vec![HOURGLASS[0], HOURGLASS[1], HOURGLASS[0], HOURGLASS[1]]);
    for pair in frames.windows(2) {
        assert_eq!(pair[1].0 - pair[0].0, Duration::from_secs(3));
    }
    assert!(!gate.is_blocked(USER));
}

#[tokio::test(start_paused = true)]
async fn test_token_blocks_user_while_running() {
    let transport = RecordingTransport::new();
    let gate = gate();

    let throttled = ThrottleContext::new(gate.clone(), transport.clone(), USER, USER, None)
        .glyphs(MAGNIFIER)
        .run(async {
            let blocked = gate.is_blocked(USER);
            let other = gate.is_blocked(USER + 1);
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok((blocked, other))
        })
        .await
        .unwrap();

    assert_eq!(throttled.outcome, Ok((true, false)));
    assert!(!gate.is_blocked(USER));
    // no anchor: the first frame became the anchor
    let frames = transport.progress_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].1, MAGNIFIER[0]);
    assert!(throttled.anchor.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_second_context_fails_fast() {
    let transport = RecordingTransport::new();
    let gate = gate();

    let throttled = ThrottleContext::new(gate.clone(), transport.clone(), USER, USER, None)
        .run(async {
            let nested = ThrottleContext::new(gate.clone(), transport.clone(), USER, USER, None)
                .run(async { Ok(()) })
                .await;
            Ok(nested.err())
        })
        .await
        .unwrap();

    match throttled.outcome {
        Ok(Some(BotError::Fatal(reason))) => assert!(reason.contains("already active")),
        other => panic!("expected a fatal nested enter, got {other:?}"),
    }
    assert!(!gate.is_blocked(USER));
}

#[tokio::test(start_paused = true)]
async fn test_failed_body_releases_token() {
    let transport = RecordingTransport::new();
    let gate = gate();

    let throttled = ThrottleContext::new(gate.clone(), transport.clone(), USER, USER, None)
        .run(async { Err::<(), _>(BotError::Transient("timeout".into())) })
        .await
        .unwrap();

    assert_eq!(throttled.outcome, Err(BotError::Transient("timeout".into())));
    assert!(!gate.is_blocked(USER));
}

#[tokio::test(start_paused = true)]
async fn test_vanished_anchor_is_replaced_by_progress() {
    let transport = RecordingTransport::new();
    let gate = gate();

    let throttled = ThrottleContext::new(gate, transport.clone(), USER, USER, Some(999))
        .run(async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .await
        .unwrap();

    let anchor = throttled.anchor.unwrap();
    assert_ne!(anchor, 999);
    assert_eq!(transport.live_messages(), vec![anchor]);
}

/// Edits never complete
struct StuckTransport;

#[async_trait]
impl Transport for StuckTransport {
    async fn send_message(
        &self,
        _chat_id: ChatId,
        _text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        Ok(1)
    }

    async fn edit_message(
        &self,
        _chat_id: ChatId,
        message_id: MessageId,
        _text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(message_id)
    }

    async fn delete_message(&self, _chat_id: ChatId, _message_id: MessageId) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_document(
        &self,
        _chat_id: ChatId,
        _file_name: &str,
        _bytes: Vec<u8>,
        _caption: &str,
    ) -> Result<MessageId, TransportError> {
        Ok(2)
    }

    async fn answer_callback(&self, _callback_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        _query_id: &str,
        _answer: &InlineAnswer,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_stuck_progress_is_aborted_after_grace() {
    let gate = gate();
    let started = Instant::now();

    let throttled = ThrottleContext::new(gate.clone(), Arc::new(StuckTransport), USER, USER, Some(5))
        .cadence(cadence(3))
        .run(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await
        .unwrap();

    let elapsed = Instant::now() - started;
    assert_eq!(throttled.anchor, Some(5));
    assert_eq!(elapsed, Duration::from_secs(1 + 5));
    assert!(!gate.is_blocked(USER));
}

fn user_address(user: i64) -> String {
    format!("EQ{user:0>46}")
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Concurrent updates of one user never overlap two provider calls
    #[test]
    fn prop_one_slow_call_per_user(plan in prop::collection::vec((0i64..3, any::<bool>()), 1..12)) {
        runtime().block_on(async {
            let provider = FixtureProvider::new();
            for user in 0..3 {
                let mut account = wallet();
                account.address = user_address(user);
                let events = (0..5)
                    .map(|i| transfer(&format!("u{user}-{i}"), MARCH_1 - i, PEER, &account.address, NANO))
                    .collect();
                provider.add_account(account, events);
            }
            let h = Harness::new(provider);
            for user in 0..3 {
                h.text(user, &user_address(user)).await;
            }
            h.provider.set_latency(Duration::from_secs(2));

            let updates = plan.iter().map(|(user, history)| {
                let app = h.app.clone();
                let inbound = if *history {
                    tap(*user, Button::Events)
                } else {
                    tonview::core::Inbound {
                        user_id: *user,
                        chat_id: *user,
                        message_id: None,
                        callback_id: None,
                        event: tonview::core::Event::from_text(&user_address(*user)),
                    }
                };
                async move { (*user, app.handle(inbound).await) }
            });
            let results = join_all(updates).await;

            for user in 0..3 {
                assert!(h.provider.max_in_flight(&user_address(user)) <= 1);
                let admitted = results
                    .iter()
                    .filter(|(u, handled)| *u == user && *handled != Handled::Dropped)
                    .count();
                let sent = plan.iter().filter(|(u, _)| *u == user).count();
                assert_eq!(admitted, sent.min(1), "user {user}");
                assert!(!h.app.gate().is_blocked(user));
            }
        });
    }
}
