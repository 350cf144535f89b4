//! Streamed turns: event order, cancellation, and one-turn-at-a-time.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde_json::json;
use serial_test::serial;

use super::test_helpers::{emit, FakeAgent};
use adom_sdk::{SdkError, ThreadEvent, ThreadOptions, TurnOptions};

fn slow_agent() -> FakeAgent {
    FakeAgent::new(&format!(
        "{}\nexec sleep 30",
        emit(&[
            json!({"type": "thread.started", "thread_id": "th_stream"}),
            json!({"type": "turn.started"}),
        ])
    ))
}

#[tokio::test]
#[serial]
async fn streamed_turn_yields_events_in_order() {
    let agent = FakeAgent::emitting(&[
        json!({"type": "thread.started", "thread_id": "th_s"}),
        json!({"type": "turn.started"}),
        json!({"type": "item.started", "item": {"id": "r", "type": "reasoning", "text": "thinking"}}),
        json!({"type": "item.updated", "item": {"id": "r", "type": "reasoning", "text": "thinking harder"}}),
        json!({"type": "item.completed", "item": {"id": "r", "type": "reasoning", "text": "done thinking"}}),
        json!({"type": "item.completed", "item": {"id": "m", "type": "agent_message", "text": "hi"}}),
        json!({"type": "turn.completed", "usage": {"input_tokens": 3, "output_tokens": 2}}),
    ]);
    let thread = agent.client().start_thread(ThreadOptions::default());

    let events: Vec<ThreadEvent> = thread
        .run_streamed("hello", TurnOptions::default())
        .await
        .expect("stream")
        .map(|event| event.expect("event"))
        .collect()
        .await;

    let kinds: Vec<&str> = events.iter().map(ThreadEvent::kind).collect();
    assert_eq!(
        kinds,
        [
            "thread.started",
            "turn.started",
            "item.started",
            "item.updated",
            "item.completed",
            "item.completed",
            "turn.completed",
        ]
    );
    assert_eq!(thread.id().as_deref(), Some("th_s"));
}

#[tokio::test]
#[serial]
async fn streamed_turn_forwards_turn_failed() {
    let agent = FakeAgent::emitting(&[
        json!({"type": "thread.started", "thread_id": "th_q"}),
        json!({"type": "turn.started"}),
        json!({"type": "turn.failed", "error": {"message": "quota exhausted"}}),
    ]);
    let mut stream = agent
        .client()
        .start_thread(ThreadOptions::default())
        .run_streamed("go", TurnOptions::default())
        .await
        .expect("stream");

    let mut last = None;
    while let Some(event) = stream.next_event().await {
        last = Some(event.expect("event"));
    }

    match last {
        Some(ThreadEvent::TurnFailed(ev)) => assert_eq!(ev.error.message, "quota exhausted"),
        other => panic!("expected turn.failed last, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn streamed_decode_error_ends_stream() {
    let agent = FakeAgent::new(&format!(
        "{}\necho '{{\"thread_id\":\"no type\"}}'\nexec sleep 30",
        emit(&[
            json!({"type": "thread.started", "thread_id": "th_d"}),
            json!({"type": "turn.started"}),
        ])
    ));
    let mut stream = agent
        .client()
        .start_thread(ThreadOptions::default())
        .run_streamed("go", TurnOptions::default())
        .await
        .expect("stream");

    assert!(matches!(
        stream.next_event().await,
        Some(Ok(ThreadEvent::ThreadStarted(_)))
    ));
    assert!(matches!(
        stream.next_event().await,
        Some(Ok(ThreadEvent::TurnStarted(_)))
    ));
    assert!(matches!(stream.next_event().await, Some(Err(SdkError::Decode(_)))));
    let end = tokio::time::timeout(Duration::from_secs(10), stream.next_event())
        .await
        .expect("stream must end after the error");
    assert!(end.is_none());
}

#[tokio::test]
#[serial]
async fn second_turn_while_streaming_is_rejected() {
    let agent = slow_agent();
    let thread = agent.client().start_thread(ThreadOptions::default());

    let mut stream = thread
        .run_streamed("long task", TurnOptions::default())
        .await
        .expect("stream");
    assert!(matches!(
        stream.next_event().await,
        Some(Ok(ThreadEvent::ThreadStarted(_)))
    ));

    let err = thread
        .clone()
        .run("impatient", TurnOptions::default())
        .await
        .expect_err("second turn must be rejected");
    assert!(matches!(err, SdkError::TurnInProgress(_)), "unexpected error: {err}");

    stream.cancel().await;
}

#[tokio::test]
#[serial]
async fn cancel_releases_the_thread() {
    let agent = slow_agent();
    let thread = agent.client().start_thread(ThreadOptions::default());

    let mut stream = thread
        .run_streamed("long task", TurnOptions::default())
        .await
        .expect("stream");
    stream.next_event().await.expect("first event").expect("ok");

    tokio::time::timeout(Duration::from_secs(10), stream.cancel())
        .await
        .expect("cancel must finish promptly");

    let next = thread
        .run_streamed("again", TurnOptions::default())
        .await
        .expect("thread must accept a new turn after cancel");
    assert_eq!(
        agent.args(),
        ["exec", "--experimental-json", "resume", "th_stream"]
    );
    next.cancel().await;
}

#[tokio::test]
#[serial]
async fn dropping_the_stream_releases_the_thread() {
    let agent = slow_agent();
    let thread = agent.client().start_thread(ThreadOptions::default());

    let mut stream = thread
        .run_streamed("long task", TurnOptions::default())
        .await
        .expect("stream");
    stream.next_event().await.expect("first event").expect("ok");
    drop(stream);

    let mut released = false;
    for _ in 0..50 {
        match thread.run_streamed("again", TurnOptions::default()).await {
            Ok(next) => {
                next.cancel().await;
                released = true;
                break;
            }
            Err(SdkError::TurnInProgress(_)) => {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(released, "dropped stream must release the turn lock");
}

#[tokio::test]
#[serial]
async fn streamed_timeout_is_reported_on_the_stream() {
    let agent = slow_agent();
    let mut stream = agent
        .client()
        .start_thread(ThreadOptions::default())
        .run_streamed(
            "long task",
            TurnOptions::default().with_timeout(Duration::from_millis(300)),
        )
        .await
        .expect("stream");

    let mut saw_timeout = false;
    while let Some(event) = stream.next_event().await {
        if let Err(err) = event {
            saw_timeout = matches!(err, SdkError::Timeout(_));
        }
    }

    assert!(saw_timeout, "stream must end with a timeout error");
}

#[tokio::test]
#[serial]
async fn terminal_event_is_delivered_before_the_agent_exits() {
    let agent = FakeAgent::new(&format!(
        "{}\nexec sleep 3",
        emit(&[
            json!({"type": "thread.started", "thread_id": "th_tail"}),
            json!({"type": "turn.started"}),
            json!({"type": "turn.completed", "usage": {"input_tokens": 1, "output_tokens": 1}}),
        ])
    ));
    let thread = agent.client().start_thread(ThreadOptions::default());
    let started = Instant::now();
    let mut stream = thread
        .run_streamed("go", TurnOptions::default())
        .await
        .expect("stream");

    let mut kinds = Vec::new();
    while let Some(event) = stream.next_event().await {
        let event = event.expect("event");
        kinds.push(event.kind().to_owned());
        if event.is_terminal() {
            break;
        }
    }

    assert_eq!(kinds, ["thread.started", "turn.started", "turn.completed"]);
    assert!(
        started.elapsed() < Duration::from_millis(1500),
        "terminal event held back for {:?}",
        started.elapsed()
    );
    let end = tokio::time::timeout(Duration::from_secs(10), stream.next_event())
        .await
        .expect("stream must end once the agent is released");
    assert!(end.is_none());
}
