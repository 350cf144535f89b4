//! Unit tests for the per-turn state machine and result aggregation.

use serde_json::json;

use adom_sdk::exec::spawner::ThreadDirective;
use adom_sdk::orchestrator::turn::{TurnState, TurnTracker};
use adom_sdk::{SdkError, ThreadEvent, ThreadItem};

fn ev(value: serde_json::Value) -> ThreadEvent {
    ThreadEvent::from_value(value).expect("test event must decode")
}

fn message(kind: &str, id: &str, text: &str) -> ThreadEvent {
    ev(json!({"type": kind, "item": {"id": id, "type": "agent_message", "text": text}}))
}

fn completed(input: u64, output: u64) -> ThreadEvent {
    ev(json!({
        "type": "turn.completed",
        "usage": {"input_tokens": input, "cached_input_tokens": 0, "output_tokens": output}
    }))
}

fn thread_started(id: &str) -> ThreadEvent {
    ev(json!({"type": "thread.started", "thread_id": id}))
}

fn feed(tracker: &mut TurnTracker, events: &[ThreadEvent]) {
    for event in events {
        tracker.observe(event).expect("event must be accepted");
    }
}

#[test]
fn successful_turn_aggregates_items_and_usage() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            ev(json!({"type": "thread.started", "thread_id": "th_1"})),
            ev(json!({"type": "turn.started"})),
            ev(json!({"type": "item.started", "item": {
                "id": "item_0", "type": "command_execution", "command": "ls", "status": "in_progress"
            }})),
            ev(json!({"type": "item.completed", "item": {
                "id": "item_0", "type": "command_execution", "command": "ls",
                "aggregated_output": "Cargo.toml\n", "exit_code": 0, "status": "completed"
            }})),
            message("item.completed", "item_1", "first"),
            message("item.completed", "item_2", "second"),
            completed(12, 5),
        ],
    );

    assert_eq!(tracker.state(), TurnState::Completed);
    let result = tracker.finish().expect("turn must succeed");

    assert_eq!(result.thread_id.as_deref(), Some("th_1"));
    assert_eq!(result.final_response, "second");
    assert_eq!(result.items.len(), 3);
    assert_eq!(result.usage.input_tokens, 12);
    assert_eq!(result.usage.output_tokens, 5);
    let ThreadItem::CommandExecution(cmd) = &result.items[0] else {
        panic!("first item must be the command");
    };
    assert_eq!(cmd.exit_code, Some(0));
}

#[test]
fn updates_replace_item_in_first_seen_position() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            message("item.started", "a", "draft"),
            message("item.started", "b", "other"),
            message("item.updated", "a", "revised"),
            message("item.completed", "a", "final"),
            completed(1, 1),
        ],
    );

    let result = tracker.finish().expect("turn must succeed");
    let ids: Vec<&str> = result.items.iter().map(ThreadItem::id).collect();

    assert_eq!(ids, ["a", "b"]);
    assert_eq!(result.final_response, "final");
}

#[test]
fn turn_without_agent_message_has_empty_response() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            completed(0, 0),
        ],
    );

    let result = tracker.finish().expect("turn must succeed");

    assert!(result.final_response.is_empty());
    assert!(result.items.is_empty());
}

#[test]
fn structured_response_parses_as_json() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            message("item.completed", "m", r#"{"summary":"all good","status":"ok"}"#),
            completed(1, 1),
        ],
    );

    let result = tracker.finish().expect("turn must succeed");
    let parsed: serde_json::Value = result.parse_response().expect("json response");

    assert_eq!(parsed["status"], "ok");
}

#[test]
fn item_before_turn_started_is_out_of_order() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);

    let err = tracker
        .observe(&message("item.started", "a", "x"))
        .expect_err("must be rejected");

    assert!(
        matches!(&err, SdkError::Decode(msg) if msg.contains("out-of-order")),
        "unexpected error: {err}"
    );
}

#[test]
fn update_for_unknown_item_is_out_of_order() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[thread_started("th_1"), ev(json!({"type": "turn.started"}))],
    );

    let err = tracker
        .observe(&message("item.updated", "ghost", "x"))
        .expect_err("must be rejected");

    assert!(matches!(err, SdkError::Decode(_)));
}

#[test]
fn update_after_completion_is_out_of_order() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            message("item.completed", "a", "done"),
        ],
    );

    assert!(tracker.observe(&message("item.updated", "a", "late")).is_err());
}

#[test]
fn event_after_terminal_is_out_of_order() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            completed(1, 1),
        ],
    );

    let err = tracker
        .observe(&ev(json!({"type": "turn.started"})))
        .expect_err("must be rejected");

    assert!(matches!(err, SdkError::Decode(_)));
}

#[test]
fn repeated_turn_started_is_out_of_order() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[thread_started("th_1"), ev(json!({"type": "turn.started"}))],
    );

    assert!(tracker.observe(&ev(json!({"type": "turn.started"}))).is_err());
}

#[test]
fn unknown_events_are_ignored() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            ev(json!({"type": "session.heartbeat"})),
            completed(1, 1),
        ],
    );

    assert!(tracker.finish().is_ok());
}

#[test]
fn turn_failed_maps_to_turn_failed() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            ev(json!({"type": "turn.failed", "error": {"message": "model refused"}})),
        ],
    );

    match tracker.finish() {
        Err(SdkError::TurnFailed(msg)) => assert_eq!(msg, "model refused"),
        other => panic!("expected TurnFailed, got {other:?}"),
    }
}

#[test]
fn error_on_resume_before_start_is_thread_not_found() {
    let mut tracker = TurnTracker::new(&ThreadDirective::Resume("th_old".into()));
    feed(
        &mut tracker,
        &[ev(json!({"type": "error", "message": "no rollout found for thread id th_old"}))],
    );

    match tracker.finish() {
        Err(SdkError::ThreadNotFound { thread_id, message }) => {
            assert_eq!(thread_id, "th_old");
            assert!(message.contains("no rollout"));
        }
        other => panic!("expected ThreadNotFound, got {other:?}"),
    }
}

#[test]
fn error_after_start_is_thread_runtime() {
    let mut tracker = TurnTracker::new(&ThreadDirective::Resume("th_old".into()));
    feed(
        &mut tracker,
        &[
            thread_started("th_1"),
            ev(json!({"type": "turn.started"})),
            ev(json!({"type": "error", "message": "stream disconnected"})),
        ],
    );

    assert!(matches!(tracker.finish(), Err(SdkError::ThreadRuntime(_))));
}

#[test]
fn error_on_new_thread_is_thread_runtime() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(&mut tracker, &[ev(json!({"type": "error", "message": "bad api key"}))]);

    assert!(matches!(tracker.finish(), Err(SdkError::ThreadRuntime(_))));
}

#[test]
fn unfinished_turn_is_thread_runtime() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);
    feed(
        &mut tracker,
        &[thread_started("th_1"), ev(json!({"type": "turn.started"}))],
    );

    assert!(matches!(tracker.finish(), Err(SdkError::ThreadRuntime(_))));
}

#[test]
fn resumed_tracker_knows_thread_id_up_front() {
    let tracker = TurnTracker::new(&ThreadDirective::Resume("th_9".into()));

    assert_eq!(tracker.thread_id(), Some("th_9"));
    assert_eq!(tracker.state(), TurnState::Sent);
}

#[test]
fn turn_started_on_new_thread_requires_thread_started() {
    let mut tracker = TurnTracker::new(&ThreadDirective::New);

    let err = tracker
        .observe(&ev(json!({"type": "turn.started"})))
        .expect_err("new thread must announce its id first");

    assert!(
        matches!(&err, SdkError::Decode(msg) if msg.contains("before thread.started")),
        "unexpected error: {err}"
    );
    assert_eq!(tracker.state(), TurnState::Sent);
}

#[test]
fn resumed_turn_may_start_without_thread_started() {
    let mut tracker = TurnTracker::new(&ThreadDirective::Resume("th_9".into()));
    feed(&mut tracker, &[ev(json!({"type": "turn.started"})), completed(1, 1)]);

    let result = tracker.finish().expect("turn must succeed");

    assert_eq!(result.thread_id.as_deref(), Some("th_9"));
}
