mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use bazaar_common::wire::{BadgePayload, MessagePayload, PollResponse};
use bazaar_common::EventPayload;
use chrono::{Duration, SecondsFormat, Utc};

use live_api::gateway::events::Event;

fn message(id: &str) -> EventPayload {
    EventPayload::Message(MessagePayload {
        message_id: id.into(),
        chat_scope_id: "task:42".into(),
        sender_id: "usr_sender".into(),
        sender_name: "Sender".into(),
        preview: "still there?".into(),
        link: None,
    })
}

#[tokio::test]
async fn poll_requires_auth() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    server
        .get("/api/v1/poll")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn poll_without_since_returns_buffered_events_oldest_first() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::new_user_id();
    let token = common::issue_token(&state, &user).await;

    // Nobody is connected; events still land in the buffer.
    state.publisher.publish(&Event::new(message("m1"), [user.as_str()]));
    state.publisher.publish(&Event::new(message("m2"), [user.as_str()]));

    let resp = server
        .get("/api/v1/poll")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status_ok();
    let body: PollResponse = resp.json();
    let ids: Vec<_> = body.events.iter().filter_map(|f| f.event_id.as_deref()).collect();
    assert_eq!(ids, vec!["message:m1", "message:m2"]);
}

#[tokio::test]
async fn poll_since_is_strictly_after() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::new_user_id();
    let token = common::issue_token(&state, &user).await;

    let t0 = Utc::now() - Duration::seconds(30);
    for (i, id) in ["m1", "m2", "m3"].iter().enumerate() {
        let at = t0 + Duration::seconds(i as i64 * 10);
        state.publisher.publish(&Event::at(message(id), [user.as_str()], at));
    }

    let since = (t0 + Duration::seconds(10)).to_rfc3339_opts(SecondsFormat::Millis, true);
    let resp = server
        .get("/api/v1/poll")
        .add_query_param("since", &since)
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status_ok();
    let body: PollResponse = resp.json();
    assert_eq!(body.events.len(), 1);
    assert_eq!(body.events[0].event_id.as_deref(), Some("message:m3"));
}

#[tokio::test]
async fn poll_only_returns_the_callers_events() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let alice = common::new_user_id();
    let bob = common::new_user_id();
    let bob_token = common::issue_token(&state, &bob).await;

    state.publisher.publish(&Event::new(message("m1"), [alice.as_str()]));

    let body: PollResponse = server
        .get("/api/v1/poll")
        .add_header(AUTHORIZATION, format!("Bearer {bob_token}"))
        .await
        .json();
    assert!(body.events.is_empty());
}

#[tokio::test]
async fn poll_rejects_malformed_since() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let token = common::issue_token(&state, &common::new_user_id()).await;

    let resp = server
        .get("/api/v1/poll")
        .add_query_param("since", "yesterday")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn poll_and_stream_carry_the_same_event_id() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::new_user_id();
    let token = common::issue_token(&state, &user).await;

    let event = Event::new(
        EventPayload::Badge(BadgePayload {
            badge_id: "first_task_completed".into(),
            name: "First task".into(),
            icon: "trophy".into(),
            description: "Completed a first task".into(),
        }),
        [user.as_str()],
    );
    state.publisher.publish(&event);

    let body: PollResponse = server
        .get("/api/v1/poll")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .json();
    assert_eq!(body.events.len(), 1);
    assert_eq!(body.events[0].event_id.as_deref(), event.event_id());
    assert_eq!(body.events[0].payload, event.frame.payload);
}
