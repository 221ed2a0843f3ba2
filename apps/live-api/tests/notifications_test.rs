mod common;

use axum::http::header::{AUTHORIZATION, CACHE_CONTROL};
use axum::http::StatusCode;
use axum_test::TestServer;
use bazaar_common::wire::{
    BadgePayload, MessagePayload, NotificationPayload, NotificationsResponse, TypingPayload,
    UnreadCounts,
};
use bazaar_common::EventPayload;
use serde_json::json;

use live_api::gateway::events::Event;

fn message(id: &str, scope: &str) -> EventPayload {
    EventPayload::Message(MessagePayload {
        message_id: id.into(),
        chat_scope_id: scope.into(),
        sender_id: "usr_sender".into(),
        sender_name: "Sender".into(),
        preview: "new message".into(),
        link: None,
    })
}

fn review(entity: &str) -> EventPayload {
    EventPayload::Review(NotificationPayload {
        title: "New review".into(),
        message: "You received 5 stars".into(),
        link: Some("/profile/reviews".into()),
        entity_id: Some(entity.into()),
    })
}

async fn unread(server: &TestServer, token: &str) -> UnreadCounts {
    server
        .get("/api/v1/unread-counts")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .json()
}

#[tokio::test]
async fn unread_counts_require_auth() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    server
        .get("/api/v1/unread-counts")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/notifications")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unread_counts_are_never_cached() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let token = common::issue_token(&state, &common::new_user_id()).await;

    let resp = server
        .get("/api/v1/unread-counts")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.header(CACHE_CONTROL), "no-store");
    let counts: UnreadCounts = resp.json();
    assert_eq!(counts, UnreadCounts::default());
}

#[tokio::test]
async fn emitted_events_converge_into_unread_counts() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::new_user_id();
    let token = common::issue_token(&state, &user).await;

    // The user is offline: every live push is missed.
    state.notifier.emit(Event::new(message("m1", "task:1"), [user.as_str()])).await;
    state.notifier.emit(Event::new(message("m2", "task:1"), [user.as_str()])).await;
    state.notifier.emit(Event::new(message("m3", "task:2"), [user.as_str()])).await;
    state.notifier.emit(Event::new(review("rev_1"), [user.as_str()])).await;
    state
        .notifier
        .emit(Event::new(
            EventPayload::Badge(BadgePayload {
                badge_id: "first_review".into(),
                name: "First review".into(),
                icon: "star".into(),
                description: "Received a first review".into(),
            }),
            [user.as_str()],
        ))
        .await;
    // Ephemeral: never counted.
    state
        .notifier
        .emit(Event::new(
            EventPayload::Typing(TypingPayload {
                chat_scope_id: "task:1".into(),
                user_id: "usr_sender".into(),
                is_typing: true,
            }),
            [user.as_str()],
        ))
        .await;

    let counts = unread(&server, &token).await;
    assert_eq!(counts.messages, 3);
    assert_eq!(counts.notifications, 2);
    assert_eq!(counts.chats.get("task:1"), Some(&2));
    assert_eq!(counts.chats.get("task:2"), Some(&1));
    assert_eq!(counts.total(), 5);
}

#[tokio::test]
async fn re_emitting_the_same_entity_is_counted_once() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::new_user_id();
    let token = common::issue_token(&state, &user).await;

    for _ in 0..3 {
        state.notifier.emit(Event::new(review("rev_9"), [user.as_str()])).await;
    }

    assert_eq!(unread(&server, &token).await.notifications, 1);
}

#[tokio::test]
async fn recent_notifications_are_newest_first_and_limited() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::new_user_id();
    let token = common::issue_token(&state, &user).await;

    for i in 0..5 {
        state
            .notifier
            .emit(Event::new(review(&format!("rev_{i}")), [user.as_str()]))
            .await;
    }

    let body: NotificationsResponse = server
        .get("/api/v1/notifications")
        .add_query_param("limit", 2)
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .json();
    assert_eq!(body.notifications.len(), 2);
    assert_eq!(body.notifications[0].event_id, "review:rev_4");
    assert_eq!(body.notifications[1].event_id, "review:rev_3");
    assert_eq!(body.notifications[0].kind, "review");
    assert!(!body.notifications[0].read);

    // Out-of-range limits are clamped rather than rejected.
    let body: NotificationsResponse = server
        .get("/api/v1/notifications")
        .add_query_param("limit", 0)
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .json();
    assert_eq!(body.notifications.len(), 1);
}

#[tokio::test]
async fn mark_read_by_chat_scope_leaves_other_counts() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::new_user_id();
    let token = common::issue_token(&state, &user).await;

    state.notifier.emit(Event::new(message("m1", "task:1"), [user.as_str()])).await;
    state.notifier.emit(Event::new(message("m2", "task:2"), [user.as_str()])).await;
    state.notifier.emit(Event::new(review("rev_1"), [user.as_str()])).await;

    server
        .put("/api/v1/notifications/read")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({ "chat_scope_id": "task:1" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let counts = unread(&server, &token).await;
    assert_eq!(counts.messages, 1);
    assert_eq!(counts.chats.get("task:1"), None);
    assert_eq!(counts.notifications, 1);

    server
        .put("/api/v1/notifications/read")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let counts = unread(&server, &token).await;
    assert_eq!(counts.messages, 1);
    assert_eq!(counts.notifications, 0);
}
