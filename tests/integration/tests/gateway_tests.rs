//! Gateway integration tests
//!
//! Each test spawns its own gateway on an ephemeral port with the in-memory
//! message store and talks to it over real WebSocket and HTTP connections.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use chat_gateway::protocol::ServerFrame;
use integration_tests::{assert_json, assert_status, test_config, unique_room, TestServer};
use reqwest::StatusCode;
use tokio_tungstenite::tungstenite::Message;

const QUIET: Duration = Duration::from_millis(200);

fn content(frame: &ServerFrame) -> Option<&str> {
    match frame {
        ServerFrame::Message { content, .. } => Some(content.as_str()),
        _ => None,
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/health").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_history_requires_token() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/messages/room/R1").await.unwrap();
    let body = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(body["error"]["code"], "MISSING_AUTH");
}

// ============================================================================
// Upgrade authorization
// ============================================================================

#[tokio::test]
async fn test_room_upgrade_without_token_rejected() {
    let server = TestServer::start().await.unwrap();
    let status = server.rejected_upgrade("/ws/R1").await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_room_upgrade_with_bad_token_rejected() {
    let server = TestServer::start().await.unwrap();
    let status = server.rejected_upgrade("/ws/R1?token=garbage").await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_upgrade_for_other_user_forbidden() {
    let server = TestServer::start().await.unwrap();
    let token = server.token("alice").unwrap();
    let status = server
        .rejected_upgrade(&format!("/ws/user/bob?token={token}"))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Room fan-out
// ============================================================================

#[tokio::test]
async fn test_room_fan_out_stays_in_room() {
    let server = TestServer::start().await.unwrap();
    let room = unique_room();
    let other_room = unique_room();

    let mut a = server.join_room(&room, "A").await.unwrap();
    let mut b = server.join_room(&room, "B").await.unwrap();
    let mut c = server.join_room(&other_room, "C").await.unwrap();

    a.send_text("hi").await.unwrap();

    let to_a = a.recv().await.unwrap();
    let to_b = b.recv().await.unwrap();
    assert_eq!(content(&to_a), Some("hi"));
    assert_eq!(to_a, to_b);
    match &to_b {
        ServerFrame::Message {
            room_id, sender_id, ..
        } => {
            assert_eq!(room_id.as_str(), room);
            assert_eq!(sender_id.as_str(), "A");
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    c.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_lines_arrive_in_order() {
    let server = TestServer::start().await.unwrap();
    let room = unique_room();

    let mut a = server.join_room(&room, "A").await.unwrap();
    let mut b = server.join_room(&room, "B").await.unwrap();

    for i in 0..20 {
        a.send_text(&format!("line {i}")).await.unwrap();
    }

    for i in 0..20 {
        let frame = b.recv().await.unwrap();
        assert_eq!(content(&frame), Some(format!("line {i}").as_str()));
    }
}

#[tokio::test]
async fn test_echo_can_be_excluded() {
    let config = test_config(&[("CHAT_ECHO_POLICY", "exclude")]).unwrap();
    let server = TestServer::start_with_config(config).await.unwrap();
    let room = unique_room();

    let mut a = server.join_room(&room, "A").await.unwrap();
    let mut b = server.join_room(&room, "B").await.unwrap();

    a.send_text("hi").await.unwrap();

    assert_eq!(content(&b.recv().await.unwrap()), Some("hi"));
    a.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_oversize_frame_closes_with_4002() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.join_room(&unique_room(), "A").await.unwrap();

    let config = test_config(&[]).unwrap();
    let len = config.realtime.max_frame_bytes + 1;
    a.send(Message::Binary(vec![0; len])).await.unwrap();

    let code = a.close_code().await.unwrap();
    assert_eq!(code, Some(4002));
}

#[tokio::test]
async fn test_room_survives_member_leaving() {
    let server = TestServer::start().await.unwrap();
    let room = unique_room();

    let a = server.join_room(&room, "A").await.unwrap();
    let mut b = server.join_room(&room, "B").await.unwrap();
    a.close().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut c = server.join_room(&room, "C").await.unwrap();
    c.send_text("still here").await.unwrap();

    assert_eq!(content(&b.recv().await.unwrap()), Some("still here"));
}

// ============================================================================
// Global notifications
// ============================================================================

#[tokio::test]
async fn test_new_message_notifies_other_users() {
    let server = TestServer::start().await.unwrap();
    let room = unique_room();

    let mut bob_notes = server.connect_user("bob").await.unwrap();
    let mut alice_notes = server.connect_user("alice").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut alice = server.join_room(&room, "alice").await.unwrap();
    alice.send_text("hello").await.unwrap();
    alice.recv().await.unwrap();

    match bob_notes.recv().await.unwrap() {
        ServerFrame::NewMessage {
            room_id, sender_id, ..
        } => {
            assert_eq!(room_id.as_str(), room);
            assert_eq!(sender_id.as_str(), "alice");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    alice_notes.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_notifications_can_be_disabled() {
    let config = test_config(&[("CHAT_NOTIFY_GLOBAL", "false")]).unwrap();
    let server = TestServer::start_with_config(config).await.unwrap();

    let mut bob_notes = server.connect_user("bob").await.unwrap();
    let mut alice = server.join_room(&unique_room(), "alice").await.unwrap();
    alice.send_text("hello").await.unwrap();
    alice.recv().await.unwrap();

    bob_notes.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_second_notification_connection_replaces_first() {
    let server = TestServer::start().await.unwrap();

    let mut first = server.connect_user("bob").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut second = server.connect_user("bob").await.unwrap();

    assert_eq!(first.close_code().await.unwrap(), Some(4010));

    let mut alice = server.join_room(&unique_room(), "alice").await.unwrap();
    alice.send_text("hello").await.unwrap();
    assert!(matches!(
        second.recv().await.unwrap(),
        ServerFrame::NewMessage { .. }
    ));
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_history_after_sending() {
    let server = TestServer::start().await.unwrap();
    let room = unique_room();

    let mut a = server.join_room(&room, "A").await.unwrap();
    for text in ["one", "two", "three"] {
        a.send_text(text).await.unwrap();
        a.recv().await.unwrap();
    }

    let token = server.token("B").unwrap();
    let mut contents = Vec::new();
    for _ in 0..50 {
        let response = server
            .get_auth(&format!("/messages/room/{room}?limit=2"), &token)
            .await
            .unwrap();
        let body = assert_json(response, StatusCode::OK).await.unwrap();
        contents = body
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["content"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        if contents.last().map(String::as_str) == Some("three") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(contents, vec!["two", "three"]);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_closes_connections_going_away() {
    let server = TestServer::start().await.unwrap();

    let mut member = server.join_room(&unique_room(), "A").await.unwrap();
    let mut notes = server.connect_user("B").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let closing = tokio::spawn(server.shutdown());

    assert_eq!(member.close_code().await.unwrap(), Some(4010));
    assert_eq!(notes.close_code().await.unwrap(), Some(4010));
    closing.await.unwrap().unwrap();
}
