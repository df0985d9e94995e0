//! Chat Session Tests
//!
//! Drive sessions directly, without sockets, and inspect their outboxes.

use honey_realtime::application::services::AuthError;
use honey_realtime::domain::GroupKind;
use honey_realtime::infrastructure::metrics;
use honey_realtime::presentation::websocket::{
    ChatTarget, ConnectionSession, OutboundEnvelope, SessionState,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;

use crate::common::{drain, eventually, TestWorld};

fn error(message: &str) -> OutboundEnvelope {
    OutboundEnvelope::error(message)
}

#[tokio::test]
async fn test_direct_message_reaches_receiver_and_acks_sender() {
    let world = TestWorld::new();
    let (alice, alice_token) = world.add_user("alice");
    let (bob, bob_token) = world.add_user("bob");

    let (mut alice_session, mut alice_out) = world.connect_direct("A-B", &alice_token).await;
    let (_bob_session, mut bob_out) = world.connect_direct("A-B", &bob_token).await;

    let frame = json!({"type": "message", "receiver_id": bob.id, "content": "hi"}).to_string();
    alice_session.handle_text(&frame).await;

    let stored = world.messages.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "hi");
    assert_eq!(stored[0].recipient.receiver().map(|u| u.id), Some(bob.id));

    let alice_frames = drain(&mut alice_out);
    assert_eq!(alice_frames.len(), 1);
    let OutboundEnvelope::MessageSent { message } = &alice_frames[0] else {
        panic!("expected message_sent, got {:?}", alice_frames[0]);
    };
    assert_eq!(message.content, "hi");
    assert_eq!(message.sender.id, alice.id);

    let bob_frames = drain(&mut bob_out);
    assert_eq!(bob_frames.len(), 1);
    let OutboundEnvelope::Message { message } = &bob_frames[0] else {
        panic!("expected message, got {:?}", bob_frames[0]);
    };
    assert_eq!(message.content, "hi");
    assert_eq!(message.receiver.as_ref().map(|r| r.id), Some(bob.id));
}

#[tokio::test]
async fn test_direct_message_reaches_every_receiver_device() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, bob_token) = world.add_user("bob");

    let (mut alice_session, _alice_out) = world.connect_direct("A-B", &alice_token).await;
    let (_phone, mut phone_out) = world.connect_direct("A-B", &bob_token).await;
    let (_laptop, mut laptop_out) = world.connect_direct("bob-carol", &bob_token).await;

    let frame = json!({"type": "message", "receiver_id": bob.id, "content": "ping"}).to_string();
    alice_session.handle_text(&frame).await;

    assert_eq!(drain(&mut phone_out).len(), 1);
    assert_eq!(drain(&mut laptop_out).len(), 1);
}

#[tokio::test]
async fn test_message_type_defaults_to_text() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, _) = world.add_user("bob");
    let (mut session, _out) = world.connect_direct("A-B", &alice_token).await;

    session
        .handle_text(&json!({"type": "message", "receiver_id": bob.id, "content": "x"}).to_string())
        .await;
    session
        .handle_text(
            &json!({"type": "message", "receiver_id": bob.id, "content": "y", "message_type": "voice"})
                .to_string(),
        )
        .await;

    let types: Vec<_> = world
        .messages
        .stored()
        .iter()
        .map(|m| m.message_type.as_str())
        .collect();
    assert_eq!(types, vec!["text", "voice"]);
}

#[tokio::test]
async fn test_missing_fields_are_reported_and_nothing_is_stored() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, _) = world.add_user("bob");
    let (mut session, mut out) = world.connect_direct("A-B", &alice_token).await;

    for frame in [
        json!({"type": "message", "content": "hi"}),
        json!({"type": "message", "receiver_id": bob.id}),
        json!({"type": "message", "receiver_id": bob.id, "content": ""}),
    ] {
        session.handle_text(&frame.to_string()).await;
    }

    assert!(world.messages.stored().is_empty());
    assert_eq!(
        drain(&mut out),
        vec![
            error("Missing receiver_id or content"),
            error("Missing receiver_id or content"),
            error("Missing receiver_id or content"),
        ]
    );
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn test_malformed_json_keeps_connection_open() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, _) = world.add_user("bob");
    let (mut session, mut out) = world.connect_direct("A-B", &alice_token).await;

    session.handle_text("{not json").await;
    assert_eq!(drain(&mut out), vec![error("Invalid JSON")]);
    assert_eq!(session.state(), SessionState::Active);

    session
        .handle_text(&json!({"type": "message", "receiver_id": bob.id, "content": "still here"}).to_string())
        .await;
    assert!(matches!(
        drain(&mut out).as_slice(),
        [OutboundEnvelope::MessageSent { .. }]
    ));
}

#[tokio::test]
async fn test_unknown_and_empty_frames_are_ignored() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (mut session, mut out) = world.connect_direct("A-B", &alice_token).await;

    session.handle_text(r#"{"type":"reaction","emoji":"x"}"#).await;
    session.handle_text("").await;
    session.handle_text(r#"{"type":"group_message","content":"x"}"#).await;

    assert!(drain(&mut out).is_empty());
    assert!(world.messages.stored().is_empty());
}

#[tokio::test]
async fn test_unknown_receiver_is_reported() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (mut session, mut out) = world.connect_direct("A-B", &alice_token).await;

    session
        .handle_text(r#"{"type":"message","receiver_id":"B","content":"hi"}"#)
        .await;

    assert_eq!(
        drain(&mut out),
        vec![error("Failed to send message: Receiver not found")]
    );
    assert!(world.messages.stored().is_empty());
}

#[tokio::test]
async fn test_store_failure_is_reported_and_not_published() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, bob_token) = world.add_user("bob");
    let (mut session, mut out) = world.connect_direct("A-B", &alice_token).await;
    let (_bob_session, mut bob_out) = world.connect_direct("A-B", &bob_token).await;
    world.messages.fail_inserts();

    session
        .handle_text(&json!({"type": "message", "receiver_id": bob.id, "content": "hi"}).to_string())
        .await;

    let frames = drain(&mut out);
    assert_eq!(frames.len(), 1);
    let OutboundEnvelope::Error { message } = &frames[0] else {
        panic!("expected error");
    };
    assert!(message.starts_with("Failed to send message: "));
    assert!(drain(&mut bob_out).is_empty());
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn test_reply_to_gone_writer_is_counted_not_fatal() {
    let transport_errors = || {
        metrics::ENVELOPE_ERRORS_TOTAL
            .with_label_values(&["transport"])
            .get()
    };

    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, _) = world.add_user("bob");
    let (mut session, out) = world.connect_direct("A-B", &alice_token).await;
    drop(out);

    let before = transport_errors();
    session
        .handle_text(&json!({"type": "message", "receiver_id": bob.id, "content": "hi"}).to_string())
        .await;

    assert!(transport_errors() >= before + 1);
    assert_eq!(world.messages.stored().len(), 1);
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn test_typing_and_call_are_forwarded() {
    let world = TestWorld::new();
    let (alice, alice_token) = world.add_user("alice");
    let (bob, bob_token) = world.add_user("bob");
    let (mut session, mut alice_out) = world.connect_direct("A-B", &alice_token).await;
    let (_bob_session, mut bob_out) = world.connect_direct("A-B", &bob_token).await;

    session
        .handle_text(&json!({"type": "typing", "receiver_id": bob.id, "is_typing": true}).to_string())
        .await;
    session
        .handle_text(
            &json!({
                "type": "call",
                "receiver_id": bob.id,
                "call_type": "audio",
                "signal_data": {"sdp": "offer", "ice": [1, 2, 3]}
            })
            .to_string(),
        )
        .await;

    assert_eq!(
        drain(&mut bob_out),
        vec![
            OutboundEnvelope::Typing {
                user_id: alice.id,
                username: "alice".into(),
                is_typing: json!(true),
            },
            OutboundEnvelope::Call {
                call_type: json!("audio"),
                signal_data: json!({"sdp": "offer", "ice": [1, 2, 3]}),
                sender_id: alice.id,
                sender_username: "alice".into(),
            },
        ]
    );
    assert!(drain(&mut alice_out).is_empty());
    assert!(world.messages.stored().is_empty());
}

#[tokio::test]
async fn test_typing_and_call_fields_are_forwarded_as_sent() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, bob_token) = world.add_user("bob");
    let (mut session, _alice_out) = world.connect_direct("A-B", &alice_token).await;
    let (_bob_session, mut bob_out) = world.connect_direct("A-B", &bob_token).await;

    session
        .handle_text(&json!({"type": "typing", "receiver_id": bob.id, "is_typing": "yes"}).to_string())
        .await;
    session
        .handle_text(
            &json!({"type": "call", "receiver_id": bob.id, "call_type": {"kind": "video"}}).to_string(),
        )
        .await;
    session
        .handle_text(&json!({"type": "typing", "receiver_id": bob.id}).to_string())
        .await;

    let frames: Vec<serde_json::Value> = drain(&mut bob_out)
        .iter()
        .map(|f| serde_json::from_str(&f.encode()).unwrap())
        .collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["is_typing"], json!("yes"));
    assert_eq!(frames[1]["call_type"], json!({"kind": "video"}));
    assert_eq!(frames[1]["signal_data"], serde_json::Value::Null);
    assert_eq!(frames[2]["is_typing"], json!(false));
}

#[tokio::test]
async fn test_typing_without_receiver_is_silent() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (_bob, bob_token) = world.add_user("bob");
    let (mut session, mut alice_out) = world.connect_direct("A-B", &alice_token).await;
    let (_bob_session, mut bob_out) = world.connect_direct("A-B", &bob_token).await;

    session.handle_text(r#"{"type":"typing","is_typing":true}"#).await;
    session.handle_text(r#"{"type":"call","call_type":"video"}"#).await;

    assert!(drain(&mut alice_out).is_empty());
    assert!(drain(&mut bob_out).is_empty());
}

#[tokio::test]
async fn test_group_message_fans_out_to_group() {
    let world = TestWorld::new();
    let (admin, admin_token) = world.add_user("admin");
    let (member, member_token) = world.add_user("member");
    let group = world.add_group(GroupKind::Group, &admin, &[&admin, &member]);

    let (_admin_session, mut admin_out) = world.connect_group(&group, &admin_token).await;
    let (mut member_session, mut member_out) = world.connect_group(&group, &member_token).await;

    member_session
        .handle_text(r#"{"type":"group_message","content":"hello all"}"#)
        .await;

    for out in [&mut admin_out, &mut member_out] {
        let frames = drain(out);
        assert_eq!(frames.len(), 1);
        let OutboundEnvelope::GroupMessage { message } = &frames[0] else {
            panic!("expected group_message");
        };
        assert_eq!(message.content, "hello all");
        assert_eq!(message.group.as_ref().map(|g| g.id), Some(group.id));
    }
    assert_eq!(world.messages.stored().len(), 1);
}

#[tokio::test]
async fn test_group_id_spellings_share_one_topic() {
    let world = TestWorld::new();
    let (admin, admin_token) = world.add_user("admin");
    let (member, member_token) = world.add_user("member");
    let group = world.add_group(GroupKind::Group, &admin, &[&admin, &member]);

    let (_admin_session, mut admin_out) = world
        .connect(ChatTarget::group(group.id.simple().to_string()).unwrap(), &admin_token)
        .await;
    let (mut member_session, mut member_out) = world
        .connect(ChatTarget::group(group.id.braced().to_string()).unwrap(), &member_token)
        .await;
    assert_eq!(world.state.sessions.fabric.stats().topics, 1);

    member_session
        .handle_text(r#"{"type":"group_message","content":"same room?"}"#)
        .await;

    assert_eq!(drain(&mut admin_out).len(), 1);
    assert_eq!(drain(&mut member_out).len(), 1);
}

#[tokio::test]
async fn test_channel_rejects_non_admin_member() {
    let world = TestWorld::new();
    let (admin, _) = world.add_user("admin");
    let (member, member_token) = world.add_user("member");
    let channel = world.add_group(GroupKind::Channel, &admin, &[&admin, &member]);

    let (mut session, mut out) = world.connect_group(&channel, &member_token).await;
    session
        .handle_text(r#"{"type":"group_message","content":"can I post?"}"#)
        .await;

    assert_eq!(drain(&mut out), vec![error("Only admins can post in channels")]);
    assert!(world.messages.stored().is_empty());
}

#[tokio::test]
async fn test_channel_accepts_admin() {
    let world = TestWorld::new();
    let (admin, admin_token) = world.add_user("admin");
    let channel = world.add_group(GroupKind::Channel, &admin, &[]);

    let (mut session, mut out) = world.connect_group(&channel, &admin_token).await;
    session
        .handle_text(r#"{"type":"message","content":"announcement"}"#)
        .await;

    assert!(matches!(
        drain(&mut out).as_slice(),
        [OutboundEnvelope::GroupMessage { .. }]
    ));
}

#[tokio::test]
async fn test_group_rejects_outsider() {
    let world = TestWorld::new();
    let (admin, _) = world.add_user("admin");
    let (_outsider, outsider_token) = world.add_user("outsider");
    let group = world.add_group(GroupKind::Group, &admin, &[&admin]);

    let (mut session, mut out) = world.connect_group(&group, &outsider_token).await;
    session
        .handle_text(r#"{"type":"group_message","content":"hi"}"#)
        .await;

    assert_eq!(drain(&mut out), vec![error("Not a member of this group")]);
    assert!(world.messages.stored().is_empty());
}

#[tokio::test]
async fn test_group_errors() {
    let world = TestWorld::new();
    let (_user, token) = world.add_user("user");

    let (mut session, mut out) = world
        .connect(
            ChatTarget::group(uuid::Uuid::new_v4().to_string()).unwrap(),
            &token,
        )
        .await;

    session.handle_text(r#"{"type":"group_message"}"#).await;
    session
        .handle_text(r#"{"type":"group_message","content":"anyone?"}"#)
        .await;
    session.handle_text("nope").await;

    assert_eq!(
        drain(&mut out),
        vec![
            error("Missing content"),
            error("Group not found"),
            error("Invalid JSON"),
        ]
    );
}

#[tokio::test]
async fn test_open_marks_online_and_close_marks_offline_once() {
    let world = TestWorld::new();
    let (alice, alice_token) = world.add_user("alice");

    let (mut session, _out) = world.connect_direct("A-B", &alice_token).await;
    assert!(world.users.get(alice.id).unwrap().online);
    assert_eq!(world.state.sessions.fabric.stats().subscriptions, 2);

    session.close().await;
    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(!world.users.get(alice.id).unwrap().online);
    assert_eq!(world.state.sessions.fabric.stats().subscriptions, 0);

    let writes: Vec<bool> = world
        .users
        .presence_writes(alice.id)
        .into_iter()
        .map(|(online, _)| online)
        .collect();
    assert_eq!(writes, vec![true, false]);
}

#[tokio::test]
async fn test_dropped_session_still_tears_down() {
    let world = TestWorld::new();
    let (alice, alice_token) = world.add_user("alice");

    let (session, _out) = world.connect_direct("A-B", &alice_token).await;
    drop(session);

    assert_eq!(world.state.sessions.fabric.stats().topics, 0);
    let users = world.users.clone();
    eventually(move || !users.get(alice.id).map(|u| u.online).unwrap_or(true)).await;
    assert_eq!(world.users.presence_writes(alice.id).len(), 2);
}

#[tokio::test]
async fn test_closed_session_ignores_frames() {
    let world = TestWorld::new();
    let (_alice, alice_token) = world.add_user("alice");
    let (mut session, mut out) = world.connect_direct("A-B", &alice_token).await;

    session.close().await;
    session.handle_text("not json").await;

    assert!(drain(&mut out).is_empty());
}

#[tokio::test]
async fn test_handshake_refusals() {
    let world = TestWorld::new();
    let (mut inactive, inactive_token) = world.add_user("inactive");
    inactive.is_active = false;
    world.users.insert(inactive);

    let cases = [
        (None, "Missing credential"),
        (Some(""), "Missing credential"),
        (Some("forged"), "Invalid token"),
        (Some(inactive_token.as_str()), "User is inactive"),
    ];

    for (credential, expected) in cases {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session =
            ConnectionSession::new(world.ctx(), ChatTarget::direct("A-B").unwrap(), tx);

        let err = session.authenticate(credential).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.open().await,
            Err(honey_realtime::application::services::ChatError::Auth(_))
        ));
    }

    assert_eq!(world.state.sessions.fabric.stats().topics, 0);
}

#[tokio::test]
async fn test_token_for_unknown_user_is_refused() {
    let world = TestWorld::new();
    let token = world.issue_token(uuid::Uuid::new_v4());

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut session = ConnectionSession::new(world.ctx(), ChatTarget::direct("A-B").unwrap(), tx);

    let err = session.authenticate(Some(&token)).await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_repeated_online_writes_are_idempotent() {
    let world = TestWorld::new();
    let (alice, alice_token) = world.add_user("alice");

    let (_first, _out1) = world.connect_direct("A-B", &alice_token).await;
    let (_second, _out2) = world.connect_direct("A-C", &alice_token).await;

    let writes = world.users.presence_writes(alice.id);
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|(online, _)| *online));
    assert!(writes[1].1 >= writes[0].1);
    assert!(world.users.get(alice.id).unwrap().online);
}
