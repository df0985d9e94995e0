//! WebSocket End-to-End Tests
//!
//! A real server on a loopback port and tungstenite clients.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use honey_realtime::startup::build_router;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::common::{eventually, TestWorld};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(world: &TestWorld) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(world.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn dial(addr: SocketAddr, path: &str, token: Option<&str>) -> Result<Client, tungstenite::Error> {
    let mut request = format!("ws://{addr}{path}").into_client_request()?;
    if let Some(token) = token {
        request
            .headers_mut()
            .insert("authorization", format!("Bearer {token}").parse().unwrap());
    }
    tokio_tungstenite::connect_async(request)
        .await
        .map(|(stream, _)| stream)
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        match client.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("connection ended: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_direct_chat_over_sockets() {
    let world = TestWorld::new();
    let addr = serve(&world).await;
    let (_alice, alice_token) = world.add_user("alice");
    let (bob, bob_token) = world.add_user("bob");

    let mut alice = dial(addr, "/ws/chat/A-B/", Some(&alice_token)).await.unwrap();
    let mut bob_client = dial(addr, "/ws/chat/A-B", Some(&bob_token)).await.unwrap();

    let fabric = world.state.sessions.fabric.clone();
    eventually(move || fabric.stats().connections == 2).await;

    alice
        .send(Message::Text(
            json!({"type": "message", "receiver_id": bob.id, "content": "hi"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    let ack = next_json(&mut alice).await;
    assert_eq!(ack["type"], "message_sent");
    assert_eq!(ack["message"]["content"], "hi");
    assert_eq!(ack["message"]["sender"]["username"], "alice");

    let delivered = next_json(&mut bob_client).await;
    assert_eq!(delivered["type"], "message");
    assert_eq!(delivered["message"]["id"], ack["message"]["id"]);
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    let world = TestWorld::new();
    let addr = serve(&world).await;
    let (_alice, token) = world.add_user("alice");

    let mut client = dial(addr, "/ws/chat/A-B/", Some(&token)).await.unwrap();
    client.send(Message::Text("not json".into())).await.unwrap();
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "error", "message": "Invalid JSON"})
    );

    client
        .send(Message::Text(r#"{"type":"message","content":"x"}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "error", "message": "Missing receiver_id or content"})
    );
}

#[tokio::test]
async fn test_handshake_without_token_is_refused() {
    let world = TestWorld::new();
    let addr = serve(&world).await;

    match dial(addr, "/ws/chat/A-B/", None).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("expected refusal, got {:?}", other.map(|_| ())),
    }

    match dial(addr, "/ws/chat/A-B/", Some("forged")).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("expected refusal, got {:?}", other.map(|_| ())),
    }
    assert_eq!(world.state.sessions.fabric.stats().connections, 0);
}

#[tokio::test]
async fn test_handshake_with_store_down_is_a_server_error() {
    let world = TestWorld::new();
    let addr = serve(&world).await;
    let (_alice, token) = world.add_user("alice");
    world.users.fail_lookups();

    match dial(addr, "/ws/chat/A-B/", Some(&token)).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 500);
        }
        other => panic!("expected refusal, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_malformed_group_id_is_a_bad_request() {
    let world = TestWorld::new();
    let addr = serve(&world).await;
    let (_alice, token) = world.add_user("alice");

    match dial(addr, "/ws/chat/group/not-a-group/", Some(&token)).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 400);
        }
        other => panic!("expected refusal, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_disconnect_marks_user_offline() {
    let world = TestWorld::new();
    let addr = serve(&world).await;
    let (alice, token) = world.add_user("alice");

    let path = format!("/ws/chat/group/{}/", uuid::Uuid::new_v4());
    let mut client = dial(addr, &path, Some(&token)).await.unwrap();

    let users = world.users.clone();
    eventually(move || users.get(alice.id).map(|u| u.online).unwrap_or(false)).await;

    client.close(None).await.unwrap();

    let users = world.users.clone();
    eventually(move || !users.get(alice.id).map(|u| u.online).unwrap_or(true)).await;
    let fabric = world.state.sessions.fabric.clone();
    eventually(move || fabric.stats().topics == 0).await;
}
