//! In-process websocket server helpers for transport and workflow tests.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use printfleet_shared::auth::AuthMaterial;
use printfleet_shared::realtime::messages::{ClientMessage, ServerMessage};
use std::collections::BTreeMap;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Binds a listener and returns it plus the websocket endpoint url.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/event/realtime", listener.local_addr().unwrap());
    (listener, url)
}

/// Accepts one websocket connection, echoing the client's first requested
/// subprotocol (the transport encodes its auth in the second). Returns the
/// socket and the raw subprotocol header the client sent.
pub async fn accept(listener: &TcpListener) -> (ServerSocket, Option<String>) {
    let (stream, _) = listener.accept().await.unwrap();

    let (protocols_tx, protocols_rx) = std::sync::mpsc::channel();
    let socket = accept_hdr_async(stream, move |request: &Request, mut response: Response| {
        let requested = request
            .headers()
            .get("sec-websocket-protocol")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(requested) = &requested {
            let first = requested.split(',').next().unwrap_or("").trim();
            if let Ok(value) = HeaderValue::from_str(first) {
                response
                    .headers_mut()
                    .insert("sec-websocket-protocol", value);
            }
        }

        let _ = protocols_tx.send(requested);
        Ok::<Response, ErrorResponse>(response)
    })
    .await
    .unwrap();

    let protocols = protocols_rx.try_recv().ok().flatten();
    (socket, protocols)
}

/// Sends one server frame.
pub async fn send(socket: &mut ServerSocket, message: &ServerMessage) {
    let json = serde_json::to_string(message).unwrap();
    socket.send(Message::Text(json.into())).await.unwrap();
}

/// Sends a raw text frame (for malformed-frame cases).
pub async fn send_raw(socket: &mut ServerSocket, text: &str) {
    socket
        .send(Message::Text(text.to_string().into()))
        .await
        .unwrap();
}

/// Reads frames until the next parseable client message.
pub async fn recv_client(socket: &mut ServerSocket) -> ClientMessage {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Ok(message) = serde_json::from_str::<ClientMessage>(&text) {
                    return message;
                }
                panic!("unparseable client frame: {}", text);
            }
            Some(Ok(Message::Close(_))) | None => panic!("client closed early"),
            Some(Ok(_)) => {}
            Some(Err(e)) => panic!("socket error: {}", e),
        }
    }
}

/// Expects the next client message to be `connection_init`.
pub async fn expect_connection_init(socket: &mut ServerSocket) {
    match recv_client(socket).await {
        ClientMessage::ConnectionInit => {}
        other => panic!("expected connection_init, got {:?}", other),
    }
}

/// Pre-signed dummy material for tests that don't exercise the signer.
pub fn static_material() -> AuthMaterial {
    AuthMaterial {
        headers: BTreeMap::from([
            ("host".to_string(), "events.test.invalid".to_string()),
            ("x-amz-date".to_string(), "20250101T000000Z".to_string()),
            (
                "authorization".to_string(),
                "AWS4-HMAC-SHA256 Credential=test, SignedHeaders=host;x-amz-date, Signature=0"
                    .to_string(),
            ),
        ]),
        expires_at: chrono::Utc::now() + chrono::Duration::seconds(300),
    }
}
