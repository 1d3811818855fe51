//! Realtime transport connection
//!
//! Connection lifecycle: `Connecting → Connected(unacked) → Connected(acked)
//! → Disconnected`. On open the transport sends `connection_init`; the
//! server's `connection_ack` carries the inactivity window, and the deadline
//! it arms forces a disconnect when neither `ka` nor a new ack arrives in
//! time. `ka` clears the pending deadline without arming a new one; only the
//! next `connection_ack` re-arms it.
//!
//! Reconnecting is caller policy: observe `Disconnected` on the status
//! channel and call [`RealtimeTransport::connect`] again (with backoff of
//! your choosing). Fresh authorization is obtained per connect and per
//! subscribe; signed material is never reused across reconnects.

use crate::realtime::auth::RealtimeAuthProvider;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use printfleet_shared::auth::AuthorizationError;
use printfleet_shared::channel::Channel;
use printfleet_shared::ids::SubscriptionId;
use printfleet_shared::realtime::messages::{
    ClientMessage, ProtocolErrorDetail, ServerMessage, handshake_subprotocols,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Auth(#[from] AuthorizationError),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Transport is not ready for subscriptions (status: {0:?})")]
    NotReady(TransportStatus),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Why the connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The inactivity deadline fired before a `ka` or a new ack.
    AckTimeout,
    /// The server closed the socket.
    RemoteClose,
    /// Socket-level failure.
    TransportFailure(String),
    /// The client asked for the connection to end.
    ShutDown,
}

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Connecting,
    Connected { acked: bool },
    Disconnected { reason: DisconnectReason },
}

/// What a subscriber receives on its channel.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// Payload of a `data` frame, still in wire form.
    Data(serde_json::Value),
    /// A `subscribe_error`/`unsubscribe_error`/`broadcast_error` addressed
    /// to this subscription.
    Error(Vec<ProtocolErrorDetail>),
}

enum TransportCommand {
    Subscribe {
        id: SubscriptionId,
        channel: Channel,
        authorization: BTreeMap<String, String>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Shutdown,
}

type Handlers = Arc<DashMap<SubscriptionId, mpsc::Sender<SubscriptionEvent>>>;

pub struct RealtimeTransport {
    auth: Arc<dyn RealtimeAuthProvider>,
    command_tx: mpsc::Sender<TransportCommand>,
    status_rx: watch::Receiver<TransportStatus>,
    handlers: Handlers,
}

impl RealtimeTransport {
    /// Opens the websocket with a freshly signed handshake token and spawns
    /// the connection task. `connection_init` is sent as soon as the socket
    /// opens.
    pub async fn connect(
        ws_endpoint: &str,
        auth: Arc<dyn RealtimeAuthProvider>,
    ) -> Result<Self, TransportError> {
        let material = auth.connection_auth().await?;
        let protocols = handshake_subprotocols(&material)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;

        let mut request = ws_endpoint
            .into_client_request()
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        request.headers_mut().insert(
            "sec-websocket-protocol",
            HeaderValue::from_str(&protocols.join(", "))
                .map_err(|e| TransportError::Handshake(e.to_string()))?,
        );

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(TransportStatus::Connecting);
        let handlers: Handlers = Arc::new(DashMap::new());

        tokio::spawn(connection_loop(
            stream,
            command_rx,
            status_tx,
            handlers.clone(),
        ));

        Ok(Self {
            auth,
            command_tx,
            status_rx,
            handlers,
        })
    }

    pub fn status(&self) -> TransportStatus {
        self.status_rx.borrow().clone()
    }

    /// A watch handle for observing state changes (e.g. to drive reconnect).
    pub fn status_stream(&self) -> watch::Receiver<TransportStatus> {
        self.status_rx.clone()
    }

    /// Waits until the connection is acked, or fails if it dies first.
    pub async fn wait_until_ready(&self) -> Result<(), TransportError> {
        let mut status_rx = self.status_rx.clone();
        loop {
            match &*status_rx.borrow() {
                TransportStatus::Connected { acked: true } => return Ok(()),
                TransportStatus::Disconnected { .. } => {
                    return Err(TransportError::ConnectionClosed);
                }
                _ => {}
            }
            if status_rx.changed().await.is_err() {
                return Err(TransportError::ConnectionClosed);
            }
        }
    }

    /// Waits for the connection to end and reports why.
    pub async fn wait_disconnected(&self) -> DisconnectReason {
        let mut status_rx = self.status_rx.clone();
        loop {
            if let TransportStatus::Disconnected { reason } = &*status_rx.borrow() {
                return reason.clone();
            }
            if status_rx.changed().await.is_err() {
                return DisconnectReason::ShutDown;
            }
        }
    }

    /// Opens a subscription on `channel`.
    ///
    /// Only valid while the connection is acked. The `subscribe` frame
    /// carries authorization signed for this call alone. Fire-and-forget:
    /// the returned receiver yields `data` payloads and any `*_error` frames
    /// addressed to this subscription; silence is possible and tolerated.
    pub async fn subscribe(
        &self,
        channel: &Channel,
    ) -> Result<(SubscriptionId, mpsc::Receiver<SubscriptionEvent>), TransportError> {
        let status = self.status();
        if status != (TransportStatus::Connected { acked: true }) {
            return Err(TransportError::NotReady(status));
        }

        let material = self.auth.channel_auth(channel).await?;

        let id = SubscriptionId::new();
        let (event_tx, event_rx) = mpsc::channel(SUBSCRIPTION_CHANNEL_CAPACITY);
        self.handlers.insert(id.clone(), event_tx);

        let command = TransportCommand::Subscribe {
            id: id.clone(),
            channel: channel.clone(),
            authorization: material.headers,
        };
        if self.command_tx.send(command).await.is_err() {
            self.handlers.remove(&id);
            return Err(TransportError::ConnectionClosed);
        }

        Ok((id, event_rx))
    }

    /// Drops the local handler and tells the server to stop delivering.
    /// Safe to call before the remote subscribe was acked; late `data`
    /// frames for this id are dropped silently.
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), TransportError> {
        self.handlers.remove(id);
        self.command_tx
            .send(TransportCommand::Unsubscribe { id: id.clone() })
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Closes the connection; all pending timers and handlers die with it.
    pub async fn close(&self) {
        let _ = self.command_tx.send(TransportCommand::Shutdown).await;
    }
}

async fn connection_loop(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut command_rx: mpsc::Receiver<TransportCommand>,
    status_tx: watch::Sender<TransportStatus>,
    handlers: Handlers,
) {
    let (mut write, mut read) = stream.split();

    let init = match serde_json::to_string(&ClientMessage::ConnectionInit) {
        Ok(init) => init,
        Err(e) => {
            status_tx.send_replace(TransportStatus::Disconnected {
                reason: DisconnectReason::TransportFailure(e.to_string()),
            });
            return;
        }
    };
    if write.send(Message::Text(init.into())).await.is_err() {
        status_tx.send_replace(TransportStatus::Disconnected {
            reason: DisconnectReason::TransportFailure("failed to send connection_init".to_string()),
        });
        return;
    }
    status_tx.send_replace(TransportStatus::Connected { acked: false });

    // Inactivity deadline: armed by connection_ack, cleared by ka. Scoped to
    // this task so every exit path cancels it.
    let mut deadline: Option<Instant> = None;

    let reason = loop {
        let inactivity = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => {
                            handle_server_message(message, &mut deadline, &status_tx, &handlers);
                        }
                        Err(parse_error) => {
                            // Liberal receiver: log and move on.
                            warn!(error = %parse_error, "Ignoring malformed frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if write.send(Message::Pong(payload)).await.is_err() {
                        break DisconnectReason::TransportFailure("pong failed".to_string());
                    }
                }
                Some(Ok(Message::Close(_))) | None => break DisconnectReason::RemoteClose,
                Some(Ok(_)) => {}
                Some(Err(socket_error)) => {
                    break DisconnectReason::TransportFailure(socket_error.to_string());
                }
            },

            command = command_rx.recv() => match command {
                Some(TransportCommand::Subscribe { id, channel, authorization }) => {
                    let frame = ClientMessage::Subscribe { id, channel, authorization };
                    if send_client_message(&mut write, &frame).await.is_err() {
                        break DisconnectReason::TransportFailure("subscribe send failed".to_string());
                    }
                }
                Some(TransportCommand::Unsubscribe { id }) => {
                    let frame = ClientMessage::Unsubscribe { id };
                    if send_client_message(&mut write, &frame).await.is_err() {
                        break DisconnectReason::TransportFailure("unsubscribe send failed".to_string());
                    }
                }
                Some(TransportCommand::Shutdown) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break DisconnectReason::ShutDown;
                }
            },

            _ = inactivity => break DisconnectReason::AckTimeout,
        }
    };

    handlers.clear();
    status_tx.send_replace(TransportStatus::Disconnected { reason });
}

fn handle_server_message(
    message: ServerMessage,
    deadline: &mut Option<Instant>,
    status_tx: &watch::Sender<TransportStatus>,
    handlers: &Handlers,
) {
    match message {
        ServerMessage::ConnectionAck {
            connection_timeout_ms,
        } => {
            *deadline = Some(Instant::now() + Duration::from_millis(connection_timeout_ms));
            status_tx.send_replace(TransportStatus::Connected { acked: true });
        }

        ServerMessage::Ka => {
            // Liveness signal: clears the pending deadline. Only the next
            // connection_ack arms a new one.
            *deadline = None;
        }

        ServerMessage::Data { id, event } => {
            route(handlers, &id, SubscriptionEvent::Data(event));
        }

        ServerMessage::SubscribeSuccess { id } | ServerMessage::UnsubscribeSuccess { id } => {
            debug!(subscription_id = %id, "Subscription settled");
        }

        ServerMessage::SubscribeError { id, errors }
        | ServerMessage::UnsubscribeError { id, errors }
        | ServerMessage::BroadcastError { id, errors } => {
            route(handlers, &id, SubscriptionEvent::Error(errors));
        }
    }
}

fn route(handlers: &Handlers, id: &SubscriptionId, event: SubscriptionEvent) {
    match handlers.get(id) {
        Some(handler) => {
            if let Err(send_error) = handler.try_send(event) {
                warn!(subscription_id = %id, error = %send_error, "Subscriber not keeping up");
            }
        }
        None => {
            // Late delivery after unsubscribe is expected, not an error.
            debug!(subscription_id = %id, "Dropping frame for unknown subscription");
        }
    }
}

async fn send_client_message<S>(
    write: &mut S,
    message: &ClientMessage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(message)?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}
