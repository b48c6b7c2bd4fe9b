//! WebSocket subscriptions to a session's broadcast topic.
//!
//! The caller authenticates with query parameters (`participant_token` or
//! `user_id`) before the upgrade. After a `welcome`, the server forwards
//! every envelope published on `play:<session id>`; the client only sends
//! heartbeats and pings.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use liveplay_domain::SessionId;
use liveplay_shared::{ClientMessage, ServerMessage};

use super::connections::{ConnectionInfo, ConnectionManager};
use super::http::ApiError;
use crate::app::App;
use crate::use_cases::{Credentials, Viewer};

/// Buffer size for per-connection message channel.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// Combined state for WebSocket handlers.
pub struct WsState {
    pub app: Arc<App>,
    pub connections: Arc<ConnectionManager>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    #[serde(default)]
    pub participant_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl From<SubscribeQuery> for Credentials {
    fn from(query: SubscribeQuery) -> Self {
        Credentials {
            participant_token: query.participant_token,
            host_user_id: query.user_id,
        }
    }
}

/// WebSocket upgrade handler. Unauthenticated callers get a JSON error
/// instead of an upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SubscribeQuery>,
) -> Response {
    let session_id = SessionId::from_uuid(id);
    let credentials = Credentials::from(query);
    match state.app.use_cases.auth.resolve(session_id, &credentials).await {
        Ok(viewer) => {
            ws.on_upgrade(move |socket| handle_socket(socket, state, viewer, credentials))
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Handle an individual WebSocket connection.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<WsState>,
    viewer: Viewer,
    credentials: Credentials,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let connection_id = Uuid::new_v4();
    let session_id = viewer.session().id();
    let participant_id = match &viewer {
        Viewer::Participant(p) => Some(p.participant.id()),
        Viewer::Host(_) => None,
    };

    // Create a bounded channel for sending messages to this client
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);

    state
        .connections
        .register(
            ConnectionInfo::new(connection_id, session_id, participant_id),
            tx.clone(),
        )
        .await;
    let _ = tx.try_send(ServerMessage::Welcome {
        session_id,
        participant_id,
    });

    tracing::info!(
        connection_id = %connection_id,
        session_id = %session_id,
        participant_id = ?participant_id,
        "WebSocket subscription established"
    );

    // Forward queued messages to the socket. A closing notice ends the
    // connection after it is delivered.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, ServerMessage::Closing { .. });
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            if closing {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    let response = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(msg) => {
                            handle_message(msg, &recv_state.app, session_id, &credentials).await
                        }
                        Err(e) => {
                            tracing::warn!(
                                connection_id = %connection_id,
                                error = %e,
                                "Failed to parse message"
                            );
                            ServerMessage::Error {
                                code: "PARSE_ERROR".to_string(),
                                message: format!("Invalid message format: {}", e),
                            }
                        }
                    };
                    if tx.try_send(response).is_err() {
                        tracing::warn!(
                            connection_id = %connection_id,
                            "Failed to send response, channel full or closed"
                        );
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %connection_id, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.connections.unregister(connection_id).await;
    tracing::info!(connection_id = %connection_id, "WebSocket subscription terminated");
}

/// Answer one client message.
async fn handle_message(
    msg: ClientMessage,
    app: &App,
    session_id: SessionId,
    credentials: &Credentials,
) -> ServerMessage {
    match msg {
        ClientMessage::Ping => ServerMessage::Pong,
        ClientMessage::Heartbeat => {
            // Re-resolve so a kicked or expired participant stops counting
            // as present.
            let result = match app.use_cases.auth.resolve(session_id, credentials).await {
                Ok(Viewer::Participant(viewer)) => app
                    .use_cases
                    .participants
                    .heartbeat(&viewer)
                    .await
                    .map(|_| ()),
                Ok(Viewer::Host(_)) => Ok(()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => ServerMessage::Pong,
                Err(e) => ServerMessage::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            }
        }
        ClientMessage::Unknown => ServerMessage::Error {
            code: "UNKNOWN_MESSAGE".to_string(),
            message: "Unsupported message type".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TestApp;
    use liveplay_domain::ParticipantStatus;

    #[tokio::test]
    async fn heartbeat_refreshes_presence() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let ada = app.join(&session, "Ada").await;
        let viewer = app.participant(session.id(), &ada).await;
        app.use_cases.participants.leave(&viewer).await.unwrap();

        let credentials = Credentials::participant(ada.token().expose());
        let reply =
            handle_message(ClientMessage::Heartbeat, &app, session.id(), &credentials).await;
        assert_eq!(reply, ServerMessage::Pong);

        let back = app.participant(session.id(), &ada).await;
        assert_eq!(back.participant.status(), ParticipantStatus::Active);
    }

    #[tokio::test]
    async fn heartbeat_from_kicked_participant_is_refused() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let ada = app.join(&session, "Ada").await;
        app.use_cases
            .participants
            .kick(&app.host(session.id()).await, ada.id())
            .await
            .unwrap();

        let credentials = Credentials::participant(ada.token().expose());
        let reply =
            handle_message(ClientMessage::Heartbeat, &app, session.id(), &credentials).await;
        assert!(matches!(
            reply,
            ServerMessage::Error { ref code, .. } if code == "PARTICIPANT_REVOKED"
        ));
    }

    #[tokio::test]
    async fn ping_and_unknown_messages() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let credentials = Credentials::host(crate::test_fixtures::HOST);

        let reply = handle_message(ClientMessage::Ping, &app, session.id(), &credentials).await;
        assert_eq!(reply, ServerMessage::Pong);

        let reply =
            handle_message(ClientMessage::Unknown, &app, session.id(), &credentials).await;
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }
}
