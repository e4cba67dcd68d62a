//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::http::middleware::{AuthError, Identity};
use crate::http::routes::AppError;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Messages buffered per connection before frames start being dropped
const OUTBOUND_BUFFER: usize = 128;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: Option<String>,
}

/// Query token first, then the bearer header
pub fn resolve_token(query: Option<String>, bearer: Option<&str>) -> Option<String> {
    query
        .filter(|t| !t.is_empty())
        .or_else(|| bearer.map(str::to_string))
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let token = resolve_token(
        query.token,
        bearer.as_ref().map(|TypedHeader(Authorization(b))| b.token()),
    )
    .ok_or(AuthError::MissingHeader)?;

    // Verify before upgrading; nothing is registered for a bad credential
    let identity = state.identity.verify(&token).map_err(|e| {
        warn!(error = %e, "WebSocket auth failed");
        e
    })?;

    info!(user_id = %identity.user_id, "WebSocket upgrade for authenticated user");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, identity, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, identity: Identity, state: AppState) {
    let user_id = identity.user_id;
    let (ws_sink, mut ws_stream) = socket.split();

    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);
    let connection_id = state.gateway.connect(identity, outbound_tx);

    let writer_handle = tokio::spawn(write_loop(user_id, ws_sink, outbound_rx));

    let rate_limiter = PlayerRateLimiter::new();

    // Reader loop: WebSocket -> gateway
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(user_id = %user_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        state.gateway.handle(user_id, connection_id, client_msg).await;
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.gateway.disconnect(user_id, connection_id);
    writer_handle.abort();

    info!(user_id = %user_id, connection_id = %connection_id, "WebSocket connection closed");
}

/// Writer task: outbound queue -> WebSocket. Ends when the gateway drops the
/// queue (connection superseded) or the socket fails.
async fn write_loop(
    user_id: uuid::Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(user_id = %user_id, error = %e, "WebSocket send failed");
            break;
        }
    }
    let _ = ws_sink.close().await;
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
