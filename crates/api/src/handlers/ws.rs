//! WebSocket transport for the session event gateway.
//!
//! Identity comes from the `x-user-id` and `x-user-role` headers of the
//! upgrade request. Each socket is split into an outbound task draining the
//! connection's queue and an inbound task feeding frames to the gateway;
//! whichever ends first tears down the other, then the disconnect cleanup
//! runs on its own task.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};
use tutorcall_core::{errors::CoreError, models::UserId};
use tutorcall_gateway::{SessionEventGateway, UserRole};

use crate::{ApiState, middleware::error_handling::AppError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError(CoreError::Validation(format!("Missing {} header", name))))
}

pub fn identity(headers: &HeaderMap) -> Result<(UserId, UserRole), AppError> {
    let user_id = header(headers, USER_ID_HEADER)?
        .parse::<UserId>()
        .map_err(|_| AppError(CoreError::Validation(format!("Invalid {} header", USER_ID_HEADER))))?;
    let role = header(headers, USER_ROLE_HEADER)?.parse::<UserRole>()?;
    Ok((user_id, role))
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<ApiState>>,
) -> Result<Response, AppError> {
    let (user_id, role) = identity(&headers)?;
    let gateway = state.gateway.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, gateway, user_id, role)))
}

async fn handle_socket(
    socket: WebSocket,
    gateway: Arc<SessionEventGateway>,
    user_id: UserId,
    role: UserRole,
) {
    let (mut sender, mut receiver) = socket.split();
    let (session, mut outbound) = gateway.connect(user_id, role).await;

    info!(user_id, "WebSocket client connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            match event.to_json() {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        debug!("Failed to send event to WebSocket client");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                }
            }
        }
        // Superseded or shutting down; tell the client.
        let _ = sender.send(Message::Close(None)).await;
    });

    let inbound = gateway.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => inbound.dispatch(&session, &text).await,
                Message::Close(_) => {
                    debug!("Received close message");
                    break;
                }
                Message::Binary(_) => {
                    debug!("Received binary message (ignored)");
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    if let Err(err) = gateway.disconnect(session).await {
        error!(user_id, "Disconnect cleanup panicked: {}", err);
    }
    info!(user_id, "WebSocket client disconnected");
}
