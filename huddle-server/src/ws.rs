use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use huddle_collab::{Collab, ConnectionSession, RouteContext};
use log::debug;

use crate::auth::Identity;

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/ws",
    tag = "rooms",
    params(
        ("id" = i64, Path, description = "Room id"),
        ("token" = Option<i64>, Query, description = "User id, for clients that cannot set headers")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 101, description = "Connection is attached to the room and receives `{\"message_id\": <id>}` frames"),
        (status = 403, description = "Room identifier is invalid or names no room")
    )
)]
pub async fn room_gateway(
    identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let mut session = collab.open_session(identity.user_id);

    // The connection is never accepted for a room that cannot be routed to
    if session.attach(&RouteContext::with_room(room_id)).await.is_err() {
        return StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| run_session(socket, session))
}

/// Forwards the room's events to the client until either side goes away
async fn run_session(socket: WebSocket, mut session: ConnectionSession) {
    let Some(mut mailbox) = session.take_mailbox() else {
        return;
    };

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = mailbox.recv() => {
                // The session was detached elsewhere, for example by leaving the room
                let Some(event) = event else {
                    break;
                };

                let Some(frame) = session.handle_event(&event) else {
                    continue;
                };

                if sender.send(Message::Text(frame.to_text())).await.is_err() {
                    break;
                }
            }
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => session.handle_data(&text),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!(
        "Connection of user {} to room {:?} ended",
        session.user_id(),
        session.room_id()
    );

    session.close();
    let _ = sender.close().await;
}
