use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json,
};
use huddle_collab::{Collab, NewUpload, PrimaryKey};

use crate::{
    auth::Identity,
    errors::ServerResult,
    schemas::{AttachmentQuery, NewMessageSchema, NewRoomSchema, ValidatedJson},
    serialized::{Attachment, Message, Room, ToSerialized},
    ws, Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
pub async fn list_rooms(
    _identity: Identity,
    State(collab): State<Arc<Collab>>,
) -> ServerResult<Json<Vec<Room>>> {
    let rooms = collab.rooms.list_rooms().await?;

    Ok(Json(rooms.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/joined",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Room>, description = "Rooms the caller is a member of")
    )
)]
pub async fn joined_rooms(
    identity: Identity,
    State(collab): State<Arc<Collab>>,
) -> ServerResult<Json<Vec<Room>>> {
    let rooms = collab.rooms.rooms_of(identity.user_id).await?;

    Ok(Json(rooms.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room, description = "Room was created with the caller as its first member"),
        (status = 400, description = "Capacity is below 2 or the name is taken")
    )
)]
pub async fn create_room(
    identity: Identity,
    State(collab): State<Arc<Collab>>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = collab
        .membership
        .create_room(identity.user_id, &body.name, body.max_members)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    params(("id" = i64, Path, description = "Room id")),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room),
        (status = 404, description = "Room does not exist")
    )
)]
pub async fn room(
    _identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path(room_id): Path<PrimaryKey>,
) -> ServerResult<Json<Room>> {
    let room = collab.rooms.room(room_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    params(("id" = i64, Path, description = "Room id")),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room, description = "Caller is a member of the room"),
        (status = 404, description = "Room does not exist")
    )
)]
pub async fn join_room(
    identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path(room_id): Path<PrimaryKey>,
) -> ServerResult<Json<Room>> {
    collab.membership.join(identity.user_id, room_id).await?;
    let room = collab.rooms.room(room_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    params(("id" = i64, Path, description = "Room id")),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room, description = "Caller is no longer a member of the room"),
        (status = 404, description = "Room does not exist")
    )
)]
pub async fn leave_room(
    identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path(room_id): Path<PrimaryKey>,
) -> ServerResult<Json<Room>> {
    collab.membership.leave(identity.user_id, room_id).await?;
    let room = collab.rooms.room(room_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/messages",
    tag = "messages",
    params(("id" = i64, Path, description = "Room id")),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Message>, description = "Messages of the room, oldest first"),
        (status = 404, description = "Room does not exist")
    )
)]
pub async fn list_messages(
    _identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path(room_id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<Message>>> {
    let messages = collab.messages.messages(room_id).await?;

    Ok(Json(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/messages",
    tag = "messages",
    request_body = NewMessageSchema,
    params(("id" = i64, Path, description = "Room id")),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message, description = "Message was stored and sent to the room"),
        (status = 400, description = "Text is empty"),
        (status = 404, description = "Room does not exist")
    )
)]
pub async fn create_message(
    identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path(room_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<NewMessageSchema>,
) -> ServerResult<Json<Message>> {
    let message = collab
        .messages
        .create_message(room_id, identity.user_id, &body.text)
        .await?;

    Ok(Json(message.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/messages/{message_id}/attachments",
    tag = "messages",
    params(
        ("id" = i64, Path, description = "Room id"),
        ("message_id" = i64, Path, description = "Message id")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Attachment>),
        (status = 404, description = "Message does not exist in the room")
    )
)]
pub async fn list_attachments(
    _identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path((room_id, message_id)): Path<(PrimaryKey, PrimaryKey)>,
) -> ServerResult<Json<Vec<Attachment>>> {
    let attachments = collab.attachments.attachments(room_id, message_id).await?;

    Ok(Json(attachments.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/messages/{message_id}/attachments",
    tag = "messages",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    params(
        ("id" = i64, Path, description = "Room id"),
        ("message_id" = i64, Path, description = "Message id"),
        AttachmentQuery
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Attachment, description = "Attachment was stored"),
        (status = 400, description = "Payload is empty"),
        (status = 404, description = "Message does not exist in the room")
    )
)]
pub async fn upload_attachment(
    _identity: Identity,
    State(collab): State<Arc<Collab>>,
    Path((room_id, message_id)): Path<(PrimaryKey, PrimaryKey)>,
    Query(query): Query<AttachmentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<Attachment>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|c| c.to_str().ok())
        .map(|c| c.to_string());

    let attachment = collab
        .attachments
        .store(
            room_id,
            message_id,
            NewUpload {
                filename: query.filename,
                content_type,
                bytes: body.to_vec(),
            },
        )
        .await?;

    Ok(Json(attachment.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/joined", get(joined_rooms))
        .route("/:id", get(room))
        .route("/:id/members", post(join_room).delete(leave_room))
        .route("/:id/messages", get(list_messages).post(create_message))
        .route(
            "/:id/messages/:message_id/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route("/:id/ws", get(ws::room_gateway))
}
