use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    rooms, schemas,
    serialized::{Attachment, Message, Room},
    ws,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        rooms::list_rooms,
        rooms::create_room,
        rooms::joined_rooms,
        rooms::room,
        rooms::join_room,
        rooms::leave_room,
        rooms::list_messages,
        rooms::create_message,
        rooms::list_attachments,
        rooms::upload_attachment,
        ws::room_gateway,
    ),
    components(schemas(
        Room,
        Message,
        Attachment,
        schemas::NewRoomSchema,
        schemas::NewMessageSchema
    )),
    modifiers(&Security),
    tags(
        (name = "rooms", description = "Rooms, their members, and live connections"),
        (name = "messages", description = "Messages and their attachments")
    ),
    info(description = "huddle-server exposes endpoints to chat in rooms of this huddle instance")
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <user id>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
