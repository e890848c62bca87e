use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub use huddle_core::PrimaryKey;

use crate::AttachmentKind;

/// A chat room
#[derive(Debug, Clone, FromRow)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// Unique display name
    pub name: String,
    /// The capacity the room was created with. Not enforced when joining.
    pub max_members: i64,
    /// The user ids of the members, in the order they joined
    #[sqlx(skip)]
    pub members: Vec<PrimaryKey>,
}

/// A message posted in a room
#[derive(Debug, Clone, FromRow)]
pub struct MessageData {
    pub id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub text: String,
    /// Assigned when the message is stored
    pub created_at: DateTime<Utc>,
}

/// A file attached to a message
#[derive(Debug, Clone)]
pub struct AttachmentData {
    pub id: PrimaryKey,
    pub message_id: PrimaryKey,
    pub kind: AttachmentKind,
    /// Where the payload is stored
    pub path: String,
}
