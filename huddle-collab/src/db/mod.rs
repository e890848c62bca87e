use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::AttachmentKind;

mod data;
pub use data::*;

mod sqlite;
pub use sqlite::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type ArcedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Represents the store that persists rooms, their members, and their messages.
///
/// Every mutation here touches a single row, so implementors only need
/// row-level atomicity for the membership invariants to hold.
#[async_trait]
pub trait Database: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    /// Returns the rooms a user is a member of
    async fn rooms_of_user(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>>;

    async fn room_members(&self, room_id: PrimaryKey) -> Result<Vec<PrimaryKey>>;
    /// Adds a member, returning false if they already were one
    async fn add_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool>;
    /// Removes a member, returning false if they weren't one
    async fn remove_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey)
        -> Result<bool>;

    async fn message_by_id(&self, message_id: PrimaryKey) -> Result<MessageData>;
    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData>;
    /// Returns the messages of a room, oldest first
    async fn list_messages(&self, room_id: PrimaryKey) -> Result<Vec<MessageData>>;

    async fn create_attachment(&self, new_attachment: NewAttachment) -> Result<AttachmentData>;
    async fn list_attachments(&self, message_id: PrimaryKey) -> Result<Vec<AttachmentData>>;
}

#[derive(Debug)]
pub struct NewRoom {
    pub name: String,
    pub max_members: i64,
}

#[derive(Debug)]
pub struct NewMessage {
    pub room_id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub text: String,
}

#[derive(Debug)]
pub struct NewAttachment {
    pub message_id: PrimaryKey,
    pub kind: AttachmentKind,
    pub path: String,
}
