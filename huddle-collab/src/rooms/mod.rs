mod membership;
mod session;

pub use membership::*;
pub use session::*;

use log::info;
use thiserror::Error;

use crate::{CollabContext, DatabaseError, NewRoom, PrimaryKey, RoomData};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("A room needs room for at least {minimum} members, got {requested}")]
    CapacityTooLow { requested: i64, minimum: i64 },
    #[error("Room name cannot be empty")]
    EmptyName,
    #[error("A room named {0} already exists")]
    NameTaken(String),
    #[error("Room {0} doesn't exist")]
    NotFound(PrimaryKey),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl RoomError {
    /// Returns true if the error is caused by bad input rather than a failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::CapacityTooLow { .. } | Self::EmptyName | Self::NameTaken(_)
        )
    }
}

/// The authoritative store of rooms and their members.
#[derive(Clone)]
pub struct RoomRegistry {
    context: CollabContext,
}

impl RoomRegistry {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Returns every room along with its members
    pub async fn list_rooms(&self) -> Result<Vec<RoomData>, RoomError> {
        Ok(self.context.database.list_rooms().await?)
    }

    /// Returns the rooms a user is a member of
    pub async fn rooms_of(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>, RoomError> {
        Ok(self.context.database.rooms_of_user(user_id).await?)
    }

    pub async fn room(&self, room_id: PrimaryKey) -> Result<RoomData, RoomError> {
        self.context
            .database
            .room_by_id(room_id)
            .await
            .map_err(room_error(room_id))
    }

    /// Creates a room with the given capacity, or the configured default.
    pub async fn create_room(
        &self,
        name: &str,
        max_members: Option<i64>,
    ) -> Result<RoomData, RoomError> {
        let config = &self.context.config;
        let name = name.trim();

        if name.is_empty() {
            return Err(RoomError::EmptyName);
        }

        let max_members = config.max_members_or_default(max_members);

        if !config.accepts_max_members(max_members) {
            return Err(RoomError::CapacityTooLow {
                requested: max_members,
                minimum: config.minimum_max_members,
            });
        }

        let room = self
            .context
            .database
            .create_room(NewRoom {
                name: name.to_string(),
                max_members,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict { value, .. } => RoomError::NameTaken(value),
                e => e.into(),
            })?;

        info!("Created room {} ({}) for {} members", room.name, room.id, max_members);

        Ok(room)
    }

    /// Adds a user to a room. Returns false if they already were a member.
    pub async fn add_member(
        &self,
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<bool, RoomError> {
        self.context
            .database
            .add_room_member(room_id, user_id)
            .await
            .map_err(room_error(room_id))
    }

    /// Removes a user from a room. Returns false if they weren't a member.
    pub async fn remove_member(
        &self,
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<bool, RoomError> {
        self.context
            .database
            .remove_room_member(room_id, user_id)
            .await
            .map_err(room_error(room_id))
    }

    pub async fn members(&self, room_id: PrimaryKey) -> Result<Vec<PrimaryKey>, RoomError> {
        self.room(room_id).await.map(|r| r.members)
    }
}

fn room_error(room_id: PrimaryKey) -> impl FnOnce(DatabaseError) -> RoomError {
    move |e| match e {
        e if e.is_not_found() => RoomError::NotFound(room_id),
        e => e.into(),
    }
}
