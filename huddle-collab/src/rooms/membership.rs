use log::info;

use huddle_core::{Mailbox, RoomEvent};

use crate::{CollabContext, PrimaryKey, RoomData};

use super::{RoomError, RoomRegistry, SessionId};

/// A session that is attached to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSession {
    pub room_id: PrimaryKey,
    pub user_id: PrimaryKey,
}

/// Carries out the side effects of users joining and leaving rooms, keeping the registry,
/// the broadcaster and the attached sessions in agreement.
#[derive(Clone)]
pub struct MembershipCoordinator {
    context: CollabContext,
    rooms: RoomRegistry,
}

impl MembershipCoordinator {
    pub fn new(context: &CollabContext, rooms: &RoomRegistry) -> Self {
        Self {
            context: context.clone(),
            rooms: rooms.clone(),
        }
    }

    /// Creates a room and makes the creator its first member
    pub async fn create_room(
        &self,
        creator_id: PrimaryKey,
        name: &str,
        max_members: Option<i64>,
    ) -> Result<RoomData, RoomError> {
        let room = self.rooms.create_room(name, max_members).await?;

        self.join(creator_id, room.id).await?;
        self.rooms.room(room.id).await
    }

    /// Adds a user to a room. Returns false if they already were a member.
    pub async fn join(&self, user_id: PrimaryKey, room_id: PrimaryKey) -> Result<bool, RoomError> {
        let added = self.rooms.add_member(room_id, user_id).await?;

        if added {
            info!("User {} joined room {}", user_id, room_id);

            self.context
                .broadcaster
                .publish(room_id, RoomEvent::UserJoined { user_id });
        }

        Ok(added)
    }

    /// Removes a user from a room, detaching any of their sessions attached to it.
    /// Returns false if they weren't a member.
    pub async fn leave(&self, user_id: PrimaryKey, room_id: PrimaryKey) -> Result<bool, RoomError> {
        let removed = self.rooms.remove_member(room_id, user_id).await?;

        for session_id in self.sessions_of(user_id, room_id) {
            self.detach(session_id);
        }

        if removed {
            info!("User {} left room {}", user_id, room_id);
        }

        Ok(removed)
    }

    /// Runs the disconnect sequence of a session: the rest of the room is told the user left,
    /// then the session stops receiving anything. Returns false if it wasn't attached.
    pub fn detach(&self, session_id: SessionId) -> bool {
        let Some((_, session)) = self.context.sessions.remove(&session_id) else {
            return false;
        };

        let broadcaster = &self.context.broadcaster;

        broadcaster.publish(
            session.room_id,
            RoomEvent::UserLeft {
                user_id: session.user_id,
            },
        );

        broadcaster.unsubscribe(session.room_id, session_id);
        broadcaster.unregister(session_id);

        info!(
            "User {} detached from room {} (session {})",
            session.user_id, session.room_id, session_id
        );

        true
    }

    /// Returns the sessions currently attached to a room
    pub fn sessions_in(&self, room_id: PrimaryKey) -> Vec<(SessionId, LiveSession)> {
        self.context
            .sessions
            .iter()
            .filter(|s| s.room_id == room_id)
            .map(|s| (*s.key(), *s.value()))
            .collect()
    }

    pub(crate) fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Makes the user a member of the room, then registers a session for them that receives
    /// the room's events. Only a new member is announced to the room.
    pub(crate) async fn attach(
        &self,
        user_id: PrimaryKey,
        room_id: PrimaryKey,
    ) -> Result<Mailbox, RoomError> {
        let added = self.rooms.add_member(room_id, user_id).await?;

        let broadcaster = &self.context.broadcaster;
        let mailbox = broadcaster.register();

        self.context
            .sessions
            .insert(mailbox.id, LiveSession { room_id, user_id });

        broadcaster.subscribe(room_id, mailbox.id);

        if added {
            broadcaster.publish(room_id, RoomEvent::UserJoined { user_id });
        }

        info!(
            "User {} attached to room {} (session {})",
            user_id, room_id, mailbox.id
        );

        Ok(mailbox)
    }

    /// Cleans up after a session that is going away, whether or not it is still attached
    pub(crate) fn release(&self, session_id: SessionId) {
        if !self.detach(session_id) {
            self.context.broadcaster.unregister(session_id);
        }
    }

    fn sessions_of(&self, user_id: PrimaryKey, room_id: PrimaryKey) -> Vec<SessionId> {
        self.context
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.room_id == room_id)
            .map(|s| *s.key())
            .collect()
    }
}
