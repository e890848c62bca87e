use log::{debug, trace};
use thiserror::Error;

use huddle_core::{Mailbox, MailboxId, OutboundFrame, RoomEvent};

use crate::PrimaryKey;

use super::{MembershipCoordinator, RoomError};

pub type SessionId = MailboxId;

/// The lifecycle of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opened, but not routed to a room yet
    Unattached,
    /// Bound to exactly one room and receiving its events
    Attached { room_id: PrimaryKey },
    /// Terminal
    Closed,
}

/// What the transport knows about where a connection was routed
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    pub room_id: Option<String>,
}

impl RouteContext {
    pub fn with_room(room_id: impl ToString) -> Self {
        Self {
            room_id: Some(room_id.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Connection was not routed to a room")]
    MissingRoom,
    #[error("{0} is not a valid room identifier")]
    InvalidRoom(String),
    #[error("Room {0} doesn't exist")]
    UnknownRoom(PrimaryKey),
    #[error("Session can only be attached once")]
    NotAttachable,
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// One live connection of a user. It is attached to at most one room, and detaches from it
/// when closed or dropped.
pub struct ConnectionSession {
    id: SessionId,
    user_id: PrimaryKey,
    state: SessionState,
    mailbox: Option<Mailbox>,
    membership: MembershipCoordinator,
}

impl ConnectionSession {
    pub fn new(membership: &MembershipCoordinator, user_id: PrimaryKey) -> Self {
        Self {
            id: SessionId::none(),
            user_id,
            state: SessionState::Unattached,
            mailbox: None,
            membership: membership.clone(),
        }
    }

    /// Routes the session to the room named by the route context. The user becomes a member
    /// of the room if they weren't already.
    ///
    /// If the route names no usable room the session is closed without ever being registered,
    /// and the connection is expected to be dropped without a response.
    pub async fn attach(&mut self, route: &RouteContext) -> Result<PrimaryKey, RoutingError> {
        if self.state != SessionState::Unattached {
            return Err(RoutingError::NotAttachable);
        }

        let (room_id, mailbox) = match self.route(route).await {
            Ok(routed) => routed,
            Err(e) => {
                debug!("Rejected connection of user {}: {}", self.user_id, e);
                self.state = SessionState::Closed;

                return Err(e);
            }
        };

        self.id = mailbox.id;
        self.mailbox = Some(mailbox);
        self.state = SessionState::Attached { room_id };

        Ok(room_id)
    }

    /// Handles a data frame sent by the client. Nothing is done with them yet.
    pub fn handle_data(&self, data: &str) {
        if let SessionState::Attached { room_id } = self.state {
            trace!(
                "Ignoring {} bytes from session {} in room {}",
                data.len(),
                self.id,
                room_id
            );
        }
    }

    /// Converts a room event into the frame sent to the client, if it has one.
    pub fn handle_event(&self, event: &RoomEvent) -> Option<OutboundFrame> {
        match event {
            RoomEvent::ChatMessage { message_id } => Some(OutboundFrame {
                message_id: *message_id,
            }),
            RoomEvent::UserJoined { .. } | RoomEvent::UserLeft { .. } => None,
        }
    }

    /// Takes the mailbox out of the session, so it can be polled alongside the transport.
    pub fn take_mailbox(&mut self) -> Option<Mailbox> {
        self.mailbox.take()
    }

    /// Closes the session, detaching it if it is attached.
    pub fn close(&mut self) {
        if let SessionState::Attached { .. } = self.state {
            self.membership.release(self.id);
        }

        self.mailbox = None;
        self.state = SessionState::Closed;
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> PrimaryKey {
        self.user_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room_id(&self) -> Option<PrimaryKey> {
        match self.state {
            SessionState::Attached { room_id } => Some(room_id),
            _ => None,
        }
    }

    async fn route(&self, route: &RouteContext) -> Result<(PrimaryKey, Mailbox), RoutingError> {
        let raw = route.room_id.as_deref().ok_or(RoutingError::MissingRoom)?;

        let room_id: PrimaryKey = raw
            .trim()
            .parse()
            .map_err(|_| RoutingError::InvalidRoom(raw.to_string()))?;

        match self.membership.attach(self.user_id, room_id).await {
            Ok(mailbox) => Ok((room_id, mailbox)),
            Err(RoomError::NotFound(_)) => Err(RoutingError::UnknownRoom(room_id)),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.close()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_collab;

    #[tokio::test]
    async fn test_bad_routes_close_the_session() {
        let collab = test_collab().await;
        let room = collab.rooms.create_room("lobby", None).await.unwrap();

        let routes = [
            (RouteContext::default(), "missing"),
            (RouteContext::with_room("lobby"), "invalid"),
            (RouteContext::with_room(room.id + 1), "unknown"),
        ];

        for (route, label) in routes {
            let mut session = collab.open_session(1);
            let result = session.attach(&route).await;

            assert!(result.is_err(), "{} room is rejected", label);
            assert_eq!(session.state(), SessionState::Closed, "{} room closes", label);
            assert!(session.take_mailbox().is_none(), "{} room registers nothing", label);
        }

        assert!(
            collab.broadcaster().subscribers(room.id).is_empty(),
            "no subscriber entry is left behind"
        );
    }

    #[tokio::test]
    async fn test_attach_subscribes() {
        let collab = test_collab().await;
        let room = collab.rooms.create_room("lobby", None).await.unwrap();

        let mut session = collab.open_session(1);
        let room_id = session.attach(&RouteContext::with_room(room.id)).await.unwrap();

        assert_eq!(room_id, room.id);
        assert_eq!(session.state(), SessionState::Attached { room_id });
        assert_eq!(session.room_id(), Some(room.id));
        assert_eq!(collab.broadcaster().room_of(session.id()), Some(room.id));

        let again = session.attach(&RouteContext::with_room(room.id)).await;
        assert!(
            matches!(again, Err(RoutingError::NotAttachable)),
            "attached session cannot be routed again"
        );
        assert_eq!(session.room_id(), Some(room.id), "failed re-route keeps the room");
    }

    #[tokio::test]
    async fn test_attach_makes_the_user_a_member() {
        let collab = test_collab().await;
        let room = collab.membership.create_room(1, "lobby", None).await.unwrap();

        let mut watcher = collab.open_session(1);
        watcher.attach(&RouteContext::with_room(room.id)).await.unwrap();
        let mut mailbox = watcher.take_mailbox().unwrap();

        let mut newcomer = collab.open_session(2);
        newcomer.attach(&RouteContext::with_room(room.id)).await.unwrap();

        let mut members = collab.rooms.members(room.id).await.unwrap();
        members.sort();
        assert_eq!(members, vec![1, 2], "attaching joins the room");
        assert_eq!(
            mailbox.drain(),
            vec![RoomEvent::UserJoined { user_id: 2 }],
            "a new member is announced"
        );

        let mut second_tab = collab.open_session(2);
        second_tab.attach(&RouteContext::with_room(room.id)).await.unwrap();

        assert!(mailbox.drain().is_empty(), "an existing member is not announced again");
        assert_eq!(collab.rooms.members(room.id).await.unwrap().len(), 2);
        assert_eq!(collab.broadcaster().subscribers(room.id).len(), 3);
    }

    #[tokio::test]
    async fn test_drop_notifies_the_room() {
        let collab = test_collab().await;
        let room = collab.rooms.create_room("lobby", None).await.unwrap();

        let mut first = collab.open_session(1);
        let mut second = collab.open_session(2);
        let mut third = collab.open_session(3);

        for session in [&mut first, &mut second, &mut third] {
            session.attach(&RouteContext::with_room(room.id)).await.unwrap();
        }

        let mut second_mailbox = second.take_mailbox().unwrap();
        let mut third_mailbox = third.take_mailbox().unwrap();
        second_mailbox.drain();
        third_mailbox.drain();

        let first_id = first.id();
        drop(first);

        let left = RoomEvent::UserLeft { user_id: 1 };
        assert_eq!(second_mailbox.drain(), vec![left.clone()], "second is told");
        assert_eq!(third_mailbox.drain(), vec![left], "third is told");

        let subscribers = collab.broadcaster().subscribers(room.id);
        assert!(!subscribers.contains(&first_id), "dropped session is unsubscribed");
        assert_eq!(subscribers.len(), 2);
        assert!(!collab.broadcaster().is_registered(first_id), "mailbox is gone");
    }

    #[tokio::test]
    async fn test_event_frames() {
        let collab = test_collab().await;
        let session = collab.open_session(1);

        assert_eq!(
            session.handle_event(&RoomEvent::ChatMessage { message_id: 9 }),
            Some(OutboundFrame { message_id: 9 }),
            "chat messages become frames"
        );
        assert_eq!(session.handle_event(&RoomEvent::UserJoined { user_id: 2 }), None);
        assert_eq!(session.handle_event(&RoomEvent::UserLeft { user_id: 2 }), None);

        session.handle_data("hello");
    }
}
