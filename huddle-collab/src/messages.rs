use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use thiserror::Error;
use tokio::sync::Mutex;

use huddle_core::RoomEvent;

use crate::{CollabContext, DatabaseError, MessageData, NewMessage, PrimaryKey};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Message text cannot be empty")]
    EmptyText,
    #[error("Room {0} doesn't exist")]
    RoomNotFound(PrimaryKey),
    #[error("Message {0} doesn't exist")]
    NotFound(PrimaryKey),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// Persists messages and hands them to the broadcaster.
#[derive(Clone)]
pub struct MessagePipeline {
    context: CollabContext,
    /// Held across persist and publish, so a room's messages are published in creation order
    writers: Arc<DashMap<PrimaryKey, Arc<Mutex<()>>>>,
}

impl MessagePipeline {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            writers: Default::default(),
        }
    }

    /// Stores a message and publishes it to every session attached to the room.
    pub async fn create_message(
        &self,
        room_id: PrimaryKey,
        sender_id: PrimaryKey,
        text: &str,
    ) -> Result<MessageData, MessageError> {
        if text.trim().is_empty() {
            return Err(MessageError::EmptyText);
        }

        self.ensure_room(room_id).await?;

        let writer = self.writers.entry(room_id).or_default().value().clone();
        let _guard = writer.lock().await;

        let message = self
            .context
            .database
            .create_message(NewMessage {
                room_id,
                sender_id,
                text: text.to_string(),
            })
            .await?;

        let delivered = self.context.broadcaster.publish(
            room_id,
            RoomEvent::ChatMessage {
                message_id: message.id,
            },
        );

        debug!(
            "Message {} from user {} in room {} delivered to {} sessions",
            message.id, sender_id, room_id, delivered
        );

        Ok(message)
    }

    /// Returns the messages of a room, oldest first
    pub async fn messages(&self, room_id: PrimaryKey) -> Result<Vec<MessageData>, MessageError> {
        self.ensure_room(room_id).await?;

        Ok(self.context.database.list_messages(room_id).await?)
    }

    pub async fn message(&self, message_id: PrimaryKey) -> Result<MessageData, MessageError> {
        self.context
            .database
            .message_by_id(message_id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => MessageError::NotFound(message_id),
                e => e.into(),
            })
    }

    async fn ensure_room(&self, room_id: PrimaryKey) -> Result<(), MessageError> {
        self.context
            .database
            .room_by_id(room_id)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                e if e.is_not_found() => MessageError::RoomNotFound(room_id),
                e => e.into(),
            })
    }
}

#[cfg(test)]
mod test {
    use futures_util::future::join_all;
    use huddle_core::OutboundFrame;

    use super::*;
    use crate::{test_collab, RouteContext};

    #[tokio::test]
    async fn test_message_reaches_live_sessions() {
        let collab = test_collab().await;
        let room = collab.rooms.create_room("R1", Some(5)).await.unwrap();

        collab.membership.join(1, room.id).await.unwrap();
        collab.membership.join(2, room.id).await.unwrap();

        let mut a = collab.open_session(1);
        let mut b = collab.open_session(2);
        a.attach(&RouteContext::with_room(room.id)).await.unwrap();
        b.attach(&RouteContext::with_room(room.id)).await.unwrap();

        let mut a_mailbox = a.take_mailbox().unwrap();
        let mut b_mailbox = b.take_mailbox().unwrap();

        let message = collab.messages.create_message(room.id, 1, "hi").await.unwrap();
        let expected = OutboundFrame {
            message_id: message.id,
        };

        let frames = |events: Vec<RoomEvent>, session: &crate::ConnectionSession| -> Vec<_> {
            events.iter().filter_map(|e| session.handle_event(e)).collect()
        };

        assert_eq!(frames(a_mailbox.drain(), &a), vec![expected], "sender receives the frame");
        assert_eq!(frames(b_mailbox.drain(), &b), vec![expected], "other member receives it");
        assert_eq!(expected.to_text(), format!(r#"{{"message_id":{}}}"#, message.id));
    }

    #[tokio::test]
    async fn test_invalid_messages() {
        let collab = test_collab().await;
        let room = collab.rooms.create_room("lobby", None).await.unwrap();

        let empty = collab.messages.create_message(room.id, 1, "  \n").await;
        assert!(matches!(empty, Err(MessageError::EmptyText)), "blank text is rejected");

        let missing = collab.messages.create_message(room.id + 1, 1, "hi").await;
        assert!(
            matches!(missing, Err(MessageError::RoomNotFound(_))),
            "unknown room is not found"
        );

        assert!(
            collab.messages.messages(room.id).await.unwrap().is_empty(),
            "nothing is stored"
        );
    }

    #[tokio::test]
    async fn test_publish_order_follows_creation() {
        let collab = test_collab().await;
        let room = collab.rooms.create_room("lobby", None).await.unwrap();

        let mut session = collab.open_session(1);
        session.attach(&RouteContext::with_room(room.id)).await.unwrap();
        let mut mailbox = session.take_mailbox().unwrap();
        mailbox.drain();

        let texts: Vec<_> = (0..10).map(|i| i.to_string()).collect();
        let sends = texts.iter().map(|t| collab.messages.create_message(room.id, 1, t));
        join_all(sends).await;

        let stored: Vec<_> = collab
            .messages
            .messages(room.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| RoomEvent::ChatMessage { message_id: m.id })
            .collect();

        assert_eq!(stored.len(), 10, "every message is stored");
        assert_eq!(mailbox.drain(), stored, "published in the order they were stored");

        let first = match stored[0] {
            RoomEvent::ChatMessage { message_id } => message_id,
            _ => unreachable!(),
        };
        assert_eq!(collab.messages.message(first).await.unwrap().room_id, room.id);
        assert!(matches!(
            collab.messages.message(first + 100).await,
            Err(MessageError::NotFound(_))
        ));
    }
}
