use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{Receiver, Sender};

/// The type used for primary keys of persisted rooms, users and messages.
pub type PrimaryKey = i64;

pub type EventSender = Sender<RoomEvent>;
pub type EventReceiver = Receiver<RoomEvent>;

/// Describes the events that are published to the live sessions of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RoomEvent {
    /// A message was persisted in the room.
    #[serde(rename = "chat.message")]
    ChatMessage { message_id: PrimaryKey },
    /// A user became a member of the room, or attached a session to it.
    UserJoined { user_id: PrimaryKey },
    /// A user's session detached from the room.
    UserLeft { user_id: PrimaryKey },
}

impl RoomEvent {
    /// Returns the wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatMessage { .. } => "chat.message",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
        }
    }
}

/// The only frame sent to clients over a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message_id: PrimaryKey,
}

impl OutboundFrame {
    /// Encodes the frame as the text payload sent on the transport.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("frame serializes properly")
    }
}
