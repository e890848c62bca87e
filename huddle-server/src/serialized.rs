//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use huddle_collab::{AttachmentData, MessageData, PrimaryKey, RoomData};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    id: PrimaryKey,
    name: String,
    max_members: i64,
    /// User ids of the members, in the order they joined
    members: Vec<PrimaryKey>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    id: PrimaryKey,
    room_id: PrimaryKey,
    sender_id: PrimaryKey,
    text: String,
    /// RFC 3339 timestamp
    created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Attachment {
    id: PrimaryKey,
    message_id: PrimaryKey,
    /// One of `image`, `video` or `other`
    kind: String,
    path: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            name: self.name.clone(),
            max_members: self.max_members,
            members: self.members.clone(),
        }
    }
}

impl ToSerialized<Message> for MessageData {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            text: self.text.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Attachment> for AttachmentData {
    fn to_serialized(&self) -> Attachment {
        Attachment {
            id: self.id,
            message_id: self.message_id,
            kind: self.kind.to_string(),
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use huddle_collab::AttachmentKind;

    use super::*;

    #[test]
    fn test_serialized_room() {
        let room = RoomData {
            id: 3,
            name: "lobby".to_string(),
            max_members: 10,
            members: vec![1, 2],
        };

        let serialized: Room = room.to_serialized();
        let json = serde_json::to_value(serialized).unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "id": 3, "name": "lobby", "max_members": 10, "members": [1, 2] })
        );
    }

    #[test]
    fn test_serialized_attachments() {
        let attachments = vec![AttachmentData {
            id: 1,
            message_id: 2,
            kind: AttachmentKind::Video,
            path: "uploads/videos/2/abc-clip.mp4".to_string(),
        }];

        let serialized: Vec<Attachment> = attachments.to_serialized();
        let json = serde_json::to_value(serialized).unwrap();

        assert_eq!(json[0]["kind"], "video", "kind is named");
    }
}
