use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError, SqlitePool,
};

use crate::{
    AttachmentData, Database, DatabaseError, IntoDatabaseError, MessageData,
    NewAttachment, NewMessage, NewRoom, PrimaryKey, Result, RoomData,
};

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS rooms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        max_members INTEGER NOT NULL DEFAULT 10 CHECK (max_members >= 2)
    )",
    "CREATE TABLE IF NOT EXISTS room_members (
        room_id INTEGER NOT NULL REFERENCES rooms (id),
        user_id INTEGER NOT NULL,
        UNIQUE (room_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id INTEGER NOT NULL REFERENCES rooms (id),
        sender_id INTEGER NOT NULL,
        text TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, created_at, id)",
    "CREATE TABLE IF NOT EXISTS attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id INTEGER NOT NULL REFERENCES messages (id),
        kind TEXT NOT NULL,
        path TEXT NOT NULL
    )",
];

/// A sqlite database implementation for huddle
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connects to the database at the url and creates the schema if needed.
    /// `sqlite::memory:` gives a private database that lives as long as this value.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| e.any())?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database would get its own, empty database
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        for statement in SCHEMA {
            query(statement)
                .execute(&pool)
                .await
                .map_err(|e| e.any())?;
        }

        info!("Connected to database at {}", url);

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        let mut rooms: Vec<RoomData> = query_as("SELECT id, name, max_members FROM rooms")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        for room in rooms.iter_mut() {
            room.members = self.room_members(room.id).await?
        }

        Ok(rooms)
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let mut room: RoomData = query_as("SELECT id, name, max_members FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?;

        room.members = self.room_members(room_id).await?;

        Ok(room)
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let (id,): (PrimaryKey,) =
            query_as("INSERT INTO rooms (name, max_members) VALUES (?, ?) RETURNING id")
                .bind(&new_room.name)
                .bind(new_room.max_members)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| e.conflict_or("room", "name", &new_room.name))?;

        self.room_by_id(id).await
    }

    async fn rooms_of_user(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>> {
        let mut rooms: Vec<RoomData> = query_as(
            "SELECT rooms.id, rooms.name, rooms.max_members FROM rooms
            JOIN room_members ON room_members.room_id = rooms.id
            WHERE room_members.user_id = ?
            ORDER BY rooms.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        for room in rooms.iter_mut() {
            room.members = self.room_members(room.id).await?
        }

        Ok(rooms)
    }

    async fn room_members(&self, room_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        let rows: Vec<(PrimaryKey,)> =
            query_as("SELECT user_id FROM room_members WHERE room_id = ? ORDER BY rowid")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }

    async fn add_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool> {
        // Ensure room exists
        self.ensure_room(room_id).await?;

        let result = query("INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?, ?)")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_room_member(
        &self,
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<bool> {
        // Ensure room exists
        self.ensure_room(room_id).await?;

        let result = query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(result.rows_affected() > 0)
    }

    async fn message_by_id(&self, message_id: PrimaryKey) -> Result<MessageData> {
        query_as("SELECT id, room_id, sender_id, text, created_at FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("message", "id"))
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let created_at = Utc::now();

        let (id,): (PrimaryKey,) = query_as(
            "INSERT INTO messages (room_id, sender_id, text, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id",
        )
        .bind(new_message.room_id)
        .bind(new_message.sender_id)
        .bind(&new_message.text)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(MessageData {
            id,
            room_id: new_message.room_id,
            sender_id: new_message.sender_id,
            text: new_message.text,
            created_at,
        })
    }

    async fn list_messages(&self, room_id: PrimaryKey) -> Result<Vec<MessageData>> {
        query_as(
            "SELECT id, room_id, sender_id, text, created_at FROM messages
            WHERE room_id = ?
            ORDER BY created_at, id",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_attachment(&self, new_attachment: NewAttachment) -> Result<AttachmentData> {
        let (id,): (PrimaryKey,) = query_as(
            "INSERT INTO attachments (message_id, kind, path) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(new_attachment.message_id)
        .bind(new_attachment.kind.as_str())
        .bind(&new_attachment.path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(AttachmentData {
            id,
            message_id: new_attachment.message_id,
            kind: new_attachment.kind,
            path: new_attachment.path,
        })
    }

    async fn list_attachments(&self, message_id: PrimaryKey) -> Result<Vec<AttachmentData>> {
        let rows: Vec<(PrimaryKey, PrimaryKey, String, String)> = query_as(
            "SELECT id, message_id, kind, path FROM attachments WHERE message_id = ? ORDER BY id",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.into_iter()
            .map(|(id, message_id, kind, path)| -> Result<AttachmentData> {
                Ok(AttachmentData {
                    id,
                    message_id,
                    kind: kind.parse().map_err(|e| DatabaseError::Internal(Box::new(e)))?,
                    path,
                })
            })
            .collect()
    }
}

impl SqliteDatabase {
    async fn ensure_room(&self, room_id: PrimaryKey) -> Result<()> {
        query("SELECT id FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))
            .map(|_| ())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str) -> DatabaseError {
        let is_unique_violation = self
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or_default();

        if is_unique_violation {
            DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }
        } else {
            self.any()
        }
    }
}

#[cfg(test)]
pub(crate) async fn memory_database() -> SqliteDatabase {
    SqliteDatabase::new("sqlite::memory:")
        .await
        .expect("in-memory database connects")
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_room(name: &str) -> NewRoom {
        NewRoom {
            name: name.to_string(),
            max_members: 5,
        }
    }

    #[tokio::test]
    async fn test_room_names_are_unique() {
        let db = memory_database().await;

        let room = db.create_room(new_room("lobby")).await.unwrap();
        assert_eq!(room.name, "lobby");
        assert!(room.members.is_empty(), "new room has no members");

        let result = db.create_room(new_room("lobby")).await;
        assert!(
            matches!(result, Err(DatabaseError::Conflict { field: "name", .. })),
            "duplicate name is a conflict"
        );
    }

    #[tokio::test]
    async fn test_members_are_unique() {
        let db = memory_database().await;
        let room = db.create_room(new_room("lobby")).await.unwrap();

        assert!(db.add_room_member(room.id, 1).await.unwrap(), "first add inserts");
        assert!(!db.add_room_member(room.id, 1).await.unwrap(), "second add is ignored");
        assert_eq!(db.room_members(room.id).await.unwrap(), vec![1]);

        assert!(db.remove_room_member(room.id, 1).await.unwrap(), "remove deletes");
        assert!(!db.remove_room_member(room.id, 1).await.unwrap(), "second remove is ignored");

        let missing = db.add_room_member(room.id + 100, 1).await;
        assert!(
            matches!(missing, Err(e) if e.is_not_found()),
            "adding to a missing room is not found"
        );
    }

    #[tokio::test]
    async fn test_rooms_of_user() {
        let db = memory_database().await;
        let lobby = db.create_room(new_room("lobby")).await.unwrap();
        let games = db.create_room(new_room("games")).await.unwrap();
        db.create_room(new_room("music")).await.unwrap();

        db.add_room_member(lobby.id, 1).await.unwrap();
        db.add_room_member(games.id, 1).await.unwrap();
        db.add_room_member(games.id, 2).await.unwrap();

        let rooms = db.rooms_of_user(1).await.unwrap();
        let names: Vec<_> = rooms.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["lobby", "games"], "only joined rooms are listed");
        assert_eq!(rooms[1].members, vec![1, 2], "members are filled in");
        assert!(db.rooms_of_user(3).await.unwrap().is_empty(), "stranger has no rooms");
    }

    #[tokio::test]
    async fn test_messages_are_ordered() {
        let db = memory_database().await;
        let room = db.create_room(new_room("lobby")).await.unwrap();

        for text in ["one", "two", "three"] {
            db.create_message(NewMessage {
                room_id: room.id,
                sender_id: 1,
                text: text.to_string(),
            })
            .await
            .unwrap();
        }

        let texts: Vec<_> = db
            .list_messages(room.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();

        assert_eq!(texts, vec!["one", "two", "three"], "oldest message comes first");
    }

    #[tokio::test]
    async fn test_capacity_is_checked_by_schema() {
        let db = memory_database().await;

        let result = db
            .create_room(NewRoom {
                name: "solo".to_string(),
                max_members: 1,
            })
            .await;

        assert!(result.is_err(), "schema rejects a capacity below two");
    }
}
