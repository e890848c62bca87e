use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use lazy_static::lazy_static;
use log::info;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;
use thiserror::Error;
use tokio::fs;

use crate::{AttachmentData, CollabContext, DatabaseError, NewAttachment, PrimaryKey};

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "heic"];
const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "webm", "mov", "mkv", "avi", "m4v"];

/// Keeps two uploads of the same file name to the same message apart
const PREFIX_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 100;

lazy_static! {
    static ref UNSAFE_CHARACTERS: Regex =
        Regex::new(r"[^A-Za-z0-9._-]+").expect("filename pattern is valid");
}

/// What an attachment contains, which decides where it is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Video,
    Other,
}

#[derive(Debug, Error)]
#[error("Unknown attachment kind {0}")]
pub struct UnknownAttachmentKind(String);

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Attachment is empty")]
    EmptyPayload,
    #[error("Message {0} doesn't exist")]
    MessageNotFound(PrimaryKey),
    #[error("Failed to write attachment: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// A file uploaded for a message
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Stores the files attached to messages.
#[derive(Clone)]
pub struct Attachments {
    context: CollabContext,
    upload_dir: PathBuf,
}

impl AttachmentKind {
    /// Classifies a file by its mime type, falling back to the file extension
    /// when the mime type is missing or says nothing useful.
    pub fn classify(filename: &str, content_type: Option<&str>) -> Self {
        let essence = content_type
            .and_then(|c| c.split(';').next())
            .map(|c| c.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if essence.starts_with("image/") {
            return Self::Image;
        }

        if essence.starts_with("video/") {
            return Self::Video;
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Self::Video
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Other => "other",
        }
    }

    /// The directory under the upload directory this kind is stored in
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
            Self::Other => "files",
        }
    }
}

impl Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentKind {
    type Err = UnknownAttachmentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "other" => Ok(Self::Other),
            other => Err(UnknownAttachmentKind(other.to_string())),
        }
    }
}

/// Reduces a client supplied file name to something safe to put on disk
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let sanitized = UNSAFE_CHARACTERS.replace_all(name, "_");
    let sanitized: String = sanitized
        .trim_matches(|c| c == '.' || c == '_')
        .chars()
        .take(MAX_NAME_LENGTH)
        .collect();

    if sanitized.is_empty() {
        "attachment".to_string()
    } else {
        sanitized
    }
}

/// Returns where an attachment of a message is stored:
/// `<upload_dir>/<kind directory>/<message id>/<prefix>-<name>`
pub fn storage_path(
    upload_dir: &Path,
    kind: AttachmentKind,
    message_id: PrimaryKey,
    filename: &str,
) -> PathBuf {
    let prefix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PREFIX_LENGTH)
        .map(char::from)
        .collect();

    upload_dir
        .join(kind.directory())
        .join(message_id.to_string())
        .join(format!("{}-{}", prefix, sanitize_filename(filename)))
}

impl Attachments {
    pub fn new(context: &CollabContext, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            context: context.clone(),
            upload_dir: upload_dir.into(),
        }
    }

    /// Writes an upload to disk and records it as an attachment of a message in the room.
    pub async fn store(
        &self,
        room_id: PrimaryKey,
        message_id: PrimaryKey,
        upload: NewUpload,
    ) -> Result<AttachmentData, AttachmentError> {
        if upload.bytes.is_empty() {
            return Err(AttachmentError::EmptyPayload);
        }

        self.ensure_message(room_id, message_id).await?;

        let kind = AttachmentKind::classify(&upload.filename, upload.content_type.as_deref());
        let path = storage_path(&self.upload_dir, kind, message_id, &upload.filename);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, &upload.bytes).await?;

        let attachment = self
            .context
            .database
            .create_attachment(NewAttachment {
                message_id,
                kind,
                path: path.to_string_lossy().into_owned(),
            })
            .await?;

        info!(
            "Stored {} attachment {} ({} bytes) for message {}",
            kind,
            attachment.id,
            upload.bytes.len(),
            message_id
        );

        Ok(attachment)
    }

    /// Returns the attachments of a message in the room
    pub async fn attachments(
        &self,
        room_id: PrimaryKey,
        message_id: PrimaryKey,
    ) -> Result<Vec<AttachmentData>, AttachmentError> {
        self.ensure_message(room_id, message_id).await?;

        Ok(self.context.database.list_attachments(message_id).await?)
    }

    async fn ensure_message(
        &self,
        room_id: PrimaryKey,
        message_id: PrimaryKey,
    ) -> Result<(), AttachmentError> {
        let message = self
            .context
            .database
            .message_by_id(message_id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => AttachmentError::MessageNotFound(message_id),
                e => AttachmentError::Db(e),
            })?;

        // A message is only reachable through the room it was posted in
        if message.room_id != room_id {
            return Err(AttachmentError::MessageNotFound(message_id));
        }

        Ok(())
    }
}
