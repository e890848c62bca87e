use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use huddle_collab::{AttachmentError, DatabaseError, MessageError, RoomError};
use log::error;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Self::Unknown(message) = &self {
            error!("Request failed: {}", message);
        }

        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            e @ DatabaseError::NotFound { .. } => Self::NotFound(e.to_string()),
            e @ DatabaseError::Conflict { .. } => Self::Invalid(e.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::Db(e) => e.into(),
            e @ RoomError::NotFound(_) => Self::NotFound(e.to_string()),
            e if e.is_validation() => Self::Invalid(e.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<MessageError> for ServerError {
    fn from(value: MessageError) -> Self {
        match value {
            MessageError::Db(e) => e.into(),
            e @ MessageError::EmptyText => Self::Invalid(e.to_string()),
            e @ (MessageError::RoomNotFound(_) | MessageError::NotFound(_)) => {
                Self::NotFound(e.to_string())
            }
        }
    }
}

impl From<AttachmentError> for ServerError {
    fn from(value: AttachmentError) -> Self {
        match value {
            AttachmentError::Db(e) => e.into(),
            e @ AttachmentError::EmptyPayload => Self::Invalid(e.to_string()),
            e @ AttachmentError::MessageNotFound(_) => Self::NotFound(e.to_string()),
            e @ AttachmentError::Io(_) => Self::Unknown(e.to_string()),
        }
    }
}
