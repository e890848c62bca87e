use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use huddle_collab::PrimaryKey;
use serde::Deserialize;

/// The already verified user making a request.
///
/// Taken from `Authorization: Bearer <user id>`, or from `?token=<user id>` since browsers
/// cannot set headers on websocket requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: PrimaryKey,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers)? {
            Some(token) => token,
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|q| q.0.token)
                .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?,
        };

        let user_id = token
            .trim()
            .parse()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token"))?;

        Ok(Self { user_id })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, (StatusCode, &'static str)> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Authorization must be Bearer"))?;

    let parts: Vec<_> = value.split_ascii_whitespace().collect();

    if parts.first() != Some(&"Bearer") {
        return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
    }

    Ok(parts.last().map(|t| t.to_string()))
}
