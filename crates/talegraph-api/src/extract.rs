//! Request extractors for the acting user.
//!
//! Authentication happens upstream; by the time a request arrives the
//! authenticated user id is in the `x-actor-id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use talegraph_core::node::UserId;

use crate::error::ErrorBody;

/// Header carrying the authenticated user id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Why the actor could not be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorRejection {
    /// The header is absent on a route that needs it.
    Missing,
    /// The header is not a user id.
    Invalid(String),
}

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Missing => ErrorBody {
                error: "missing_actor",
                message: format!("the {ACTOR_HEADER} header is required"),
            }
            .into_response_with(StatusCode::UNAUTHORIZED),
            Self::Invalid(value) => ErrorBody {
                error: "invalid_actor",
                message: format!("{ACTOR_HEADER} `{value}` is not a user id"),
            }
            .into_response_with(StatusCode::BAD_REQUEST),
        }
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Option<UserId>, ActorRejection> {
    let Some(value) = headers.get(ACTOR_HEADER) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| ActorRejection::Invalid(String::from_utf8_lossy(value.as_bytes()).into()))?;
    text.trim()
        .parse::<i64>()
        .map(|id| Some(UserId(id)))
        .map_err(|_| ActorRejection::Invalid(text.to_owned()))
}

/// The authenticated user; rejects the request if there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)?
            .map(Self)
            .ok_or(ActorRejection::Missing)
    }
}

/// The reading user, if any; anonymous readers are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub Option<UserId>);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(ACTOR_HEADER, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_actor_header_parses_user_id() {
        assert_eq!(actor_from_headers(&headers(Some(" 42 "))), Ok(Some(UserId(42))));
    }

    #[test]
    fn test_absent_header_is_anonymous() {
        assert_eq!(actor_from_headers(&headers(None)), Ok(None));
    }

    #[test]
    fn test_non_numeric_header_is_rejected() {
        assert_eq!(
            actor_from_headers(&headers(Some("alice"))),
            Err(ActorRejection::Invalid("alice".into()))
        );
    }

    #[test]
    fn test_rejections_map_to_status_codes() {
        assert_eq!(
            ActorRejection::Missing.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ActorRejection::Invalid("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
