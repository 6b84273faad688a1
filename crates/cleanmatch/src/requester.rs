use axum::http::request::Parts;
use axum::response::Response;

use crate::directory::UserId;
use crate::error::{error_response, ErrorKind};

/// Header carrying the caller's directory id. Authentication happens upstream.
pub const REQUESTER_HEADER: &str = "x-user-id";

/// Identity of the caller making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester(pub UserId);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(REQUESTER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Requester(UserId::new(value)))
            .ok_or_else(|| {
                error_response(
                    ErrorKind::Unauthenticated,
                    format!("{REQUESTER_HEADER} header is required"),
                )
            })
    }
}
