use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::{error_response, ErrorKind};

/// JSON body that must be present and well formed.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

/// JSON body that may be omitted. An absent or blank body yields `T::default()`;
/// anything else has to parse.
#[derive(Debug, Clone, Default)]
pub struct OptionalJsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for OptionalJsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes).map(Self).map_err(|err| {
            error_response(ErrorKind::Validation, format!("invalid request body: {err}"))
        })
    }
}

/// Query string rendered with the shared error shape when it does not parse.
#[derive(Debug, Clone)]
pub struct QueryParams<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> Response {
    error_response(
        ErrorKind::Validation,
        format!("invalid request body: {}", rejection.body_text()),
    )
}

fn query_rejection(rejection: QueryRejection) -> Response {
    error_response(
        ErrorKind::Validation,
        format!("invalid query string: {}", rejection.body_text()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use serde::{Deserialize, Serialize};
    use tower::ServiceExt;

    #[derive(Debug, Default, Deserialize, Serialize)]
    struct Note {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        count: u32,
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/optional",
                post(|OptionalJsonBody(note): OptionalJsonBody<Note>| async move { Json(note) }),
            )
            .route(
                "/required",
                post(|JsonBody(note): JsonBody<Note>| async move { Json(note) }),
            )
            .route(
                "/query",
                get(|QueryParams(note): QueryParams<Note>| async move { Json(note) }),
            )
    }

    fn post_body(uri: &str, body: &'static str) -> HttpRequest<Body> {
        HttpRequest::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn blank_optional_body_uses_default() {
        let response = router()
            .oneshot(HttpRequest::post("/optional").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["count"], 0);

        let response = router().oneshot(post_body("/optional", "  \n")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_optional_body_is_rejected() {
        let response = router()
            .oneshot(post_body("/optional", r#"{"count":"many"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn required_body_errors_use_shared_shape() {
        let response = router()
            .oneshot(post_body("/required", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn bad_query_values_use_shared_shape() {
        let response = router()
            .oneshot(HttpRequest::get("/query?count=lots").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "validation_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid query string"));
    }
}
