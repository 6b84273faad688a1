use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tracing::error;

use crate::error::{error_response, ErrorKind};
use crate::extract::JsonBody;
use crate::requester::Requester;

use super::domain::{AvailabilityUpdate, Registration, UserId};
use super::repository::UserDirectory;
use super::service::{DirectoryService, DirectoryServiceError};

type SharedService<D> = Arc<DirectoryService<D>>;

pub fn directory_router<D>(service: SharedService<D>) -> Router
where
    D: UserDirectory + 'static,
{
    Router::new()
        .route("/api/v1/users", post(register_handler::<D>))
        .route("/api/v1/users/:user_id", get(profile_handler::<D>))
        .route("/api/v1/cleaners/available", get(available_handler::<D>))
        .route(
            "/api/v1/cleaners/me/availability",
            put(availability_handler::<D>),
        )
        .with_state(service)
}

impl IntoResponse for DirectoryServiceError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            error!(error = %self, "directory request failed");
        }
        error_response(kind, self)
    }
}

pub(crate) async fn register_handler<D>(
    State(service): State<SharedService<D>>,
    JsonBody(registration): JsonBody<Registration>,
) -> Response
where
    D: UserDirectory + 'static,
{
    match service.register(registration) {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn profile_handler<D>(
    State(service): State<SharedService<D>>,
    Path(user_id): Path<String>,
) -> Response
where
    D: UserDirectory + 'static,
{
    match service.profile(&UserId(user_id)) {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn available_handler<D>(State(service): State<SharedService<D>>) -> Response
where
    D: UserDirectory + 'static,
{
    match service.available_cleaners() {
        Ok(cleaners) => Json(cleaners).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn availability_handler<D>(
    State(service): State<SharedService<D>>,
    Requester(cleaner_id): Requester,
    JsonBody(update): JsonBody<AvailabilityUpdate>,
) -> Response
where
    D: UserDirectory + 'static,
{
    match service.set_availability(&cleaner_id, update.is_available) {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => err.into_response(),
    }
}
