use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::error;

use crate::directory::UserDirectory;
use crate::error::{error_response, ErrorKind};
use crate::extract::{JsonBody, OptionalJsonBody};
use crate::requester::Requester;
use crate::workflows::store::MatchingStore;

use super::domain::{DeclineRequest, InvitationId, InvitationRequest};
use super::service::{InvitationService, InvitationServiceError};

type SharedService<S, D> = Arc<InvitationService<S, D>>;

/// Direct invitation endpoints for clients and invited cleaners.
pub fn invitation_router<S, D>(service: SharedService<S, D>) -> Router
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    Router::new()
        .route("/api/v1/invitations", post(send_handler::<S, D>))
        .route("/api/v1/invitations/pending", get(pending_handler::<S, D>))
        .route(
            "/api/v1/invitations/:invitation_id",
            get(status_handler::<S, D>),
        )
        .route(
            "/api/v1/invitations/:invitation_id/accept",
            post(accept_handler::<S, D>),
        )
        .route(
            "/api/v1/invitations/:invitation_id/decline",
            post(decline_handler::<S, D>),
        )
        .with_state(service)
}

impl IntoResponse for InvitationServiceError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            error!(error = %self, "invitation request failed");
        }
        error_response(kind, self)
    }
}

pub(crate) async fn send_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
    JsonBody(request): JsonBody<InvitationRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.send(&client_id, request) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn status_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
    Path(invitation_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.status(&client_id, &InvitationId(invitation_id)) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn pending_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(cleaner_id): Requester,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.pending_for_cleaner(&cleaner_id) {
        Ok(invitations) => Json(invitations).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn accept_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(cleaner_id): Requester,
    Path(invitation_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.accept(&cleaner_id, &InvitationId(invitation_id)) {
        Ok(invitation) => Json(invitation).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn decline_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(cleaner_id): Requester,
    Path(invitation_id): Path<String>,
    OptionalJsonBody(request): OptionalJsonBody<DeclineRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.decline(&cleaner_id, &InvitationId(invitation_id), request) {
        Ok(invitation) => Json(invitation).into_response(),
        Err(err) => err.into_response(),
    }
}
