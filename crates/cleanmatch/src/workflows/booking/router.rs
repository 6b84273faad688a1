use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::error;

use crate::directory::{UserDirectory, UserId};
use crate::error::{error_response, ErrorKind};
use crate::extract::{JsonBody, OptionalJsonBody, QueryParams};
use crate::requester::Requester;
use crate::workflows::store::MatchingStore;

use super::domain::{
    ApplicationRequest, BookingId, BookingRequest, JobFilter, JobStatusUpdate, PaymentRequest,
};
use super::service::{BookingService, BookingServiceError};

type SharedService<S, D> = Arc<BookingService<S, D>>;

/// Client booking endpoints and the cleaner-facing marketplace.
pub fn booking_router<S, D>(service: SharedService<S, D>) -> Router
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/bookings",
            post(create_handler::<S, D>).get(list_handler::<S, D>),
        )
        .route("/api/v1/bookings/stats", get(stats_handler::<S, D>))
        .route("/api/v1/bookings/:booking_id", get(detail_handler::<S, D>))
        .route(
            "/api/v1/bookings/:booking_id/cancel",
            post(cancel_handler::<S, D>),
        )
        .route(
            "/api/v1/bookings/:booking_id/applications",
            get(applications_handler::<S, D>),
        )
        .route(
            "/api/v1/bookings/:booking_id/applications/:cleaner_id/accept",
            post(accept_application_handler::<S, D>),
        )
        .route(
            "/api/v1/bookings/:booking_id/payment",
            post(payment_handler::<S, D>),
        )
        .route("/api/v1/jobs/available", get(available_jobs_handler::<S, D>))
        .route("/api/v1/jobs/mine", get(cleaner_jobs_handler::<S, D>))
        .route("/api/v1/jobs/:booking_id/apply", post(apply_handler::<S, D>))
        .route(
            "/api/v1/jobs/:booking_id/status",
            patch(job_status_handler::<S, D>),
        )
        .with_state(service)
}

impl IntoResponse for BookingServiceError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            error!(error = %self, "booking request failed");
        }
        error_response(kind, self)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CancelRequest {
    #[serde(default)]
    reason: Option<String>,
}

pub(crate) async fn create_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
    JsonBody(request): JsonBody<BookingRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.create(&client_id, request) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.client_bookings(&client_id) {
        Ok(views) => Json(views).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn stats_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.stats(&client_id) {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn detail_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(requester): Requester,
    Path(booking_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.get(&requester, &BookingId(booking_id)) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn cancel_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
    Path(booking_id): Path<String>,
    OptionalJsonBody(request): OptionalJsonBody<CancelRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    let reason = request.reason.filter(|reason| !reason.trim().is_empty());
    match service.cancel(&client_id, &BookingId(booking_id), reason) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn applications_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
    Path(booking_id): Path<String>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.applications(&client_id, &BookingId(booking_id)) {
        Ok(applications) => Json(applications).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn accept_application_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
    Path((booking_id, cleaner_id)): Path<(String, String)>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.accept_application(&client_id, &BookingId(booking_id), &UserId(cleaner_id)) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn payment_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(client_id): Requester,
    Path(booking_id): Path<String>,
    OptionalJsonBody(request): OptionalJsonBody<PaymentRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.complete_payment(&client_id, &BookingId(booking_id), request) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn available_jobs_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    QueryParams(filter): QueryParams<JobFilter>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.available_jobs(&filter) {
        Ok(jobs) => Json(jobs).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn cleaner_jobs_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(cleaner_id): Requester,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.cleaner_jobs(&cleaner_id) {
        Ok(jobs) => Json(jobs).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn apply_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(cleaner_id): Requester,
    Path(booking_id): Path<String>,
    OptionalJsonBody(request): OptionalJsonBody<ApplicationRequest>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.apply(&cleaner_id, &BookingId(booking_id), request) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn job_status_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Requester(cleaner_id): Requester,
    Path(booking_id): Path<String>,
    JsonBody(update): JsonBody<JobStatusUpdate>,
) -> Response
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    match service.update_job_status(&cleaner_id, &BookingId(booking_id), update) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}
