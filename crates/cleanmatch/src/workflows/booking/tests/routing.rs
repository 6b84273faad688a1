use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::booking::domain::{BookingStatus, PaymentStatus};

fn booking_payload() -> serde_json::Value {
    serde_json::to_value(booking_request()).expect("serializable request")
}

#[tokio::test]
async fn missing_requester_header_is_unauthenticated() {
    let harness = harness();
    let response = harness
        .router()
        .oneshot(
            Request::post("/api/v1/bookings")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(booking_payload().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["kind"], "unauthenticated");
}

#[tokio::test]
async fn marketplace_flow_over_http() {
    let harness = harness();
    let router = harness.router();

    let created = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/bookings", CLIENT, booking_payload()))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = json_body(created).await;
    assert_eq!(created["status"], "pending-cleaner");
    let booking_id = created["id"].as_str().expect("id").to_string();

    let jobs = router
        .clone()
        .oneshot(get_request("/api/v1/jobs/available?city=Nairobi", CLEANER_A))
        .await
        .unwrap();
    assert_eq!(jobs.status(), StatusCode::OK);
    assert_eq!(json_body(jobs).await.as_array().map(Vec::len), Some(1));

    let applied = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/jobs/{booking_id}/apply"),
            CLEANER_A,
            json!({ "proposed_price": 2400 }),
        ))
        .await
        .unwrap();
    assert_eq!(applied.status(), StatusCode::CREATED);
    let applied = json_body(applied).await;
    assert_eq!(applied["auto_accepted"], true);
    assert_eq!(applied["booking"]["status"], "accepted");
    assert_eq!(applied["booking"]["cleaner"]["first_name"], "Wanjiru");

    let paid = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/bookings/{booking_id}/payment"),
            CLIENT,
            json!({ "method": "card", "transaction_id": "txn-991" }),
        ))
        .await
        .unwrap();
    assert_eq!(paid.status(), StatusCode::OK);
    let paid = json_body(paid).await;
    assert_eq!(paid["status"], "confirmed");
    assert_eq!(paid["payment"]["status"], "paid");

    let started = router
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/v1/jobs/{booking_id}/status"),
            CLEANER_A,
            json!({ "status": "in-progress" }),
        ))
        .await
        .unwrap();
    assert_eq!(started.status(), StatusCode::OK);

    let stats = router
        .oneshot(get_request("/api/v1/bookings/stats", CLIENT))
        .await
        .unwrap();
    let stats = json_body(stats).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["total_spent"], 2500);
}

#[tokio::test]
async fn duplicate_application_maps_to_conflict() {
    let harness = harness();
    let booking_id = harness.open_booking();
    let router = harness.router();
    let uri = format!("/api/v1/jobs/{booking_id}/apply");

    let first = router
        .clone()
        .oneshot(json_request("POST", &uri, CLEANER_A, json!({})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = router
        .oneshot(json_request("POST", &uri, CLEANER_A, json!({})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = json_body(second).await;
    assert_eq!(body["error"]["kind"], "conflict");
}

#[tokio::test]
async fn payment_before_assignment_is_a_conflict() {
    let harness = harness();
    let booking_id = harness.open_booking();

    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/bookings/{booking_id}/payment"),
            CLIENT,
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let harness = harness();
    let response = harness
        .router()
        .oneshot(get_request("/api/v1/bookings/bkg-999999", CLIENT))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["kind"], "not_found");
}

#[tokio::test]
async fn client_cancel_without_body_uses_default_reason() {
    let harness = harness();
    let booking_id = harness.open_booking();

    let response = harness
        .router()
        .oneshot(
            Request::post(format!("/api/v1/bookings/{booking_id}/cancel"))
                .header(crate::requester::REQUESTER_HEADER, CLIENT)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellation_reason"], "cancelled by client");
}

#[tokio::test]
async fn malformed_application_body_is_rejected_without_applying() {
    let harness = harness();
    let booking_id = harness.open_booking();

    let response = harness
        .router()
        .oneshot(raw_request(
            "POST",
            &format!("/api/v1/jobs/{booking_id}/apply"),
            CLEANER_A,
            r#"{"proposed_price":"a lot"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["kind"], "validation_error");

    let view = harness
        .service
        .get(&user(CLIENT), &booking_id)
        .expect("booking visible to owner");
    assert_eq!(view.booking.status, BookingStatus::PendingCleaner);
    assert!(view.booking.applications.is_empty());
    assert!(view.booking.assigned_cleaner.is_none());
}

#[tokio::test]
async fn malformed_payment_body_leaves_booking_unpaid() {
    let harness = harness();
    let booking_id = harness.open_booking();
    harness
        .service
        .apply(&user(CLEANER_A), &booking_id, Default::default())
        .expect("first application");

    let response = harness
        .router()
        .oneshot(raw_request(
            "POST",
            &format!("/api/v1/bookings/{booking_id}/payment"),
            CLIENT,
            r#"{"method":"bitcoin","transaction_id":42}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["kind"], "validation_error");

    let view = harness
        .service
        .get(&user(CLIENT), &booking_id)
        .expect("booking visible to owner");
    assert_eq!(view.booking.status, BookingStatus::Accepted);
    assert_eq!(view.booking.payment.status, PaymentStatus::Pending);
    assert!(view.booking.payment.method.is_none());
}

#[tokio::test]
async fn unknown_service_type_filter_is_a_validation_error() {
    let harness = harness();
    harness.open_booking();

    let response = harness
        .router()
        .oneshot(get_request("/api/v1/jobs/available?service_type=laser", CLEANER_A))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["kind"], "validation_error");
    assert!(body["error"]["message"]
        .as_str()
        .expect("message")
        .starts_with("invalid query string"));
}
