use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::clock::ManualClock;
use crate::config::MatchingConfig;
use crate::directory::{UserDirectory, UserId, UserProfile, UserRole};
use crate::requester::REQUESTER_HEADER;
use crate::storage::{InMemoryMatchingStore, InMemoryUserDirectory};
use crate::workflows::booking::domain::{Booking, BookingId, ServiceType};
use crate::workflows::booking::BookingService;
use crate::workflows::invitation::domain::{
    Invitation, InvitationDetails, InvitationId, InvitationReceipt, InvitationRequest,
};
use crate::workflows::invitation::InvitationService;
use crate::workflows::store::MatchingStore;
use crate::workflows::sweeper::ExpirationSweeper;

pub(super) const CLIENT: &str = "cu-amina";
pub(super) const OTHER_CLIENT: &str = "cu-brian";
pub(super) const CLEANER: &str = "cl-wanjiru";
pub(super) const OTHER_CLEANER: &str = "cl-otieno";
pub(super) const AWAY_CLEANER: &str = "cl-away";

pub(super) fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub(super) fn details() -> InvitationDetails {
    InvitationDetails {
        service_type: ServiceType::Deep,
        date: NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date"),
        time: "2:00 PM".to_string(),
        location: "22 Kindaruma Rd, Kilimani".to_string(),
        city: None,
        total_price: 4200,
        bedrooms: 3,
        bathrooms: 2,
    }
}

pub(super) fn invitation_request(cleaner: &str) -> InvitationRequest {
    InvitationRequest {
        cleaner_id: user(cleaner),
        booking_details: details(),
    }
}

pub(super) struct Harness {
    pub(super) invitations: Arc<InvitationService<InMemoryMatchingStore, InMemoryUserDirectory>>,
    pub(super) bookings: Arc<BookingService<InMemoryMatchingStore, InMemoryUserDirectory>>,
    pub(super) sweeper: Arc<ExpirationSweeper<InMemoryMatchingStore>>,
    pub(super) store: Arc<InMemoryMatchingStore>,
    pub(super) directory: Arc<InMemoryUserDirectory>,
    pub(super) clock: ManualClock,
}

pub(super) fn harness() -> Harness {
    let clock = ManualClock::new(start());
    let store = Arc::new(InMemoryMatchingStore::default());
    let directory = Arc::new(InMemoryUserDirectory::default());
    for (id, role, available) in [
        (CLIENT, UserRole::Client, true),
        (OTHER_CLIENT, UserRole::Client, true),
        (CLEANER, UserRole::Cleaner, true),
        (OTHER_CLEANER, UserRole::Cleaner, true),
        (AWAY_CLEANER, UserRole::Cleaner, false),
    ] {
        let mut profile =
            UserProfile::new(user(id), "Test", "User", format!("{id}@example.com"), role);
        profile.is_available = available;
        directory.insert(profile).expect("seed profile");
    }

    let config = MatchingConfig::default();
    let sweeper = Arc::new(ExpirationSweeper::new(
        store.clone(),
        Arc::new(clock.clone()),
        &config,
    ));
    let invitations = Arc::new(InvitationService::new(
        store.clone(),
        directory.clone(),
        Arc::new(clock.clone()),
        sweeper.clone(),
        &config,
    ));
    let bookings = Arc::new(BookingService::new(
        store.clone(),
        directory.clone(),
        Arc::new(clock.clone()),
    ));

    Harness {
        invitations,
        bookings,
        sweeper,
        store,
        directory,
        clock,
    }
}

impl Harness {
    pub(super) fn send(&self) -> InvitationReceipt {
        self.invitations
            .send(&user(CLIENT), invitation_request(CLEANER))
            .expect("invitation sent")
    }

    pub(super) fn booking(&self, id: &BookingId) -> Booking {
        self.store
            .fetch_booking(id)
            .expect("store reachable")
            .expect("booking exists")
    }

    pub(super) fn invitation(&self, id: &InvitationId) -> Invitation {
        self.store
            .fetch_invitation(id)
            .expect("store reachable")
            .expect("invitation exists")
    }

    pub(super) fn profile(&self, id: &str) -> UserProfile {
        self.directory
            .fetch(&user(id))
            .expect("directory reachable")
            .expect("profile exists")
    }
}

pub(super) fn request(method: &str, uri: &str, requester: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(REQUESTER_HEADER, requester);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
