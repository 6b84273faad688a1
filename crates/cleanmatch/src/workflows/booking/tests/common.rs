use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::clock::ManualClock;
use crate::directory::{
    DirectoryError, UserDirectory, UserId, UserProfile, UserRole,
};
use crate::requester::REQUESTER_HEADER;
use crate::storage::{InMemoryMatchingStore, InMemoryUserDirectory};
use crate::workflows::booking::domain::{
    Booking, BookingId, BookingRequest, Extras, Location, PropertyType, Schedule, ServiceType,
};
use crate::workflows::booking::{booking_router, BookingService};

pub(super) const CLIENT: &str = "cu-amina";
pub(super) const OTHER_CLIENT: &str = "cu-brian";
pub(super) const CLEANER_A: &str = "cl-wanjiru";
pub(super) const CLEANER_B: &str = "cl-otieno";
pub(super) const CLEANER_C: &str = "cl-njeri";

pub(super) type TestService = BookingService<InMemoryMatchingStore, InMemoryUserDirectory>;

pub(super) fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub(super) fn booking_request() -> BookingRequest {
    BookingRequest {
        service_type: ServiceType::Standard,
        schedule: Schedule {
            date: NaiveDate::from_ymd_opt(2025, 3, 8).expect("valid date"),
            time: "10:00 AM".to_string(),
            frequency: Default::default(),
        },
        location: Location {
            address: "14 Riverside Dr".to_string(),
            city: "Nairobi".to_string(),
            property_type: PropertyType::Apartment,
            bedrooms: 2,
            bathrooms: 1,
            square_footage: 850,
            special_instructions: Some("Key with the caretaker".to_string()),
        },
        extras: Extras {
            window_cleaning: true,
            ..Extras::default()
        },
        total_price: 2500,
        client_notes: None,
    }
}

/// Open booking value that has not been stored.
pub(super) fn draft_booking() -> Booking {
    Booking::open(
        BookingId("bkg-draft".to_string()),
        user(CLIENT),
        booking_request(),
        start(),
    )
}

pub(super) fn seeded_directory() -> InMemoryUserDirectory {
    let directory = InMemoryUserDirectory::default();
    let people = [
        (CLIENT, "Amina", "Hassan", UserRole::Client),
        (OTHER_CLIENT, "Brian", "Kiptoo", UserRole::Client),
        (CLEANER_A, "Wanjiru", "Kamau", UserRole::Cleaner),
        (CLEANER_B, "Otieno", "Odhiambo", UserRole::Cleaner),
        (CLEANER_C, "Njeri", "Mwangi", UserRole::Cleaner),
    ];
    for (id, first, last, role) in people {
        directory
            .insert(UserProfile::new(
                user(id),
                first,
                last,
                format!("{id}@example.com"),
                role,
            ))
            .expect("seed profile");
    }
    directory
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryMatchingStore>,
    pub(super) directory: Arc<InMemoryUserDirectory>,
    pub(super) clock: ManualClock,
}

pub(super) fn harness() -> Harness {
    let clock = ManualClock::new(start());
    let store = Arc::new(InMemoryMatchingStore::default());
    let directory = Arc::new(seeded_directory());
    let service = Arc::new(BookingService::new(
        store.clone(),
        directory.clone(),
        Arc::new(clock.clone()),
    ));
    Harness {
        service,
        store,
        directory,
        clock,
    }
}

impl Harness {
    pub(super) fn open_booking(&self) -> BookingId {
        self.service
            .create(&user(CLIENT), booking_request())
            .expect("booking created")
            .booking
            .id
    }

    pub(super) fn profile(&self, id: &str) -> UserProfile {
        self.directory
            .fetch(&user(id))
            .expect("directory reachable")
            .expect("profile exists")
    }

    pub(super) fn router(&self) -> Router {
        booking_router(self.service.clone())
    }
}

/// Directory that knows everyone but cannot update counters.
pub(super) struct CounterlessDirectory {
    pub(super) inner: InMemoryUserDirectory,
}

impl UserDirectory for CounterlessDirectory {
    fn insert(&self, profile: UserProfile) -> Result<UserProfile, DirectoryError> {
        self.inner.insert(profile)
    }

    fn fetch(&self, id: &UserId) -> Result<Option<UserProfile>, DirectoryError> {
        self.inner.fetch(id)
    }

    fn available_cleaners(&self, limit: usize) -> Result<Vec<UserProfile>, DirectoryError> {
        self.inner.available_cleaners(limit)
    }

    fn set_availability(&self, id: &UserId, available: bool) -> Result<UserProfile, DirectoryError> {
        self.inner.set_availability(id, available)
    }

    fn record_booking_placed(&self, _client_id: &UserId, _booking_key: &str) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("counter shard offline".to_string()))
    }

    fn record_completed_job(&self, _cleaner_id: &UserId, _booking_key: &str) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("counter shard offline".to_string()))
    }
}

pub(super) fn json_request(method: &str, uri: &str, requester: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(REQUESTER_HEADER, requester)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(super) fn get_request(uri: &str, requester: &str) -> Request<Body> {
    Request::get(uri)
        .header(REQUESTER_HEADER, requester)
        .body(Body::empty())
        .unwrap()
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub(super) fn raw_request(method: &str, uri: &str, requester: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(REQUESTER_HEADER, requester)
        .body(Body::from(body))
        .unwrap()
}
