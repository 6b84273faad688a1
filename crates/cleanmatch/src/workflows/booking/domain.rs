use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{UserId, UserSummary};

/// Identifier wrapper for bookings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub String);

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    Standard,
    Deep,
    MoveIn,
    MoveOut,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Once,
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: NaiveDate,
    /// Time of day as entered by the client, e.g. `10:30 AM`.
    pub time: String,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    #[default]
    House,
    Townhouse,
    Office,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub property_type: PropertyType,
    pub bedrooms: u8,
    pub bathrooms: u8,
    #[serde(default)]
    pub square_footage: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// Optional add-on work requested with the clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Extras {
    pub deep_cleaning: bool,
    pub window_cleaning: bool,
    pub laundry: bool,
    pub fridge_cleaning: bool,
    pub oven_cleaning: bool,
    pub balcony_cleaning: bool,
    pub carpet_cleaning: bool,
}

/// Canonical booking status. `pending` from older clients is read as `pending-cleaner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    #[serde(alias = "pending")]
    PendingCleaner,
    Accepted,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::PendingCleaner => "pending-cleaner",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Statuses that carry an assigned cleaner.
    pub const fn requires_cleaner(self) -> bool {
        matches!(
            self,
            BookingStatus::Accepted
                | BookingStatus::Confirmed
                | BookingStatus::InProgress
                | BookingStatus::Completed
        )
    }

    /// Assignment is provisional: cleaners may still bid and the client may still choose.
    pub const fn accepts_applications(self) -> bool {
        matches!(self, BookingStatus::PendingCleaner | BookingStatus::Accepted)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Mpesa,
    Paypal,
    Card,
    Cash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

pub const DEFAULT_APPLICATION_MESSAGE: &str = "I would love to help with this cleaning job!";

/// One cleaner's bid on an open booking. Keyed by cleaner within its booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub cleaner_id: UserId,
    pub status: ApplicationStatus,
    pub proposed_price: u32,
    pub message: String,
    pub applied_at: DateTime<Utc>,
}

/// A cleaning job and its lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub client_id: UserId,
    pub service_type: ServiceType,
    pub schedule: Schedule,
    pub location: Location,
    pub extras: Extras,
    pub total_price: u32,
    pub status: BookingStatus,
    pub payment: PaymentDetails,
    pub assigned_cleaner: Option<UserId>,
    pub applications: Vec<Application>,
    pub client_notes: Option<String>,
    pub cleaner_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Optimistic concurrency token; 0 until first stored.
    pub version: u64,
}

impl Booking {
    pub fn open(id: BookingId, client_id: UserId, request: BookingRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            client_id,
            service_type: request.service_type,
            schedule: request.schedule,
            location: request.location,
            extras: request.extras,
            total_price: request.total_price,
            status: BookingStatus::PendingCleaner,
            payment: PaymentDetails::default(),
            assigned_cleaner: None,
            applications: Vec::new(),
            client_notes: request.client_notes,
            cleaner_notes: None,
            created_at: now,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            version: 0,
        }
    }

    pub fn application_for(&self, cleaner_id: &UserId) -> Option<&Application> {
        self.applications
            .iter()
            .find(|application| &application.cleaner_id == cleaner_id)
    }

    pub fn is_owned_by(&self, client_id: &UserId) -> bool {
        &self.client_id == client_id
    }

    pub fn is_assigned_to(&self, cleaner_id: &UserId) -> bool {
        self.assigned_cleaner.as_ref() == Some(cleaner_id)
    }

    /// `assigned_cleaner` is set exactly when the status requires one, and at
    /// most one application is accepted.
    pub fn invariants_hold(&self) -> bool {
        let accepted = self
            .applications
            .iter()
            .filter(|application| application.status == ApplicationStatus::Accepted)
            .count();
        self.assigned_cleaner.is_some() == self.status.requires_cleaner() && accepted <= 1
    }
}

/// Client supplied booking details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub service_type: ServiceType,
    pub schedule: Schedule,
    pub location: Location,
    #[serde(default)]
    pub extras: Extras,
    pub total_price: u32,
    #[serde(default)]
    pub client_notes: Option<String>,
}

impl BookingRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.total_price == 0 {
            return Err("total_price must be greater than zero".to_string());
        }
        if self.schedule.time.trim().is_empty() {
            return Err("schedule.time is required".to_string());
        }
        if self.location.address.trim().is_empty() {
            return Err("location.address is required".to_string());
        }
        if self.location.city.trim().is_empty() {
            return Err("location.city is required".to_string());
        }
        Ok(())
    }
}

/// Cleaner supplied bid details. Price defaults to the listed price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    #[serde(default)]
    pub proposed_price: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub status: BookingStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Marketplace filters; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub max_price: Option<u32>,
}

impl JobFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        let city_matches = self.city.as_deref().map_or(true, |city| {
            booking
                .location
                .city
                .to_lowercase()
                .contains(&city.trim().to_lowercase())
        });
        let service_matches = self
            .service_type
            .map_or(true, |service| booking.service_type == service);
        let price_matches = self
            .max_price
            .map_or(true, |max_price| booking.total_price <= max_price);

        booking.status == BookingStatus::PendingCleaner
            && booking.assigned_cleaner.is_none()
            && city_matches
            && service_matches
            && price_matches
    }
}

/// Dashboard counters for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BookingStats {
    pub total: usize,
    pub open: usize,
    pub completed: usize,
    pub total_spent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub cleaner: Option<UserSummary>,
}

/// Booking with its referenced users expanded for responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub cleaner: Option<UserSummary>,
    pub applicants: Vec<ApplicationView>,
}

/// Result of submitting an application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOutcome {
    pub booking: BookingView,
    pub auto_accepted: bool,
}
