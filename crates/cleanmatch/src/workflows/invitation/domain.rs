use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{UserId, UserSummary};
use crate::workflows::booking::domain::{
    BookingId, BookingRequest, BookingStatus, Location, PropertyType, Schedule, ServiceType,
};

/// Identifier wrapper for direct invitations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvitationId(pub String);

impl std::fmt::Display for InvitationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    /// Backing booking was cancelled by the client before an answer.
    Cancelled,
}

impl InvitationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Cancelled => "cancelled",
        }
    }
}

/// Booking details captured on the invitation for display without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationDetails {
    pub service_type: ServiceType,
    pub date: NaiveDate,
    pub time: String,
    /// Free-form address, e.g. `14 Riverside Dr, Nairobi`.
    pub location: String,
    #[serde(default)]
    pub city: Option<String>,
    pub total_price: u32,
    pub bedrooms: u8,
    pub bathrooms: u8,
}

impl InvitationDetails {
    pub fn validate(&self) -> Result<(), String> {
        if self.total_price == 0 {
            return Err("total_price must be greater than zero".to_string());
        }
        if self.time.trim().is_empty() {
            return Err("time is required".to_string());
        }
        if self.location.trim().is_empty() {
            return Err("location is required".to_string());
        }
        Ok(())
    }

    /// City given explicitly, else the second comma separated address part.
    pub fn resolved_city(&self, default_city: &str) -> String {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .or_else(|| {
                self.location
                    .split(',')
                    .nth(1)
                    .map(str::trim)
                    .filter(|city| !city.is_empty())
            })
            .unwrap_or(default_city)
            .to_string()
    }

    /// Booking request backing this invitation.
    pub fn booking_request(&self, default_city: &str) -> BookingRequest {
        BookingRequest {
            service_type: self.service_type,
            schedule: Schedule {
                date: self.date,
                time: self.time.clone(),
                frequency: Default::default(),
            },
            location: Location {
                address: self.location.clone(),
                city: self.resolved_city(default_city),
                property_type: PropertyType::House,
                bedrooms: self.bedrooms,
                bathrooms: self.bathrooms,
                square_footage: 0,
                special_instructions: None,
            },
            extras: Default::default(),
            total_price: self.total_price,
            client_notes: None,
        }
    }
}

/// Direct, time-boxed proposal paired with the booking created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub booking_id: BookingId,
    pub cleaner_id: UserId,
    pub client_id: UserId,
    pub details: InvitationDetails,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// Pending but past its deadline and not yet swept.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && now > self.expires_at
    }

    /// Pending and still answerable.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationRequest {
    pub cleaner_id: UserId,
    pub booking_details: InvitationDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Returned to the client after sending an invitation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvitationReceipt {
    pub invitation_id: InvitationId,
    pub booking_id: BookingId,
    pub cleaner: UserSummary,
    pub expires_at: DateTime<Utc>,
}

/// What a polling client sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvitationStatusView {
    pub invitation_id: InvitationId,
    pub status: InvitationStatus,
    pub booking_status: Option<BookingStatus>,
    pub cleaner: Option<UserSummary>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}
