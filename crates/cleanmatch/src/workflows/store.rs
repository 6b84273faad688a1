use crate::directory::UserId;
use crate::error::ErrorKind;

use super::booking::domain::{Booking, BookingId, BookingStatus};
use super::invitation::domain::{Invitation, InvitationId, InvitationStatus};

/// Upper bound on fetch/commit rounds before a contended write gives up.
pub const MAX_COMMIT_ATTEMPTS: usize = 16;

/// Records written together. Each record carries the version it was read at
/// (0 for a record that must not exist yet); the store rejects the whole set
/// if any of them moved in the meantime.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    bookings: Vec<Booking>,
    invitations: Vec<Invitation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_booking(mut self, booking: Booking) -> Self {
        self.bookings.push(booking);
        self
    }

    pub fn put_invitation(mut self, invitation: Invitation) -> Self {
        self.invitations.push(invitation);
        self
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn invitations(&self) -> &[Invitation] {
        &self.invitations
    }

    pub fn take_booking(&mut self, id: &BookingId) -> Option<Booking> {
        let index = self.bookings.iter().position(|booking| &booking.id == id)?;
        Some(self.bookings.swap_remove(index))
    }

    pub fn take_invitation(&mut self, id: &InvitationId) -> Option<Invitation> {
        let index = self
            .invitations
            .iter()
            .position(|invitation| &invitation.id == id)?;
        Some(self.invitations.swap_remove(index))
    }

    pub fn into_parts(self) -> (Vec<Booking>, Vec<Invitation>) {
        (self.bookings, self.invitations)
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty() && self.invitations.is_empty()
    }
}

/// Selection over stored bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub client_id: Option<UserId>,
    pub assigned_cleaner: Option<UserId>,
    pub statuses: Option<Vec<BookingStatus>>,
}

impl BookingQuery {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.client_id
            .as_ref()
            .map_or(true, |client| &booking.client_id == client)
            && self
                .assigned_cleaner
                .as_ref()
                .map_or(true, |cleaner| booking.is_assigned_to(cleaner))
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&booking.status))
    }
}

/// Selection over stored invitations.
#[derive(Debug, Clone, Default)]
pub struct InvitationQuery {
    pub booking_id: Option<BookingId>,
    pub cleaner_id: Option<UserId>,
    pub status: Option<InvitationStatus>,
}

impl InvitationQuery {
    pub fn matches(&self, invitation: &Invitation) -> bool {
        self.booking_id
            .as_ref()
            .map_or(true, |booking| &invitation.booking_id == booking)
            && self
                .cleaner_id
                .as_ref()
                .map_or(true, |cleaner| &invitation.cleaner_id == cleaner)
            && self.status.map_or(true, |status| invitation.status == status)
    }
}

/// Storage abstraction shared by the lifecycle, invitation engine and sweeper.
pub trait MatchingStore: Send + Sync {
    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError>;
    fn fetch_invitation(&self, id: &InvitationId) -> Result<Option<Invitation>, StoreError>;
    fn find_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>, StoreError>;
    fn find_invitations(&self, query: &InvitationQuery) -> Result<Vec<Invitation>, StoreError>;

    /// Atomically write every record in `transaction` or none of them.
    /// Returns the stored records with their new versions.
    fn commit(&self, transaction: Transaction) -> Result<Transaction, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' was modified concurrently")]
    VersionConflict { entity: &'static str, id: String },
    #[error("{entity} '{id}' already exists")]
    Duplicate { entity: &'static str, id: String },
    #[error("{entity} '{id}' does not exist")]
    Missing { entity: &'static str, id: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::VersionConflict { .. } => ErrorKind::Conflict,
            StoreError::Duplicate { .. } => ErrorKind::DuplicateKey,
            StoreError::Missing { .. } => ErrorKind::NotFound,
            StoreError::Unavailable(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}
