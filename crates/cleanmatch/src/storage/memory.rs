use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::directory::{DirectoryError, UserDirectory, UserId, UserProfile};
use crate::workflows::booking::domain::{Booking, BookingId};
use crate::workflows::invitation::domain::{Invitation, InvitationId};
use crate::workflows::store::{
    BookingQuery, InvitationQuery, MatchingStore, StoreError, Transaction,
};

#[derive(Debug, Default)]
struct MatchingTables {
    bookings: HashMap<BookingId, Booking>,
    invitations: HashMap<InvitationId, Invitation>,
}

/// Bookings and invitations behind one lock, so a commit touching both is atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMatchingStore {
    tables: Arc<Mutex<MatchingTables>>,
}

impl InMemoryMatchingStore {
    fn lock(&self) -> Result<MutexGuard<'_, MatchingTables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("matching store mutex poisoned".to_string()))
    }
}

fn check_version(
    entity: &'static str,
    id: &str,
    stored: Option<u64>,
    expected: u64,
) -> Result<(), StoreError> {
    match (stored, expected) {
        (None, 0) => Ok(()),
        (Some(_), 0) => Err(StoreError::Duplicate {
            entity,
            id: id.to_string(),
        }),
        (None, _) => Err(StoreError::Missing {
            entity,
            id: id.to_string(),
        }),
        (Some(current), expected) if current == expected => Ok(()),
        (Some(_), _) => Err(StoreError::VersionConflict {
            entity,
            id: id.to_string(),
        }),
    }
}

impl MatchingStore for InMemoryMatchingStore {
    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.lock()?.bookings.get(id).cloned())
    }

    fn fetch_invitation(&self, id: &InvitationId) -> Result<Option<Invitation>, StoreError> {
        Ok(self.lock()?.invitations.get(id).cloned())
    }

    fn find_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .filter(|booking| query.matches(booking))
            .cloned()
            .collect())
    }

    fn find_invitations(&self, query: &InvitationQuery) -> Result<Vec<Invitation>, StoreError> {
        Ok(self
            .lock()?
            .invitations
            .values()
            .filter(|invitation| query.matches(invitation))
            .cloned()
            .collect())
    }

    fn commit(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        let mut tables = self.lock()?;

        // validate everything before writing anything
        for booking in transaction.bookings() {
            let stored = tables.bookings.get(&booking.id).map(|row| row.version);
            check_version("booking", &booking.id.0, stored, booking.version)?;
        }
        for invitation in transaction.invitations() {
            let stored = tables.invitations.get(&invitation.id).map(|row| row.version);
            check_version("invitation", &invitation.id.0, stored, invitation.version)?;
        }

        let (bookings, invitations) = transaction.into_parts();
        let mut written = Transaction::new();
        for mut booking in bookings {
            booking.version += 1;
            tables.bookings.insert(booking.id.clone(), booking.clone());
            written = written.put_booking(booking);
        }
        for mut invitation in invitations {
            invitation.version += 1;
            tables
                .invitations
                .insert(invitation.id.clone(), invitation.clone());
            written = written.put_invitation(invitation);
        }
        Ok(written)
    }
}

#[derive(Debug, Default)]
struct DirectoryTables {
    profiles: HashMap<UserId, UserProfile>,
    placed_bookings: HashSet<String>,
    completed_bookings: HashSet<String>,
}

/// Process-local user directory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    tables: Arc<Mutex<DirectoryTables>>,
}

impl InMemoryUserDirectory {
    fn lock(&self) -> Result<MutexGuard<'_, DirectoryTables>, DirectoryError> {
        self.tables
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory mutex poisoned".to_string()))
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn insert(&self, profile: UserProfile) -> Result<UserProfile, DirectoryError> {
        let profile = profile.normalized().map_err(DirectoryError::Invalid)?;
        let mut tables = self.lock()?;
        if tables.profiles.contains_key(&profile.id) {
            return Err(DirectoryError::DuplicateKey {
                field: "id",
                value: profile.id.0,
            });
        }
        if tables
            .profiles
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&profile.email))
        {
            return Err(DirectoryError::DuplicateKey {
                field: "email",
                value: profile.email,
            });
        }
        tables.profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch(&self, id: &UserId) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.lock()?.profiles.get(id).cloned())
    }

    fn available_cleaners(&self, limit: usize) -> Result<Vec<UserProfile>, DirectoryError> {
        let mut cleaners: Vec<UserProfile> = self
            .lock()?
            .profiles
            .values()
            .filter(|profile| profile.is_available_cleaner())
            .cloned()
            .collect();
        cleaners.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then(b.completed_jobs.cmp(&a.completed_jobs))
                .then(a.id.cmp(&b.id))
        });
        cleaners.truncate(limit);
        Ok(cleaners)
    }

    fn set_availability(
        &self,
        id: &UserId,
        available: bool,
    ) -> Result<UserProfile, DirectoryError> {
        let mut tables = self.lock()?;
        let profile = tables
            .profiles
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.clone()))?;
        profile.is_available = available;
        Ok(profile.clone())
    }

    fn record_booking_placed(
        &self,
        client_id: &UserId,
        booking_key: &str,
    ) -> Result<bool, DirectoryError> {
        let mut tables = self.lock()?;
        if tables.placed_bookings.contains(booking_key) {
            return Ok(false);
        }
        let profile = tables
            .profiles
            .get_mut(client_id)
            .ok_or_else(|| DirectoryError::NotFound(client_id.clone()))?;
        profile.bookings += 1;
        tables.placed_bookings.insert(booking_key.to_string());
        Ok(true)
    }

    fn record_completed_job(
        &self,
        cleaner_id: &UserId,
        booking_key: &str,
    ) -> Result<bool, DirectoryError> {
        let mut tables = self.lock()?;
        if tables.completed_bookings.contains(booking_key) {
            return Ok(false);
        }
        let profile = tables
            .profiles
            .get_mut(cleaner_id)
            .ok_or_else(|| DirectoryError::NotFound(cleaner_id.clone()))?;
        profile.completed_jobs += 1;
        tables.completed_bookings.insert(booking_key.to_string());
        Ok(true)
    }
}
