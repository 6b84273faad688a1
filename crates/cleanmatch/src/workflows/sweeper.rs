use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::MatchingConfig;
use crate::error::ErrorKind;
use crate::workflows::booking::domain::{BookingId, BookingStatus};
use crate::workflows::booking::lifecycle::{self, BookingEvent, LifecycleError};
use crate::workflows::invitation::domain::{InvitationId, InvitationStatus};
use crate::workflows::store::{
    BookingQuery, InvitationQuery, MatchingStore, StoreError, Transaction, MAX_COMMIT_ATTEMPTS,
};

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub invitations_expired: usize,
    pub bookings_cancelled: usize,
    /// Records left for the next pass because their expiry failed.
    pub failures: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.invitations_expired == 0 && self.bookings_cancelled == 0 && self.failures == 0
    }
}

/// Effect of expiring one invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryCascade {
    /// The backing booking was still open and has been cancelled.
    pub booking_cancelled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("'{0}' kept changing during expiry; will retry next sweep")]
    Contended(String),
}

impl SweepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SweepError::Store(err) => err.kind(),
            SweepError::Lifecycle(err) => err.kind(),
            SweepError::Contended(_) => ErrorKind::Conflict,
        }
    }
}

/// Applies time-driven transitions: unanswered invitations expire and stale
/// open jobs are cancelled. Every expiry in the system goes through here.
pub struct ExpirationSweeper<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    open_job_ttl: Option<Duration>,
}

impl<S> ExpirationSweeper<S>
where
    S: MatchingStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: &MatchingConfig) -> Self {
        Self {
            store,
            clock,
            open_job_ttl: config.open_job_ttl,
        }
    }

    /// One full pass. Safe to run repeatedly and concurrently with requests.
    pub fn sweep(&self) -> Result<SweepReport, SweepError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let stale = self
            .store
            .find_invitations(&InvitationQuery {
                status: Some(InvitationStatus::Pending),
                ..InvitationQuery::default()
            })?
            .into_iter()
            .filter(|invitation| invitation.is_stale(now));
        for invitation in stale {
            match self.expire_invitation(&invitation.id) {
                Ok(Some(cascade)) => {
                    report.invitations_expired += 1;
                    if cascade.booking_cancelled {
                        report.bookings_cancelled += 1;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(invitation_id = %invitation.id, error = %err, "invitation expiry failed; continuing sweep");
                    report.failures += 1;
                }
            }
        }

        if let Some(ttl) = self.open_job_ttl {
            let cutoff = now - ttl;
            let stale_jobs = self
                .store
                .find_bookings(&BookingQuery {
                    statuses: Some(vec![BookingStatus::PendingCleaner]),
                    ..BookingQuery::default()
                })?
                .into_iter()
                .filter(|booking| booking.created_at < cutoff);
            for booking in stale_jobs {
                match self.expire_open_booking(&booking.id) {
                    Ok(true) => report.bookings_cancelled += 1,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(booking_id = %booking.id, error = %err, "open job expiry failed; continuing sweep");
                        report.failures += 1;
                    }
                }
            }
        }

        if report.is_empty() {
            debug!("sweep found nothing to expire");
        } else {
            info!(
                invitations_expired = report.invitations_expired,
                bookings_cancelled = report.bookings_cancelled,
                failures = report.failures,
                "sweep finished"
            );
        }
        Ok(report)
    }

    /// Expire one invitation if it is still pending past its deadline, cancelling
    /// its booking when that is still open. Returns `None` when there was nothing
    /// to do, including when a concurrent caller already expired it.
    pub fn expire_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> Result<Option<ExpiryCascade>, SweepError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let Some(mut invitation) = self.store.fetch_invitation(invitation_id)? else {
                return Ok(None);
            };
            let now = self.clock.now();
            if !invitation.is_stale(now) {
                return Ok(None);
            }

            let mut transaction = Transaction::new();
            let mut booking_cancelled = false;
            if let Some(mut booking) = self.store.fetch_booking(&invitation.booking_id)? {
                if lifecycle::apply(&mut booking, BookingEvent::TimedOut, now)?.changed {
                    booking_cancelled = true;
                    transaction = transaction.put_booking(booking);
                }
            }
            invitation.status = InvitationStatus::Expired;
            let booking_id = invitation.booking_id.clone();
            transaction = transaction.put_invitation(invitation);

            match self.store.commit(transaction) {
                Ok(_) => {
                    info!(
                        invitation_id = %invitation_id,
                        booking_id = %booking_id,
                        booking_cancelled,
                        "invitation expired without a response"
                    );
                    return Ok(Some(ExpiryCascade { booking_cancelled }));
                }
                Err(err) if err.is_retryable() => {
                    debug!(invitation_id = %invitation_id, "expiry raced another writer; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SweepError::Contended(invitation_id.0.clone()))
    }

    /// Cancel an open booking nobody matched within the open-job window. Bookings
    /// still waiting on a live invitation are left to the invitation deadline.
    pub fn expire_open_booking(&self, booking_id: &BookingId) -> Result<bool, SweepError> {
        let Some(ttl) = self.open_job_ttl else {
            return Ok(false);
        };

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let Some(mut booking) = self.store.fetch_booking(booking_id)? else {
                return Ok(false);
            };
            let now = self.clock.now();
            if booking.status != BookingStatus::PendingCleaner || booking.created_at + ttl >= now {
                return Ok(false);
            }

            let pending = self.store.find_invitations(&InvitationQuery {
                booking_id: Some(booking_id.clone()),
                status: Some(InvitationStatus::Pending),
                ..InvitationQuery::default()
            })?;
            if pending.iter().any(|invitation| invitation.is_open(now)) {
                return Ok(false);
            }

            if !lifecycle::apply(&mut booking, BookingEvent::TimedOut, now)?.changed {
                return Ok(false);
            }
            let transaction = pending.into_iter().fold(
                Transaction::new().put_booking(booking),
                |transaction, mut invitation| {
                    invitation.status = InvitationStatus::Expired;
                    transaction.put_invitation(invitation)
                },
            );

            match self.store.commit(transaction) {
                Ok(_) => {
                    info!(booking_id = %booking_id, "stale open job cancelled");
                    return Ok(true);
                }
                Err(err) if err.is_retryable() => {
                    debug!(booking_id = %booking_id, "open job expiry raced another writer; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SweepError::Contended(booking_id.0.clone()))
    }

    /// Run [`sweep`](Self::sweep) on a fixed cadence until the task is aborted.
    pub fn spawn(self: Arc<Self>, every: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep() {
                    warn!(error = %err, "expiration sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::directory::UserId;
    use crate::storage::InMemoryMatchingStore;
    use crate::workflows::booking::domain::{
        Booking, BookingRequest, Location, PropertyType, Schedule, ServiceType,
    };
    use crate::workflows::booking::lifecycle::TIMEOUT_REASON;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn request() -> BookingRequest {
        BookingRequest {
            service_type: ServiceType::Standard,
            schedule: Schedule {
                date: NaiveDate::from_ymd_opt(2025, 3, 4).expect("valid date"),
                time: "10:00 AM".to_string(),
                frequency: Default::default(),
            },
            location: Location {
                address: "14 Riverside Dr".to_string(),
                city: "Nairobi".to_string(),
                property_type: PropertyType::Apartment,
                bedrooms: 2,
                bathrooms: 1,
                square_footage: 0,
                special_instructions: None,
            },
            extras: Default::default(),
            total_price: 2500,
            client_notes: None,
        }
    }

    fn setup() -> (
        ExpirationSweeper<InMemoryMatchingStore>,
        Arc<InMemoryMatchingStore>,
        ManualClock,
    ) {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let store = Arc::new(InMemoryMatchingStore::default());
        let sweeper =
            ExpirationSweeper::new(store.clone(), Arc::new(clock.clone()), &MatchingConfig::default());
        (sweeper, store, clock)
    }

    fn open_booking(store: &InMemoryMatchingStore, clock: &ManualClock, id: &str) -> Booking {
        let booking = Booking::open(
            BookingId(id.to_string()),
            UserId::new("client-1"),
            request(),
            clock.now(),
        );
        let mut stored = store
            .commit(Transaction::new().put_booking(booking))
            .expect("insert booking");
        stored
            .take_booking(&BookingId(id.to_string()))
            .expect("stored booking")
    }

    #[test]
    fn stale_open_jobs_are_cancelled_with_timeout_reason() {
        let (sweeper, store, clock) = setup();
        open_booking(&store, &clock, "bkg-sweep-1");

        clock.advance(Duration::minutes(10));
        assert!(sweeper.sweep().expect("sweep runs").is_empty());

        clock.advance(Duration::minutes(6));
        let report = sweeper.sweep().expect("sweep runs");
        assert_eq!(report.bookings_cancelled, 1);

        let booking = store
            .fetch_booking(&BookingId("bkg-sweep-1".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancellation_reason.as_deref(), Some(TIMEOUT_REASON));
        assert!(booking.assigned_cleaner.is_none());
    }

    #[test]
    fn sweeping_twice_is_a_no_op() {
        let (sweeper, store, clock) = setup();
        open_booking(&store, &clock, "bkg-sweep-2");
        clock.advance(Duration::minutes(20));

        assert_eq!(sweeper.sweep().expect("first sweep").bookings_cancelled, 1);
        let after_first = store
            .fetch_booking(&BookingId("bkg-sweep-2".to_string()))
            .expect("fetch")
            .expect("present");

        assert!(sweeper.sweep().expect("second sweep").is_empty());
        assert!(!sweeper
            .expire_open_booking(&after_first.id)
            .expect("direct expiry"));
        let after_second = store
            .fetch_booking(&after_first.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn matched_bookings_are_left_alone() {
        let (sweeper, store, clock) = setup();
        let mut booking = open_booking(&store, &clock, "bkg-sweep-3");
        lifecycle::apply(
            &mut booking,
            BookingEvent::ApplicationSubmitted {
                cleaner_id: UserId::new("cleaner-1"),
                proposed_price: None,
                message: None,
            },
            clock.now(),
        )
        .expect("apply");
        store
            .commit(Transaction::new().put_booking(booking))
            .expect("commit");

        clock.advance(Duration::hours(2));
        assert!(sweeper.sweep().expect("sweep").is_empty());
    }

    /// Refuses any commit touching one booking.
    struct RefusingStore {
        inner: InMemoryMatchingStore,
        refused: BookingId,
    }

    impl MatchingStore for RefusingStore {
        fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError> {
            self.inner.fetch_booking(id)
        }

        fn fetch_invitation(
            &self,
            id: &InvitationId,
        ) -> Result<Option<crate::workflows::invitation::domain::Invitation>, StoreError> {
            self.inner.fetch_invitation(id)
        }

        fn find_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>, StoreError> {
            self.inner.find_bookings(query)
        }

        fn find_invitations(
            &self,
            query: &InvitationQuery,
        ) -> Result<Vec<crate::workflows::invitation::domain::Invitation>, StoreError> {
            self.inner.find_invitations(query)
        }

        fn commit(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
            if transaction
                .bookings()
                .iter()
                .any(|booking| booking.id == self.refused)
            {
                return Err(StoreError::Unavailable("disk full".to_string()));
            }
            self.inner.commit(transaction)
        }
    }

    #[test]
    fn one_failing_record_does_not_stop_the_pass() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let inner = InMemoryMatchingStore::default();
        open_booking(&inner, &clock, "bkg-sweep-5");
        open_booking(&inner, &clock, "bkg-sweep-6");
        let store = Arc::new(RefusingStore {
            inner: inner.clone(),
            refused: BookingId("bkg-sweep-5".to_string()),
        });
        let sweeper =
            ExpirationSweeper::new(store, Arc::new(clock.clone()), &MatchingConfig::default());

        clock.advance(Duration::minutes(20));
        let report = sweeper.sweep().expect("sweep runs");
        assert_eq!(report.bookings_cancelled, 1);
        assert_eq!(report.failures, 1);
        assert!(!report.is_empty());

        let refused = inner
            .fetch_booking(&BookingId("bkg-sweep-5".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(refused.status, BookingStatus::PendingCleaner);
        let swept = inner
            .fetch_booking(&BookingId("bkg-sweep-6".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(swept.status, BookingStatus::Cancelled);
    }

    #[test]
    fn disabled_open_job_window_keeps_old_jobs() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let store = Arc::new(InMemoryMatchingStore::default());
        let config = MatchingConfig {
            open_job_ttl: None,
            ..MatchingConfig::default()
        };
        let sweeper = ExpirationSweeper::new(store.clone(), Arc::new(clock.clone()), &config);
        open_booking(&store, &clock, "bkg-sweep-4");

        clock.advance(Duration::days(1));
        assert!(sweeper.sweep().expect("sweep").is_empty());
    }
}
