use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::directory::{DirectoryError, UserDirectory, UserId, UserProfile, UserRole};
use crate::error::ErrorKind;
use crate::workflows::invitation::domain::InvitationStatus;
use crate::workflows::store::{
    BookingQuery, InvitationQuery, MatchingStore, StoreError, Transaction, MAX_COMMIT_ATTEMPTS,
};

use super::domain::{
    Application, ApplicationRequest, ApplicationView, ApplyOutcome, Booking, BookingId,
    BookingRequest, BookingStats, BookingStatus, BookingView, JobFilter, JobStatusUpdate,
    PaymentRequest, PaymentStatus,
};
use super::lifecycle::{self, Assignment, AssignmentSource, BookingEvent, LifecycleError, TransitionOutcome};

static BOOKING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_booking_id() -> BookingId {
    let id = BOOKING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BookingId(format!("bkg-{id:06}"))
}

/// Marketplace and lifecycle operations over stored bookings.
pub struct BookingService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<S, D> BookingService<S, D>
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    /// Open a new marketplace booking for `client_id`.
    pub fn create(
        &self,
        client_id: &UserId,
        request: BookingRequest,
    ) -> Result<BookingView, BookingServiceError> {
        request.validate().map_err(BookingServiceError::Validation)?;
        self.require_role(client_id, UserRole::Client)?;

        let booking = Booking::open(next_booking_id(), client_id.clone(), request, self.clock.now());
        let booking_id = booking.id.clone();
        let mut stored = self.store.commit(Transaction::new().put_booking(booking))?;
        let booking = stored
            .take_booking(&booking_id)
            .ok_or_else(|| BookingServiceError::BookingNotFound(booking_id.clone()))?;

        record_booking_placed(self.directory.as_ref(), client_id, &booking.id);
        info!(booking_id = %booking.id, client_id = %client_id, "booking created");
        self.expand(booking)
    }

    /// Booking visible to its client, its assigned cleaner, or one of its applicants.
    pub fn get(
        &self,
        requester: &UserId,
        booking_id: &BookingId,
    ) -> Result<BookingView, BookingServiceError> {
        let booking = self.fetch(booking_id)?;
        let visible = booking.is_owned_by(requester)
            || booking.is_assigned_to(requester)
            || booking.application_for(requester).is_some();
        if !visible {
            return Err(BookingServiceError::BookingNotFound(booking_id.clone()));
        }
        self.expand(booking)
    }

    /// Client's bookings, newest first.
    pub fn client_bookings(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<BookingView>, BookingServiceError> {
        let mut bookings = self.store.find_bookings(&BookingQuery {
            client_id: Some(client_id.clone()),
            ..BookingQuery::default()
        })?;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        bookings
            .into_iter()
            .map(|booking| self.expand(booking))
            .collect()
    }

    pub fn stats(&self, client_id: &UserId) -> Result<BookingStats, BookingServiceError> {
        let bookings = self.store.find_bookings(&BookingQuery {
            client_id: Some(client_id.clone()),
            ..BookingQuery::default()
        })?;

        Ok(bookings
            .iter()
            .fold(BookingStats::default(), |mut stats, booking| {
                stats.total += 1;
                if booking.status.accepts_applications() {
                    stats.open += 1;
                }
                if booking.status == BookingStatus::Completed {
                    stats.completed += 1;
                }
                if booking.payment.status == PaymentStatus::Paid {
                    stats.total_spent += u64::from(booking.total_price);
                }
                stats
            }))
    }

    /// Client cancels. Pending invitations for the booking are cancelled in the same commit.
    pub fn cancel(
        &self,
        client_id: &UserId,
        booking_id: &BookingId,
        reason: Option<String>,
    ) -> Result<BookingView, BookingServiceError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut booking = self.fetch(booking_id)?;
            if !booking.is_owned_by(client_id) {
                return Err(BookingServiceError::BookingNotFound(booking_id.clone()));
            }

            let now = self.clock.now();
            lifecycle::apply(
                &mut booking,
                BookingEvent::Cancelled {
                    reason: reason.clone(),
                },
                now,
            )?;

            let pending = self.store.find_invitations(&InvitationQuery {
                booking_id: Some(booking_id.clone()),
                status: Some(InvitationStatus::Pending),
                ..InvitationQuery::default()
            })?;
            let transaction = pending.into_iter().fold(
                Transaction::new().put_booking(booking),
                |transaction, mut invitation| {
                    invitation.status = InvitationStatus::Cancelled;
                    transaction.put_invitation(invitation)
                },
            );
            let cancelled_invitations = transaction.invitations().len();

            match self.store.commit(transaction) {
                Ok(mut stored) => {
                    let booking = stored
                        .take_booking(booking_id)
                        .ok_or_else(|| BookingServiceError::BookingNotFound(booking_id.clone()))?;
                    info!(
                        booking_id = %booking_id,
                        cancelled_invitations,
                        "booking cancelled by client"
                    );
                    return self.expand(booking);
                }
                Err(err) if err.is_retryable() => {
                    debug!(booking_id = %booking_id, "cancel raced another writer; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(BookingServiceError::Contended(booking_id.clone()))
    }

    /// Unassigned open bookings matching the marketplace filters, newest first.
    pub fn available_jobs(&self, filter: &JobFilter) -> Result<Vec<BookingView>, BookingServiceError> {
        let mut jobs: Vec<Booking> = self
            .store
            .find_bookings(&BookingQuery {
                statuses: Some(vec![BookingStatus::PendingCleaner]),
                ..BookingQuery::default()
            })?
            .into_iter()
            .filter(|booking| filter.matches(booking))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.into_iter().map(|booking| self.expand(booking)).collect()
    }

    /// Submit a bid. The first bid on a booking is accepted on the spot.
    pub fn apply(
        &self,
        cleaner_id: &UserId,
        booking_id: &BookingId,
        request: ApplicationRequest,
    ) -> Result<ApplyOutcome, BookingServiceError> {
        if request.proposed_price == Some(0) {
            return Err(BookingServiceError::Validation(
                "proposed_price must be greater than zero".to_string(),
            ));
        }
        self.require_role(cleaner_id, UserRole::Cleaner)?;

        let event = BookingEvent::ApplicationSubmitted {
            cleaner_id: cleaner_id.clone(),
            proposed_price: request.proposed_price,
            message: request.message,
        };
        let (booking, outcome) = self.transition(booking_id, event, |_| Ok(()))?;

        if outcome.auto_accepted {
            info!(booking_id = %booking_id, cleaner_id = %cleaner_id, "first application auto-accepted");
        } else {
            info!(booking_id = %booking_id, cleaner_id = %cleaner_id, "application queued for client review");
        }

        Ok(ApplyOutcome {
            booking: self.expand(booking)?,
            auto_accepted: outcome.auto_accepted,
        })
    }

    pub fn applications(
        &self,
        client_id: &UserId,
        booking_id: &BookingId,
    ) -> Result<Vec<ApplicationView>, BookingServiceError> {
        let booking = self.fetch(booking_id)?;
        if !booking.is_owned_by(client_id) {
            return Err(BookingServiceError::BookingNotFound(booking_id.clone()));
        }
        Ok(booking
            .applications
            .into_iter()
            .map(|application| self.application_view(application))
            .collect())
    }

    /// Client picks the winning applicant, overriding any auto-accepted one.
    pub fn accept_application(
        &self,
        client_id: &UserId,
        booking_id: &BookingId,
        cleaner_id: &UserId,
    ) -> Result<BookingView, BookingServiceError> {
        let event = BookingEvent::Assigned(Assignment {
            cleaner_id: cleaner_id.clone(),
            source: AssignmentSource::Application,
        });
        let (booking, _) = self.transition(booking_id, event, owned_by(client_id))?;
        info!(booking_id = %booking_id, cleaner_id = %cleaner_id, "client accepted application");
        self.expand(booking)
    }

    /// Simulated payment; confirms an accepted booking.
    pub fn complete_payment(
        &self,
        client_id: &UserId,
        booking_id: &BookingId,
        request: PaymentRequest,
    ) -> Result<BookingView, BookingServiceError> {
        let event = BookingEvent::PaymentCompleted {
            method: request.method,
            transaction_id: request.transaction_id,
        };
        let (booking, _) = self.transition(booking_id, event, owned_by(client_id))?;
        info!(booking_id = %booking_id, "payment completed; booking confirmed");
        self.expand(booking)
    }

    /// Bookings assigned to `cleaner_id`, soonest first.
    pub fn cleaner_jobs(&self, cleaner_id: &UserId) -> Result<Vec<BookingView>, BookingServiceError> {
        let mut jobs = self.store.find_bookings(&BookingQuery {
            assigned_cleaner: Some(cleaner_id.clone()),
            statuses: Some(vec![
                BookingStatus::Accepted,
                BookingStatus::Confirmed,
                BookingStatus::InProgress,
                BookingStatus::Completed,
            ]),
            ..BookingQuery::default()
        })?;
        jobs.sort_by(|a, b| a.schedule.date.cmp(&b.schedule.date).then(a.id.cmp(&b.id)));
        jobs.into_iter().map(|booking| self.expand(booking)).collect()
    }

    /// Assigned cleaner moves the job forward; completion credits the cleaner once.
    pub fn update_job_status(
        &self,
        cleaner_id: &UserId,
        booking_id: &BookingId,
        update: JobStatusUpdate,
    ) -> Result<BookingView, BookingServiceError> {
        let event = BookingEvent::JobProgressed {
            requested: update.status,
            notes: update.notes,
        };
        let cleaner = cleaner_id.clone();
        let (booking, outcome) = self.transition(booking_id, event, move |booking| {
            if booking.is_assigned_to(&cleaner) {
                Ok(())
            } else {
                Err(BookingServiceError::BookingNotFound(booking.id.clone()))
            }
        })?;

        info!(booking_id = %booking_id, status = %booking.status, "job status updated");
        if let Some(completed_by) = outcome.completed_by.as_ref() {
            record_completed_job(self.directory.as_ref(), completed_by, &booking.id);
        }
        self.expand(booking)
    }

    /// Expand referenced users for a response payload.
    pub fn expand(&self, booking: Booking) -> Result<BookingView, BookingServiceError> {
        let cleaner = match booking.assigned_cleaner.as_ref() {
            Some(cleaner_id) => self
                .directory
                .fetch(cleaner_id)?
                .map(|profile| profile.summary()),
            None => None,
        };
        let applicants = booking
            .applications
            .iter()
            .cloned()
            .map(|application| self.application_view(application))
            .collect();

        Ok(BookingView {
            booking,
            cleaner,
            applicants,
        })
    }

    fn application_view(&self, application: Application) -> ApplicationView {
        let cleaner = match self.directory.fetch(&application.cleaner_id) {
            Ok(profile) => profile.map(|profile| profile.summary()),
            Err(err) => {
                warn!(cleaner_id = %application.cleaner_id, error = %err, "applicant lookup failed");
                None
            }
        };
        ApplicationView {
            application,
            cleaner,
        }
    }

    fn fetch(&self, booking_id: &BookingId) -> Result<Booking, BookingServiceError> {
        self.store
            .fetch_booking(booking_id)?
            .ok_or_else(|| BookingServiceError::BookingNotFound(booking_id.clone()))
    }

    fn require_role(&self, user_id: &UserId, role: UserRole) -> Result<UserProfile, BookingServiceError> {
        let profile = self
            .directory
            .fetch(user_id)?
            .ok_or_else(|| BookingServiceError::UserNotFound(user_id.clone()))?;
        if profile.role != role {
            return Err(BookingServiceError::Forbidden(format!(
                "only a {} may perform this action",
                role.label()
            )));
        }
        Ok(profile)
    }

    /// Fetch, authorize, apply `event`, and commit against the read version.
    fn transition<A>(
        &self,
        booking_id: &BookingId,
        event: BookingEvent,
        authorize: A,
    ) -> Result<(Booking, TransitionOutcome), BookingServiceError>
    where
        A: Fn(&Booking) -> Result<(), BookingServiceError>,
    {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut booking = self.fetch(booking_id)?;
            authorize(&booking)?;

            let outcome = match lifecycle::apply(&mut booking, event.clone(), self.clock.now()) {
                Ok(outcome) => outcome,
                Err(err) => {
                    debug!(booking_id = %booking_id, status = %booking.status, error = %err, "transition rejected");
                    return Err(err.into());
                }
            };

            match self.store.commit(Transaction::new().put_booking(booking)) {
                Ok(mut stored) => {
                    let booking = stored
                        .take_booking(booking_id)
                        .ok_or_else(|| BookingServiceError::BookingNotFound(booking_id.clone()))?;
                    return Ok((booking, outcome));
                }
                Err(err) if err.is_retryable() => {
                    debug!(booking_id = %booking_id, "booking changed under us; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(booking_id = %booking_id, "giving up after repeated write conflicts");
        Err(BookingServiceError::Contended(booking_id.clone()))
    }
}

fn owned_by(client_id: &UserId) -> impl Fn(&Booking) -> Result<(), BookingServiceError> + '_ {
    move |booking| {
        if booking.is_owned_by(client_id) {
            Ok(())
        } else {
            Err(BookingServiceError::BookingNotFound(booking.id.clone()))
        }
    }
}

/// Client booking counter; keyed by booking so a replay counts once.
pub(crate) fn record_booking_placed<D: UserDirectory + ?Sized>(
    directory: &D,
    client_id: &UserId,
    booking_id: &BookingId,
) {
    if let Err(err) = directory.record_booking_placed(client_id, &booking_id.0) {
        warn!(client_id = %client_id, booking_id = %booking_id, error = %err, "booking counter not updated");
    }
}

fn record_completed_job<D: UserDirectory + ?Sized>(
    directory: &D,
    cleaner_id: &UserId,
    booking_id: &BookingId,
) {
    match directory.record_completed_job(cleaner_id, &booking_id.0) {
        Ok(true) => info!(cleaner_id = %cleaner_id, booking_id = %booking_id, "completed job credited"),
        Ok(false) => debug!(cleaner_id = %cleaner_id, booking_id = %booking_id, "completion already credited"),
        Err(err) => warn!(cleaner_id = %cleaner_id, booking_id = %booking_id, error = %err, "completed job counter not updated"),
    }
}

/// Error raised by the booking service.
#[derive(Debug, thiserror::Error)]
pub enum BookingServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("booking '{0}' not found")]
    BookingNotFound(BookingId),
    #[error("user '{0}' not found")]
    UserNotFound(UserId),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("booking '{0}' is busy; retry the request")]
    Contended(BookingId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl BookingServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingServiceError::Validation(_) => ErrorKind::Validation,
            BookingServiceError::BookingNotFound(_) | BookingServiceError::UserNotFound(_) => {
                ErrorKind::NotFound
            }
            BookingServiceError::Forbidden(_) => ErrorKind::Forbidden,
            BookingServiceError::Lifecycle(err) => err.kind(),
            BookingServiceError::Contended(_) => ErrorKind::Conflict,
            BookingServiceError::Store(err) => err.kind(),
            BookingServiceError::Directory(err) => err.kind(),
        }
    }
}
