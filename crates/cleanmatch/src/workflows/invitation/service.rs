use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::MatchingConfig;
use crate::directory::{DirectoryError, UserDirectory, UserId, UserRole, UserSummary};
use crate::error::ErrorKind;
use crate::workflows::booking::domain::{Booking, BookingId};
use crate::workflows::booking::lifecycle::{
    self, Assignment, AssignmentSource, BookingEvent, LifecycleError,
};
use crate::workflows::booking::service::{next_booking_id, record_booking_placed};
use crate::workflows::store::{
    InvitationQuery, MatchingStore, StoreError, Transaction, MAX_COMMIT_ATTEMPTS,
};
use crate::workflows::sweeper::{ExpirationSweeper, SweepError};

use super::domain::{
    DeclineRequest, Invitation, InvitationId, InvitationReceipt, InvitationRequest,
    InvitationStatus, InvitationStatusView,
};

static INVITATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_invitation_id() -> InvitationId {
    let id = INVITATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    InvitationId(format!("inv-{id:06}"))
}

/// Direct client to cleaner proposals, each backed by its own booking.
pub struct InvitationService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    sweeper: Arc<ExpirationSweeper<S>>,
    invitation_ttl: Duration,
    default_city: String,
}

impl<S, D> InvitationService<S, D>
where
    S: MatchingStore + 'static,
    D: UserDirectory + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        clock: Arc<dyn Clock>,
        sweeper: Arc<ExpirationSweeper<S>>,
        config: &MatchingConfig,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            sweeper,
            invitation_ttl: config.invitation_ttl,
            default_city: config.default_city.clone(),
        }
    }

    /// Create the backing booking and the invitation in one commit.
    pub fn send(
        &self,
        client_id: &UserId,
        request: InvitationRequest,
    ) -> Result<InvitationReceipt, InvitationServiceError> {
        let client = self
            .directory
            .fetch(client_id)?
            .ok_or_else(|| InvitationServiceError::UserNotFound(client_id.clone()))?;
        if client.role != UserRole::Client {
            return Err(InvitationServiceError::Forbidden(
                "only a client may send invitations".to_string(),
            ));
        }

        let cleaner = self
            .directory
            .find_available_cleaner(&request.cleaner_id)?
            .ok_or_else(|| InvitationServiceError::CleanerUnavailable(request.cleaner_id.clone()))?;

        let details = request.booking_details;
        details
            .validate()
            .map_err(InvitationServiceError::Validation)?;

        let now = self.clock.now();
        let booking = Booking::open(
            next_booking_id(),
            client_id.clone(),
            details.booking_request(&self.default_city),
            now,
        );
        let invitation = Invitation {
            id: next_invitation_id(),
            booking_id: booking.id.clone(),
            cleaner_id: cleaner.id.clone(),
            client_id: client_id.clone(),
            details,
            status: InvitationStatus::Pending,
            expires_at: now + self.invitation_ttl,
            sent_at: now,
            responded_at: None,
            version: 0,
        };
        let invitation_id = invitation.id.clone();
        let booking_id = booking.id.clone();

        let mut stored = self
            .store
            .commit(Transaction::new().put_booking(booking).put_invitation(invitation))?;
        let invitation = stored
            .take_invitation(&invitation_id)
            .ok_or_else(|| InvitationServiceError::NotFound(invitation_id.clone()))?;

        record_booking_placed(self.directory.as_ref(), client_id, &booking_id);
        info!(
            invitation_id = %invitation.id,
            booking_id = %booking_id,
            cleaner_id = %cleaner.id,
            expires_at = %invitation.expires_at,
            "invitation sent"
        );

        Ok(InvitationReceipt {
            invitation_id: invitation.id,
            booking_id,
            cleaner: cleaner.summary(),
            expires_at: invitation.expires_at,
        })
    }

    /// Owning client polls an invitation. A stale one is expired as part of the read.
    pub fn status(
        &self,
        client_id: &UserId,
        invitation_id: &InvitationId,
    ) -> Result<InvitationStatusView, InvitationServiceError> {
        let mut invitation = self.fetch(invitation_id)?;
        if &invitation.client_id != client_id {
            return Err(InvitationServiceError::Forbidden(
                "invitation belongs to another client".to_string(),
            ));
        }

        if invitation.is_stale(self.clock.now()) {
            self.sweeper.expire_invitation(invitation_id)?;
            invitation = self.fetch(invitation_id)?;
        }

        let booking_status = self
            .store
            .fetch_booking(&invitation.booking_id)?
            .map(|booking| booking.status);
        Ok(InvitationStatusView {
            cleaner: self.cleaner_summary(&invitation.cleaner_id),
            invitation_id: invitation.id,
            status: invitation.status,
            booking_status,
            responded_at: invitation.responded_at,
            expires_at: invitation.expires_at,
        })
    }

    /// Cleaner accepts; the backing booking is confirmed with them assigned.
    pub fn accept(
        &self,
        cleaner_id: &UserId,
        invitation_id: &InvitationId,
    ) -> Result<Invitation, InvitationServiceError> {
        let event = BookingEvent::Assigned(Assignment {
            cleaner_id: cleaner_id.clone(),
            source: AssignmentSource::Invitation,
        });
        let invitation = self.respond(cleaner_id, invitation_id, event, InvitationStatus::Accepted)?;
        info!(invitation_id = %invitation_id, booking_id = %invitation.booking_id, "invitation accepted");
        Ok(invitation)
    }

    /// Cleaner declines; the backing booking is cancelled.
    pub fn decline(
        &self,
        cleaner_id: &UserId,
        invitation_id: &InvitationId,
        request: DeclineRequest,
    ) -> Result<Invitation, InvitationServiceError> {
        let reason = request
            .reason
            .filter(|reason| !reason.trim().is_empty());
        let event = BookingEvent::Declined { reason };
        let invitation = self.respond(cleaner_id, invitation_id, event, InvitationStatus::Declined)?;
        info!(invitation_id = %invitation_id, booking_id = %invitation.booking_id, "invitation declined");
        Ok(invitation)
    }

    /// Invitations the cleaner can still answer, newest first. Stale rows are hidden
    /// even before the sweeper has caught up with them.
    pub fn pending_for_cleaner(
        &self,
        cleaner_id: &UserId,
    ) -> Result<Vec<Invitation>, InvitationServiceError> {
        let now = self.clock.now();
        let mut invitations: Vec<Invitation> = self
            .store
            .find_invitations(&InvitationQuery {
                cleaner_id: Some(cleaner_id.clone()),
                status: Some(InvitationStatus::Pending),
                ..InvitationQuery::default()
            })?
            .into_iter()
            .filter(|invitation| invitation.is_open(now))
            .collect();
        invitations.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));
        Ok(invitations)
    }

    fn respond(
        &self,
        cleaner_id: &UserId,
        invitation_id: &InvitationId,
        event: BookingEvent,
        outcome: InvitationStatus,
    ) -> Result<Invitation, InvitationServiceError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut invitation = self.fetch(invitation_id)?;
            if &invitation.cleaner_id != cleaner_id || !invitation.is_pending() {
                return Err(InvitationServiceError::NotFound(invitation_id.clone()));
            }

            let now = self.clock.now();
            if invitation.is_stale(now) {
                self.sweeper.expire_invitation(invitation_id)?;
                debug!(invitation_id = %invitation_id, "response arrived after expiry");
                return Err(InvitationServiceError::NotFound(invitation_id.clone()));
            }

            let mut booking = self
                .store
                .fetch_booking(&invitation.booking_id)?
                .ok_or_else(|| InvitationServiceError::BookingNotFound(invitation.booking_id.clone()))?;
            lifecycle::apply(&mut booking, event.clone(), now)?;

            invitation.status = outcome;
            invitation.responded_at = Some(now);
            let transaction = Transaction::new()
                .put_booking(booking)
                .put_invitation(invitation);

            match self.store.commit(transaction) {
                Ok(mut stored) => {
                    return stored
                        .take_invitation(invitation_id)
                        .ok_or_else(|| InvitationServiceError::NotFound(invitation_id.clone()));
                }
                Err(err) if err.is_retryable() => {
                    debug!(invitation_id = %invitation_id, "invitation changed under us; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(invitation_id = %invitation_id, "giving up after repeated write conflicts");
        Err(InvitationServiceError::Contended(invitation_id.clone()))
    }

    fn fetch(&self, invitation_id: &InvitationId) -> Result<Invitation, InvitationServiceError> {
        self.store
            .fetch_invitation(invitation_id)?
            .ok_or_else(|| InvitationServiceError::NotFound(invitation_id.clone()))
    }

    fn cleaner_summary(&self, cleaner_id: &UserId) -> Option<UserSummary> {
        match self.directory.fetch(cleaner_id) {
            Ok(profile) => profile.map(|profile| profile.summary()),
            Err(err) => {
                warn!(cleaner_id = %cleaner_id, error = %err, "cleaner lookup failed");
                None
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvitationServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("invitation '{0}' not found")]
    NotFound(InvitationId),
    #[error("booking '{0}' not found")]
    BookingNotFound(BookingId),
    #[error("user '{0}' not found")]
    UserNotFound(UserId),
    #[error("cleaner '{0}' is not available")]
    CleanerUnavailable(UserId),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invitation '{0}' is busy; retry the request")]
    Contended(InvitationId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Expiry(#[from] SweepError),
}

impl InvitationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvitationServiceError::Validation(_) => ErrorKind::Validation,
            InvitationServiceError::NotFound(_)
            | InvitationServiceError::BookingNotFound(_)
            | InvitationServiceError::UserNotFound(_) => ErrorKind::NotFound,
            InvitationServiceError::CleanerUnavailable(_) => ErrorKind::Unavailable,
            InvitationServiceError::Forbidden(_) => ErrorKind::Forbidden,
            InvitationServiceError::Lifecycle(err) => err.kind(),
            InvitationServiceError::Contended(_) => ErrorKind::Conflict,
            InvitationServiceError::Store(err) => err.kind(),
            InvitationServiceError::Directory(err) => err.kind(),
            InvitationServiceError::Expiry(err) => err.kind(),
        }
    }
}
