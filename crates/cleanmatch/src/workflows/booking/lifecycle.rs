//! Booking status transition table.
//!
//! Every writer (marketplace applications, direct invitations, payment, job
//! progress, cancellation and the expiration sweeper) expresses its change as a
//! [`BookingEvent`] and routes it through [`apply`]. The function mutates a
//! booking in place or rejects the event without touching it.

use chrono::{DateTime, Utc};

use crate::directory::UserId;
use crate::error::ErrorKind;

use super::domain::{
    Application, ApplicationStatus, Booking, BookingStatus, PaymentMethod, PaymentStatus,
    DEFAULT_APPLICATION_MESSAGE,
};

/// Cancellation reason recorded when nobody answered in time.
pub const TIMEOUT_REASON: &str = "timeout";
pub const DECLINED_REASON: &str = "cleaner declined";
pub const CLIENT_CANCELLED_REASON: &str = "cancelled by client";

/// Which matching path produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentSource {
    /// Client picked (or re-picked) an applicant from the marketplace.
    Application,
    /// Cleaner accepted a direct invitation.
    Invitation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub cleaner_id: UserId,
    pub source: AssignmentSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingEvent {
    ApplicationSubmitted {
        cleaner_id: UserId,
        proposed_price: Option<u32>,
        message: Option<String>,
    },
    Assigned(Assignment),
    Declined {
        reason: Option<String>,
    },
    PaymentCompleted {
        method: PaymentMethod,
        transaction_id: Option<String>,
    },
    JobProgressed {
        requested: BookingStatus,
        notes: Option<String>,
    },
    Cancelled {
        reason: Option<String>,
    },
    TimedOut,
}

/// What an accepted event did to the booking.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionOutcome {
    /// `false` for idempotent no-ops such as timing out a closed booking.
    pub changed: bool,
    pub auto_accepted: bool,
    /// Cleaner credited with a finished job.
    pub completed_by: Option<UserId>,
}

impl TransitionOutcome {
    fn changed() -> Self {
        Self {
            changed: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot move booking from {current} to {requested}")]
    InvalidTransition {
        current: BookingStatus,
        requested: BookingStatus,
    },
    #[error("cleaner '{0}' has already applied for this job")]
    AlreadyApplied(UserId),
    #[error("no applications found for this booking")]
    NoApplications,
    #[error("no application found for cleaner '{0}'")]
    ApplicationNotFound(UserId),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::InvalidTransition { .. }
            | LifecycleError::AlreadyApplied(_)
            | LifecycleError::NoApplications => ErrorKind::Conflict,
            LifecycleError::ApplicationNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Apply one event to `booking`. On error the booking is left untouched.
pub fn apply(
    booking: &mut Booking,
    event: BookingEvent,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, LifecycleError> {
    let current = booking.status;
    let outcome = match event {
        BookingEvent::ApplicationSubmitted {
            cleaner_id,
            proposed_price,
            message,
        } => submit_application(booking, cleaner_id, proposed_price, message, now)?,
        BookingEvent::Assigned(assignment) => assign(booking, assignment, now)?,
        BookingEvent::Declined { reason } => {
            require(current, BookingStatus::PendingCleaner, BookingStatus::Cancelled)?;
            close(booking, reason.unwrap_or_else(|| DECLINED_REASON.to_string()), now);
            TransitionOutcome::changed()
        }
        BookingEvent::PaymentCompleted {
            method,
            transaction_id,
        } => {
            require(current, BookingStatus::Accepted, BookingStatus::Confirmed)?;
            if booking.assigned_cleaner.is_none() {
                return Err(invalid(current, BookingStatus::Confirmed));
            }
            booking.payment.status = PaymentStatus::Paid;
            booking.payment.method = Some(method);
            booking.payment.transaction_id = transaction_id;
            booking.payment.paid_at = Some(now);
            booking.status = BookingStatus::Confirmed;
            // the job is filled; outstanding bids are closed
            for application in &mut booking.applications {
                if application.status == ApplicationStatus::Pending {
                    application.status = ApplicationStatus::Rejected;
                }
            }
            TransitionOutcome::changed()
        }
        BookingEvent::JobProgressed { requested, notes } => {
            progress(booking, requested, notes, now)?
        }
        BookingEvent::Cancelled { reason } => {
            if current.is_terminal() {
                return Err(invalid(current, BookingStatus::Cancelled));
            }
            close(
                booking,
                reason.unwrap_or_else(|| CLIENT_CANCELLED_REASON.to_string()),
                now,
            );
            TransitionOutcome::changed()
        }
        BookingEvent::TimedOut => {
            if current != BookingStatus::PendingCleaner {
                return Ok(TransitionOutcome::default());
            }
            close(booking, TIMEOUT_REASON.to_string(), now);
            TransitionOutcome::changed()
        }
    };

    debug_assert!(booking.invariants_hold(), "booking invariants violated");
    Ok(outcome)
}

fn submit_application(
    booking: &mut Booking,
    cleaner_id: UserId,
    proposed_price: Option<u32>,
    message: Option<String>,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, LifecycleError> {
    if !booking.status.accepts_applications() {
        return Err(invalid(booking.status, BookingStatus::Accepted));
    }
    if booking.application_for(&cleaner_id).is_some() {
        return Err(LifecycleError::AlreadyApplied(cleaner_id));
    }

    let first = booking.applications.is_empty();
    let status = if first {
        ApplicationStatus::Accepted
    } else {
        ApplicationStatus::Pending
    };

    booking.applications.push(Application {
        cleaner_id: cleaner_id.clone(),
        status,
        proposed_price: proposed_price.unwrap_or(booking.total_price),
        message: message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APPLICATION_MESSAGE.to_string()),
        applied_at: now,
    });

    if first {
        booking.assigned_cleaner = Some(cleaner_id);
        booking.status = BookingStatus::Accepted;
        booking.accepted_at = Some(now);
    }

    Ok(TransitionOutcome {
        changed: true,
        auto_accepted: first,
        completed_by: None,
    })
}

fn assign(
    booking: &mut Booking,
    assignment: Assignment,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, LifecycleError> {
    let current = booking.status;
    match assignment.source {
        AssignmentSource::Application => {
            if !current.accepts_applications() {
                return Err(invalid(current, BookingStatus::Accepted));
            }
            if booking.applications.is_empty() {
                return Err(LifecycleError::NoApplications);
            }
            if booking.application_for(&assignment.cleaner_id).is_none() {
                return Err(LifecycleError::ApplicationNotFound(assignment.cleaner_id));
            }

            for application in &mut booking.applications {
                application.status = if application.cleaner_id == assignment.cleaner_id {
                    ApplicationStatus::Accepted
                } else {
                    ApplicationStatus::Rejected
                };
            }
            booking.assigned_cleaner = Some(assignment.cleaner_id);
            booking.status = BookingStatus::Accepted;
            booking.accepted_at = Some(now);
        }
        AssignmentSource::Invitation => {
            require(current, BookingStatus::PendingCleaner, BookingStatus::Confirmed)?;
            booking.assigned_cleaner = Some(assignment.cleaner_id);
            booking.status = BookingStatus::Confirmed;
            booking.accepted_at = Some(now);
        }
    }

    Ok(TransitionOutcome::changed())
}

fn progress(
    booking: &mut Booking,
    requested: BookingStatus,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, LifecycleError> {
    let current = booking.status;
    match (current, requested) {
        (BookingStatus::Confirmed, BookingStatus::InProgress) => {
            booking.started_at = Some(now);
        }
        (BookingStatus::InProgress, BookingStatus::Completed) => {
            booking.completed_at = Some(now);
        }
        _ => return Err(invalid(current, requested)),
    }

    booking.status = requested;
    if notes.is_some() {
        booking.cleaner_notes = notes;
    }

    let completed_by = if requested == BookingStatus::Completed {
        booking.assigned_cleaner.clone()
    } else {
        None
    };

    Ok(TransitionOutcome {
        changed: true,
        auto_accepted: false,
        completed_by,
    })
}

/// Move to `cancelled`, dropping the assignment and settling payment.
fn close(booking: &mut Booking, reason: String, now: DateTime<Utc>) {
    booking.status = BookingStatus::Cancelled;
    booking.assigned_cleaner = None;
    booking.cancelled_at = Some(now);
    booking.cancellation_reason = Some(reason);
    booking.payment.status = match booking.payment.status {
        PaymentStatus::Paid => PaymentStatus::Refunded,
        _ => PaymentStatus::Cancelled,
    };
    for application in &mut booking.applications {
        application.status = ApplicationStatus::Rejected;
    }
}

fn require(
    current: BookingStatus,
    expected: BookingStatus,
    requested: BookingStatus,
) -> Result<(), LifecycleError> {
    if current == expected {
        Ok(())
    } else {
        Err(invalid(current, requested))
    }
}

fn invalid(current: BookingStatus, requested: BookingStatus) -> LifecycleError {
    LifecycleError::InvalidTransition { current, requested }
}
