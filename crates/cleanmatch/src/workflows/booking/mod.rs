//! Booking lifecycle state machine and the open marketplace of applications.

pub mod domain;
pub mod lifecycle;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationRequest, ApplicationStatus, ApplicationView, ApplyOutcome, Booking,
    BookingId, BookingRequest, BookingStats, BookingStatus, BookingView, Extras, Frequency,
    JobFilter, JobStatusUpdate, Location, PaymentDetails, PaymentMethod, PaymentRequest,
    PaymentStatus, PropertyType, Schedule, ServiceType,
};
pub use lifecycle::{
    Assignment, AssignmentSource, BookingEvent, LifecycleError, TransitionOutcome,
    CLIENT_CANCELLED_REASON, DECLINED_REASON, TIMEOUT_REASON,
};
pub use router::booking_router;
pub use service::{BookingService, BookingServiceError};
