//! Direct, time-boxed client to cleaner proposals.

pub mod domain;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    DeclineRequest, Invitation, InvitationDetails, InvitationId, InvitationReceipt,
    InvitationRequest, InvitationStatus, InvitationStatusView,
};
pub use router::invitation_router;
pub use service::{InvitationService, InvitationServiceError};
