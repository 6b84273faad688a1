//! Clients and cleaners: profiles, availability and the counters the matching
//! engines maintain on them.

pub mod domain;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;

pub use domain::{
    AvailabilityUpdate, Registration, UserId, UserProfile, UserRole, UserSummary, DEFAULT_AVATAR,
    DEFAULT_RATING,
};
pub use repository::{DirectoryError, UserDirectory};
pub use roster::{parse_roster, seed_from_path, RosterError};
pub use router::directory_router;
pub use service::{DirectoryService, DirectoryServiceError, AVAILABLE_CLEANER_LIMIT};
