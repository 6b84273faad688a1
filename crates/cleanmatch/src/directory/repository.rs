use crate::error::ErrorKind;

use super::domain::{UserId, UserProfile};

/// Directory of clients and cleaners consumed by the matching engines.
///
/// Counter updates take the booking that caused them so a replayed event is
/// counted once; implementations return `false` when the key was already seen.
pub trait UserDirectory: Send + Sync {
    fn insert(&self, profile: UserProfile) -> Result<UserProfile, DirectoryError>;
    fn fetch(&self, id: &UserId) -> Result<Option<UserProfile>, DirectoryError>;
    fn available_cleaners(&self, limit: usize) -> Result<Vec<UserProfile>, DirectoryError>;
    fn set_availability(&self, id: &UserId, available: bool)
        -> Result<UserProfile, DirectoryError>;
    fn record_booking_placed(&self, client_id: &UserId, booking_key: &str)
        -> Result<bool, DirectoryError>;
    fn record_completed_job(&self, cleaner_id: &UserId, booking_key: &str)
        -> Result<bool, DirectoryError>;

    /// Cleaner that exists, has the cleaner role, and is taking work.
    fn find_available_cleaner(&self, id: &UserId) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self
            .fetch(id)?
            .filter(|profile| profile.is_available_cleaner()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("a user with {field} '{value}' already exists")]
    DuplicateKey { field: &'static str, value: String },
    #[error("user '{0}' not found")]
    NotFound(UserId),
    #[error("invalid profile: {0}")]
    Invalid(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            DirectoryError::NotFound(_) => ErrorKind::NotFound,
            DirectoryError::Invalid(_) => ErrorKind::Validation,
            DirectoryError::Unavailable(_) => ErrorKind::Internal,
        }
    }
}
