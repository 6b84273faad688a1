use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::error::ErrorKind;

use super::domain::{Registration, UserId, UserProfile, UserRole};
use super::repository::{DirectoryError, UserDirectory};

/// Marketplace browse limit for available cleaners.
pub const AVAILABLE_CLEANER_LIMIT: usize = 20;

pub struct DirectoryService<D> {
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<D> DirectoryService<D>
where
    D: UserDirectory + 'static,
{
    pub fn new(directory: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self { directory, clock }
    }

    pub fn register(&self, registration: Registration) -> Result<UserProfile, DirectoryServiceError> {
        let profile = self
            .directory
            .insert(registration.into_profile(self.clock.now()))?;
        info!(user_id = %profile.id, role = profile.role.label(), "user registered");
        Ok(profile)
    }

    pub fn profile(&self, id: &UserId) -> Result<UserProfile, DirectoryServiceError> {
        self.directory
            .fetch(id)?
            .ok_or_else(|| DirectoryServiceError::NotFound(id.clone()))
    }

    /// Highest rated available cleaners first.
    pub fn available_cleaners(&self) -> Result<Vec<UserProfile>, DirectoryServiceError> {
        Ok(self.directory.available_cleaners(AVAILABLE_CLEANER_LIMIT)?)
    }

    /// A cleaner toggles whether they take new work.
    pub fn set_availability(
        &self,
        cleaner_id: &UserId,
        available: bool,
    ) -> Result<UserProfile, DirectoryServiceError> {
        let profile = self.profile(cleaner_id)?;
        if profile.role != UserRole::Cleaner {
            return Err(DirectoryServiceError::Forbidden(
                "only cleaners have an availability flag".to_string(),
            ));
        }
        let profile = self.directory.set_availability(cleaner_id, available)?;
        info!(cleaner_id = %cleaner_id, available, "cleaner availability changed");
        Ok(profile)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryServiceError {
    #[error("user '{0}' not found")]
    NotFound(UserId),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl DirectoryServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryServiceError::NotFound(_) => ErrorKind::NotFound,
            DirectoryServiceError::Forbidden(_) => ErrorKind::Forbidden,
            DirectoryServiceError::Directory(err) => err.kind(),
        }
    }
}
