use cleanmatch::clock::Clock;
use cleanmatch::config::MatchingConfig;
use cleanmatch::directory::{seed_from_path, DirectoryService, RosterError};
use cleanmatch::storage::{InMemoryMatchingStore, InMemoryUserDirectory};
use cleanmatch::workflows::booking::BookingService;
use cleanmatch::workflows::invitation::InvitationService;
use cleanmatch::workflows::ExpirationSweeper;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Bookings = BookingService<InMemoryMatchingStore, InMemoryUserDirectory>;
pub(crate) type Invitations = InvitationService<InMemoryMatchingStore, InMemoryUserDirectory>;
pub(crate) type Sweeper = ExpirationSweeper<InMemoryMatchingStore>;

/// Services wired over one shared store and directory.
#[derive(Clone)]
pub(crate) struct MatchingEngine {
    pub(crate) directory: Arc<InMemoryUserDirectory>,
    pub(crate) users: Arc<DirectoryService<InMemoryUserDirectory>>,
    pub(crate) bookings: Arc<Bookings>,
    pub(crate) invitations: Arc<Invitations>,
    pub(crate) sweeper: Arc<Sweeper>,
}

impl MatchingEngine {
    pub(crate) fn in_memory(config: &MatchingConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryMatchingStore::default());
        let directory = Arc::new(InMemoryUserDirectory::default());

        let sweeper = Arc::new(ExpirationSweeper::new(store.clone(), clock.clone(), config));
        let users = Arc::new(DirectoryService::new(directory.clone(), clock.clone()));
        let bookings = Arc::new(BookingService::new(
            store.clone(),
            directory.clone(),
            clock.clone(),
        ));
        let invitations = Arc::new(InvitationService::new(
            store,
            directory.clone(),
            clock,
            sweeper.clone(),
            config,
        ));

        Self {
            directory,
            users,
            bookings,
            invitations,
            sweeper,
        }
    }

    pub(crate) fn seed_roster(&self, path: &Path) -> Result<usize, RosterError> {
        let count = seed_from_path(self.directory.as_ref(), path)?;
        info!(count, path = %path.display(), "roster loaded");
        Ok(count)
    }
}
