pub mod booking;
pub mod invitation;
pub mod store;
pub mod sweeper;

pub use store::{
    BookingQuery, InvitationQuery, MatchingStore, StoreError, Transaction, MAX_COMMIT_ATTEMPTS,
};
pub use sweeper::{ExpirationSweeper, ExpiryCascade, SweepError, SweepReport};
