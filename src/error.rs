use thiserror::Error;

use crate::store::StorageError;

/// Errors that can occur on the record-persistence path.
///
/// The state machine itself has no error type — invalid clicks are defined
/// as no-ops — so this only covers why a completed round's record did not
/// reach the store.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed the save.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No storage backend is installed (degraded mode).
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// No user is signed in; records are only kept for signed-in players.
    #[error("no signed-in user")]
    NotSignedIn,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}
