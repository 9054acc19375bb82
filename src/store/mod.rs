//! Persistence boundary for completed-round records.
//!
//! The engine only ever talks to [`RecordStore`]; what sits behind it (a
//! database, a remote API, the in-memory store shipped here) is a deployment
//! concern. Save failures are reported to the caller and never affect game
//! state.

/// In-memory record store for tests and the demo binary.
pub mod memory;

use std::error::Error;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::game::GameRecord;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of what failed.
        message: String,
        /// Backend-specific cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Wire shape of one persisted round record.
///
/// Start and end times are unix-millisecond values encoded as strings, and
/// `duration_ms` is derived from them here at the boundary — the state
/// machine itself only ever deals in timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntity {
    /// Primary key of the record.
    pub id: Uuid,
    /// Identifier of the signed-in player the record belongs to.
    pub user_id: String,
    /// Board dimension (4, 5, or 6).
    pub grid_size: u8,
    /// Unix milliseconds of the starting click, string-encoded.
    pub start_time: String,
    /// Unix milliseconds of the completing click, string-encoded.
    pub end_time: String,
    /// `end - start`, in milliseconds.
    pub duration_ms: i64,
    /// When the record was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl RecordEntity {
    /// Build the wire shape from a completed-round record and its owner.
    pub fn from_record(record: &GameRecord, user_id: impl Into<String>) -> Self {
        let start_ms = unix_millis(record.started_at);
        let end_ms = unix_millis(record.ended_at);
        Self {
            id: record.id,
            user_id: user_id.into(),
            grid_size: record.grid_size.into(),
            start_time: start_ms.to_string(),
            end_time: end_ms.to_string(),
            duration_ms: end_ms - start_ms,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

fn unix_millis(timestamp: OffsetDateTime) -> i64 {
    (timestamp.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Abstraction over the persistence layer for round records.
pub trait RecordStore: Send + Sync {
    /// Persist one completed-round record.
    fn save(&self, record: RecordEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Records belonging to one player, for their personal stats.
    fn records_for_user(&self, user_id: &str)
    -> BoxFuture<'static, StorageResult<Vec<RecordEntity>>>;

    /// Every stored record, for leaderboard-style listings.
    fn all_records(&self) -> BoxFuture<'static, StorageResult<Vec<RecordEntity>>>;
}
