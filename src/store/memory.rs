use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;

use crate::store::{RecordEntity, RecordStore, StorageResult};

/// Record store backed by a plain in-process vector.
///
/// Used by the demo binary and by tests; a real deployment installs a
/// database-backed implementation of [`RecordStore`] instead.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<Vec<RecordEntity>>>,
}

impl MemoryRecordStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock(records: &Mutex<Vec<RecordEntity>>) -> std::sync::MutexGuard<'_, Vec<RecordEntity>> {
    records.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordStore for MemoryRecordStore {
    fn save(&self, record: RecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move {
            lock(&records).push(record);
            Ok(())
        })
    }

    fn records_for_user(
        &self,
        user_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<RecordEntity>>> {
        let records = Arc::clone(&self.records);
        let user_id = user_id.to_owned();
        Box::pin(async move {
            let matching = lock(&records)
                .iter()
                .filter(|record| record.user_id == user_id)
                .cloned()
                .collect();
            Ok(matching)
        })
    }

    fn all_records(&self) -> BoxFuture<'static, StorageResult<Vec<RecordEntity>>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move { Ok(lock(&records).clone()) })
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::state::game::{GameRecord, GridSize};

    fn record_for(user_id: &str) -> RecordEntity {
        let now = OffsetDateTime::now_utc();
        RecordEntity::from_record(
            &GameRecord {
                id: Uuid::new_v4(),
                grid_size: GridSize::Four,
                started_at: now,
                ended_at: now,
            },
            user_id,
        )
    }

    #[tokio::test]
    async fn saved_records_come_back_per_user_and_globally() {
        let store = MemoryRecordStore::new();
        store.save(record_for("alice")).await.unwrap();
        store.save(record_for("alice")).await.unwrap();
        store.save(record_for("bob")).await.unwrap();

        assert_eq!(store.records_for_user("alice").await.unwrap().len(), 2);
        assert_eq!(store.records_for_user("bob").await.unwrap().len(), 1);
        assert_eq!(store.records_for_user("carol").await.unwrap().len(), 0);
        assert_eq!(store.all_records().await.unwrap().len(), 3);
    }
}
