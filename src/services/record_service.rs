use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::events::EngineEvent,
    state::{SharedEngine, game::GameRecord},
    store::RecordEntity,
};

/// Persist one completed round, fire-and-forget.
///
/// Spawned by the engine on the completing click. Quietly skips when no
/// user is signed in or no store is installed; a real save failure logs a
/// warning and surfaces as a transient [`EngineEvent::RecordSaveFailed`].
/// The completed game state is authoritative either way — nothing here
/// rolls it back.
pub async fn persist_completion(engine: SharedEngine, record: GameRecord) {
    match try_persist(&engine, &record).await {
        Ok(record_id) => {
            info!(%record_id, grid_size = %record.grid_size, "round record saved");
            engine
                .events()
                .broadcast(EngineEvent::RecordSaved { record_id });
        }
        Err(ServiceError::NotSignedIn) => {
            debug!("no signed-in user; round record not persisted");
        }
        Err(ServiceError::Degraded) => {
            debug!("no record store installed; round record not persisted");
        }
        Err(err) => {
            warn!(error = %err, "failed to save round record");
            engine.events().broadcast(EngineEvent::RecordSaveFailed {
                message: err.to_string(),
            });
        }
    }
}

async fn try_persist(engine: &SharedEngine, record: &GameRecord) -> Result<Uuid, ServiceError> {
    let Some(user_id) = engine.current_user() else {
        return Err(ServiceError::NotSignedIn);
    };
    let Some(store) = engine.record_store().await else {
        return Err(ServiceError::Degraded);
    };

    let entity = RecordEntity::from_record(record, user_id);
    let record_id = entity.id;
    store.save(entity).await?;
    Ok(record_id)
}
