//! Demo binary: wires the engine to the rodio cue backend and the in-memory
//! record store, then plays one scripted round end-to-end with tracing
//! output standing in for a UI.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridtap_engine::{
    audio::{CuePlayer, RodioSink},
    config::AppConfig,
    services::events::EngineEvent,
    state::GameEngine,
    store::memory::MemoryRecordStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let cues = Arc::new(CuePlayer::new(Arc::new(RodioSink::new())));
    let engine = GameEngine::new(config, cues);

    engine
        .install_record_store(Arc::new(MemoryRecordStore::new()))
        .await;
    engine.set_current_user(Some("demo-player".into()));

    // Consume engine events in the background, the way a UI would.
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::StateChanged(snapshot)) => {
                    debug!(
                        phase = ?snapshot.phase,
                        next = snapshot.next_expected,
                        "state changed"
                    );
                }
                Ok(EngineEvent::RecordSaved { record_id }) => {
                    info!(%record_id, "record saved");
                }
                Ok(EngineEvent::RecordSaveFailed { message }) => {
                    warn!(%message, "record save failed");
                }
                Ok(EngineEvent::TimerTick { .. }) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let grid_size = engine.snapshot().await.grid_size;
    info!(%grid_size, "playing one scripted round");

    for value in 1..=grid_size.cell_count() {
        engine.click(value).await;
        sleep(Duration::from_millis(80)).await;
    }

    let snapshot = engine.snapshot().await;
    info!(
        phase = ?snapshot.phase,
        time = %engine.elapsed_display(),
        "round finished"
    );

    // Give the detached save a moment, then show what reached the store.
    sleep(Duration::from_millis(200)).await;
    if let Some(store) = engine.record_store().await {
        for record in store.all_records().await? {
            info!(
                id = %record.id,
                grid_size = record.grid_size,
                duration_ms = record.duration_ms,
                "stored record"
            );
        }
    }

    engine.shutdown().await;
    Ok(())
}

/// Configure tracing subscribers so demo output is visible by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
