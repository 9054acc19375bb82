//! Engine state: the round machine, its timer, and the shared handle that
//! wires clicks to cues, events, and persistence.

/// Grid domain types, the board shuffle, and completed-round records.
pub mod game;
/// The round lifecycle state machine.
pub mod state_machine;
/// Monotonic round timer and display formatting.
pub mod timer;

use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use tokio::sync::{RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    audio::CuePlayer,
    config::AppConfig,
    services::{
        events::{DEFAULT_EVENT_CAPACITY, EngineEvent, EventHub},
        record_service,
    },
    store::RecordStore,
};

pub use self::game::{Board, GameRecord, GridSize, InvalidGridSize};
pub use self::state_machine::{ClickOutcome, RoundMachine, RoundPhase, RoundSnapshot};
pub use self::timer::{RoundTimer, TimerFormat, format_elapsed};

/// Shared handle to the engine. Cloning is just bumping the inner `Arc`.
pub type SharedEngine = Arc<GameEngine>;

/// The game engine: one round at a time, a timer, a cue player, an event
/// hub, and an optional record store behind it.
///
/// All mutation goes through [`click`](GameEngine::click),
/// [`reset`](GameEngine::reset), and
/// [`change_grid_size`](GameEngine::change_grid_size); observers consume
/// snapshots and events and never touch the round directly.
pub struct GameEngine {
    config: AppConfig,
    round: RwLock<RoundMachine>,
    timer: RoundTimer,
    ticker: StdMutex<Option<JoinHandle<()>>>,
    cues: Arc<CuePlayer>,
    events: EventHub,
    record_store: RwLock<Option<Arc<dyn RecordStore>>>,
    current_user: watch::Sender<Option<String>>,
}

impl GameEngine {
    /// Construct a new engine wrapped in an [`Arc`] so it can be cloned
    /// cheaply into background tasks.
    ///
    /// The engine starts in degraded mode (no record store) and with no
    /// signed-in user; completions still work, they just are not persisted.
    pub fn new(config: AppConfig, cues: Arc<CuePlayer>) -> SharedEngine {
        let (current_user, _rx) = watch::channel(None);
        Arc::new(Self {
            round: RwLock::new(RoundMachine::new(config.default_grid_size)),
            timer: RoundTimer::new(),
            ticker: StdMutex::new(None),
            cues,
            events: EventHub::new(DEFAULT_EVENT_CAPACITY),
            record_store: RwLock::new(None),
            current_user,
            config,
        })
    }

    /// Runtime configuration the engine was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The engine's event hub.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Register an observer for state, timer, and persistence events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Like [`subscribe`](Self::subscribe), but as a `Stream`.
    pub fn event_stream(&self) -> BroadcastStream<EngineEvent> {
        self.events.stream()
    }

    /// Identifier of the signed-in player, if any.
    pub fn current_user(&self) -> Option<String> {
        self.current_user.borrow().clone()
    }

    /// Update the signed-in player. The round itself behaves identically
    /// with or without one; only record persistence is gated on it.
    pub fn set_current_user(&self, user: Option<String>) {
        self.current_user.send_replace(user);
    }

    /// Subscribe to signed-in-player changes.
    pub fn user_watcher(&self) -> watch::Receiver<Option<String>> {
        self.current_user.subscribe()
    }

    /// Obtain a handle to the current record store, if one is installed.
    pub async fn record_store(&self) -> Option<Arc<dyn RecordStore>> {
        let guard = self.record_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a record store implementation and leave degraded mode.
    pub async fn install_record_store(&self, store: Arc<dyn RecordStore>) {
        let mut guard = self.record_store.write().await;
        *guard = Some(store);
    }

    /// Remove the current record store and enter degraded mode.
    pub async fn clear_record_store(&self) {
        let mut guard = self.record_store.write().await;
        guard.take();
    }

    /// Whether the engine is running without a record store.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.record_store.read().await;
        guard.is_none()
    }

    /// Snapshot the current round.
    pub async fn snapshot(&self) -> RoundSnapshot {
        self.round.read().await.snapshot()
    }

    /// Elapsed seconds of the current round.
    pub fn elapsed(&self) -> f64 {
        self.timer.sample()
    }

    /// Elapsed time rendered in the configured display format.
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.timer.sample(), self.config.timer_format)
    }

    /// Handle one cell click from the view.
    ///
    /// Correct clicks trigger the click cue without waiting on it; starting
    /// a round starts the timer and its tick loop; ending one (either way)
    /// freezes the timer. A completion additionally hands the round record
    /// to the persistence path on a detached task. Ignored clicks change
    /// nothing and broadcast nothing.
    pub async fn click(self: &Arc<Self>, value: u16) -> ClickOutcome {
        let outcome = self.round.write().await.apply_click(value);

        if outcome.is_correct() {
            self.cues.play(&self.config.click_cue_path);
        }

        match &outcome {
            ClickOutcome::Ignored => return outcome,
            ClickOutcome::Started { .. } => {
                self.timer.start();
                self.spawn_ticker();
            }
            ClickOutcome::Advanced { .. } => {}
            ClickOutcome::Completed { record } => {
                self.timer.freeze();
                self.stop_ticker();
                tokio::spawn(record_service::persist_completion(
                    Arc::clone(self),
                    record.clone(),
                ));
            }
            ClickOutcome::Failed { .. } => {
                self.timer.freeze();
                self.stop_ticker();
            }
        }

        self.broadcast_state().await;
        outcome
    }

    /// Replace the round with a fresh board and a zeroed timer.
    pub async fn reset(&self) {
        self.stop_ticker();
        self.timer.reset();
        self.round.write().await.reset();
        self.broadcast_state().await;
    }

    /// Switch board size; always resets. Whether to confirm with the player
    /// first is the view's decision.
    pub async fn change_grid_size(&self, grid_size: GridSize) {
        self.stop_ticker();
        self.timer.reset();
        self.round.write().await.change_grid_size(grid_size);
        self.broadcast_state().await;
    }

    /// Tear the engine down: cancel the tick loop and stop live cues.
    pub async fn shutdown(&self) {
        self.stop_ticker();
        self.cues.shutdown();
    }

    /// Start the timer tick loop for the running round.
    ///
    /// The task holds only a weak engine reference so an engine dropped
    /// without an explicit shutdown does not stay alive through its own
    /// ticker.
    fn spawn_ticker(self: &Arc<Self>) {
        let weak: Weak<GameEngine> = Arc::downgrade(self);
        let period = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(engine) = weak.upgrade() else { break };
                engine.events.broadcast(EngineEvent::TimerTick {
                    elapsed_seconds: engine.timer.sample(),
                });
            }
        });

        let mut guard = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    fn stop_ticker(&self) {
        let handle = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    async fn broadcast_state(&self) {
        let snapshot = self.round.read().await.snapshot();
        self.events.broadcast(EngineEvent::StateChanged(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::sync::broadcast::error::RecvError;
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::audio::NullSink;
    use crate::store::memory::MemoryRecordStore;
    use crate::store::{RecordEntity, StorageError, StorageResult};

    /// Store whose saves always fail, for the error-surfacing path.
    struct FailingStore;

    impl RecordStore for FailingStore {
        fn save(&self, _record: RecordEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "record table went away".into(),
                    io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
                ))
            })
        }

        fn records_for_user(
            &self,
            _user_id: &str,
        ) -> BoxFuture<'static, StorageResult<Vec<RecordEntity>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn all_records(&self) -> BoxFuture<'static, StorageResult<Vec<RecordEntity>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn test_engine() -> SharedEngine {
        let config = AppConfig {
            tick_interval: Duration::from_millis(20),
            ..AppConfig::default()
        };
        GameEngine::new(config, Arc::new(CuePlayer::new(Arc::new(NullSink))))
    }

    /// Receive events until `matches` accepts one, tolerating lag markers.
    async fn wait_for_event(
        receiver: &mut broadcast::Receiver<EngineEvent>,
        matches: impl Fn(&EngineEvent) -> bool,
    ) -> EngineEvent {
        let found = timeout(Duration::from_secs(2), async {
            loop {
                match receiver.recv().await {
                    Ok(event) if matches(&event) => break event,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await;
        found.expect("expected event did not arrive in time")
    }

    #[tokio::test]
    async fn full_round_completes_and_persists() {
        let engine = test_engine();
        let store = Arc::new(MemoryRecordStore::new());
        engine.install_record_store(Arc::clone(&store) as Arc<dyn RecordStore>).await;
        engine.set_current_user(Some("player-1".into()));
        let mut events = engine.subscribe();

        for value in 1..=16 {
            engine.click(value).await;
        }

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.phase, RoundPhase::Completed);
        assert_eq!(snapshot.next_expected, 17);
        assert!(snapshot.over);

        wait_for_event(&mut events, |event| {
            matches!(event, EngineEvent::RecordSaved { .. })
        })
        .await;

        let records = store.all_records().await.unwrap();
        assert_eq!(records.len(), 1, "exactly one record per completion");
        assert_eq!(records[0].grid_size, 4);
        assert_eq!(records[0].user_id, "player-1");
        assert!(records[0].duration_ms >= 0);
    }

    #[tokio::test]
    async fn wrong_click_fails_the_round_until_reset() {
        let engine = test_engine();
        engine.click(1).await;
        engine.click(2).await;

        assert_eq!(
            engine.click(7).await,
            ClickOutcome::Failed {
                expected: 3,
                clicked: 7
            }
        );
        assert!(engine.snapshot().await.over);

        // Terminal state rejects everything but reset.
        for value in [1, 3, 16] {
            assert_eq!(engine.click(value).await, ClickOutcome::Ignored);
        }

        engine.reset().await;
        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.phase, RoundPhase::NotStarted);
        assert_eq!(snapshot.next_expected, 1);
        assert_eq!(engine.elapsed(), 0.0);
    }

    #[tokio::test]
    async fn clicks_before_start_are_ignored_and_timer_stays_zero() {
        let engine = test_engine();
        for value in [2, 9, 16] {
            assert_eq!(engine.click(value).await, ClickOutcome::Ignored);
        }
        assert_eq!(engine.snapshot().await.phase, RoundPhase::NotStarted);
        assert_eq!(engine.elapsed(), 0.0);
    }

    #[tokio::test]
    async fn timer_runs_during_a_round_and_freezes_on_failure() {
        let engine = test_engine();
        let mut events = engine.subscribe();

        engine.click(1).await;
        wait_for_event(&mut events, |event| {
            matches!(event, EngineEvent::TimerTick { .. })
        })
        .await;
        sleep(Duration::from_millis(30)).await;
        assert!(engine.elapsed() > 0.0);

        engine.click(16).await; // wrong: expected 2
        let frozen = engine.elapsed();
        sleep(Duration::from_millis(30)).await;
        assert_eq!(engine.elapsed(), frozen);
    }

    #[tokio::test]
    async fn completion_without_a_user_is_not_persisted() {
        let engine = test_engine();
        let store = Arc::new(MemoryRecordStore::new());
        engine.install_record_store(Arc::clone(&store) as Arc<dyn RecordStore>).await;

        for value in 1..=16 {
            engine.click(value).await;
        }
        assert_eq!(engine.snapshot().await.phase, RoundPhase::Completed);

        sleep(Duration::from_millis(100)).await;
        assert!(store.all_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_failure_is_surfaced_but_does_not_roll_back_completion() {
        let engine = test_engine();
        engine.install_record_store(Arc::new(FailingStore)).await;
        engine.set_current_user(Some("player-1".into()));
        let mut events = engine.subscribe();

        for value in 1..=16 {
            engine.click(value).await;
        }

        wait_for_event(&mut events, |event| {
            matches!(event, EngineEvent::RecordSaveFailed { .. })
        })
        .await;
        assert_eq!(engine.snapshot().await.phase, RoundPhase::Completed);
    }

    #[tokio::test]
    async fn changing_grid_size_mid_round_resets_everything() {
        let engine = test_engine();
        engine.click(1).await;
        engine.click(2).await;

        engine.change_grid_size(GridSize::Five).await;
        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.grid_size, GridSize::Five);
        assert_eq!(snapshot.cells.len(), 25);
        assert_eq!(snapshot.phase, RoundPhase::NotStarted);
        assert_eq!(snapshot.next_expected, 1);
        assert_eq!(engine.elapsed(), 0.0);
    }

    #[tokio::test]
    async fn degraded_mode_tracks_store_installation() {
        let engine = test_engine();
        assert!(engine.is_degraded().await);

        engine
            .install_record_store(Arc::new(MemoryRecordStore::new()))
            .await;
        assert!(!engine.is_degraded().await);

        engine.clear_record_store().await;
        assert!(engine.is_degraded().await);
    }
}
