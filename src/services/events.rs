use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::state_machine::RoundSnapshot;

/// Default capacity of the engine's broadcast channel. Slow observers that
/// fall further behind than this see a lag marker, not blocked gameplay.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Notifications fanned out to every engine observer.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The round mutated (click, reset, or grid-size change); a full
    /// snapshot rides along so observers never have to query back.
    StateChanged(RoundSnapshot),
    /// Periodic timer reading while a round is running.
    TimerTick {
        /// Elapsed seconds at the time of the tick.
        elapsed_seconds: f64,
    },
    /// A completed-round record reached the store.
    RecordSaved {
        /// Identifier of the stored record.
        record_id: Uuid,
    },
    /// A completed-round record could not be saved. Transient and
    /// informational; the completed state stands regardless.
    RecordSaveFailed {
        /// Human-readable reason, for a toast-style notification.
        message: String,
    },
}

/// Broadcast hub decoupling the engine from whatever renders it.
pub struct EventHub {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the
    /// given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new observer that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Like [`subscribe`](Self::subscribe), but wrapped as a `Stream` for
    /// `async` consumers.
    pub fn stream(&self) -> BroadcastStream<EngineEvent> {
        BroadcastStream::new(self.subscribe())
    }

    /// Send an event to all current observers, ignoring delivery errors.
    pub fn broadcast(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}
