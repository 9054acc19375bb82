use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tracing::warn;

use crate::audio::CueBuffer;

/// Output seam for decoded cues.
///
/// [`CuePlayer`](crate::audio::CuePlayer) hands fully decoded buffers to a
/// sink and never waits on the result; implementations must not block the
/// caller. The rodio implementation below is the real one; tests substitute
/// their own to observe dispatches without an audio device.
pub trait CueSink: Send + Sync {
    /// Queue one playback of the given cue. Best-effort, non-blocking.
    fn dispatch(&self, cue: Arc<CueBuffer>);

    /// Forcibly stop every playback handle that is still live.
    fn stop_all(&self);
}

/// Sink that discards every cue. Useful for headless runs and tests that do
/// not care about audio.
#[derive(Debug, Default)]
pub struct NullSink;

impl CueSink for NullSink {
    fn dispatch(&self, _cue: Arc<CueBuffer>) {}

    fn stop_all(&self) {}
}

enum OutputCommand {
    Play(Arc<CueBuffer>),
    StopAll,
}

/// Rodio-backed sink.
///
/// The output stream handle is not `Send`, so a dedicated thread owns it and
/// receives playback commands over a channel. The thread (and with it the
/// output device) is only created on the first dispatch, which keeps device
/// acquisition off the startup path and plays nicely with platforms that
/// gate audio on prior user interaction.
pub struct RodioSink {
    tx: Mutex<Option<mpsc::Sender<OutputCommand>>>,
}

impl RodioSink {
    /// A sink with no output thread yet; one is spawned on first dispatch.
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    fn sender(&self) -> mpsc::Sender<OutputCommand> {
        let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("cue-output".into())
            .spawn(move || run_output(rx));
        if let Err(err) = spawned {
            // Keep the dead sender installed: sends become silent no-ops,
            // which is the contract for a cue path that cannot play.
            warn!(error = %err, "failed to spawn audio output thread; cues disabled");
        }

        *guard = Some(tx.clone());
        tx
    }
}

impl Default for RodioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CueSink for RodioSink {
    fn dispatch(&self, cue: Arc<CueBuffer>) {
        let _ = self.sender().send(OutputCommand::Play(cue));
    }

    fn stop_all(&self) {
        // Do not lazily create an output just to stop nothing.
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(OutputCommand::StopAll);
        }
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        self.stop_all();
        // Dropping the sender closes the channel and lets the thread exit.
    }
}

/// Output-thread loop: owns the device, plays each cue on its own `Sink`,
/// prunes finished handles, and stops everything when told to or when the
/// command channel closes.
fn run_output(rx: mpsc::Receiver<OutputCommand>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(err) => {
            warn!(error = %err, "no audio output device available; cues disabled");
            // Drain commands so senders never block or error loudly.
            while rx.recv().is_ok() {}
            return;
        }
    };

    let mut live: Vec<Sink> = Vec::new();
    while let Ok(command) = rx.recv() {
        live.retain(|sink| !sink.empty());
        match command {
            OutputCommand::Play(cue) => match Sink::try_new(&handle) {
                Ok(sink) => {
                    sink.append(SamplesBuffer::new(
                        cue.channels,
                        cue.sample_rate,
                        cue.samples.clone(),
                    ));
                    live.push(sink);
                }
                Err(err) => warn!(error = %err, "failed to open a playback sink"),
            },
            OutputCommand::StopAll => {
                for sink in live.drain(..) {
                    sink.stop();
                }
            }
        }
    }

    for sink in live.drain(..) {
        sink.stop();
    }
}
