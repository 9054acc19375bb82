//! Fire-and-forget playback of short cue sounds.
//!
//! The click path calls [`CuePlayer::play`] and moves on: loading and
//! decoding happen on a background task, decoded buffers are cached for the
//! lifetime of the player, rapid duplicate triggers are throttled, and every
//! failure is logged instead of surfaced. Sound is cosmetic here — nothing
//! in the game may depend on a cue actually playing.

/// Playback output seam and its rodio implementation.
pub mod backend;

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rodio::{Decoder, Source};
use thiserror::Error;
use tracing::{debug, warn};

pub use self::backend::{CueSink, NullSink, RodioSink};

/// Minimum spacing between two plays of the same resource. Rapid UI events
/// (double-dispatched clicks, key repeat) inside this window collapse into
/// one playback.
pub const CUE_THROTTLE: Duration = Duration::from_millis(50);

/// A fully decoded cue, ready to be handed to an output sink any number of
/// times.
#[derive(Debug, Clone)]
pub struct CueBuffer {
    /// Resource path the cue was loaded from.
    pub path: String,
    /// Interleaved channel count.
    pub channels: u16,
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Interleaved samples.
    pub samples: Vec<f32>,
}

/// Why a cue could not be loaded. Internal to the audio path; callers of
/// [`CuePlayer::play`] never see it.
#[derive(Debug, Error)]
pub enum CueError {
    /// The resource could not be read from disk.
    #[error("failed to read cue `{path}`")]
    Read {
        /// Resource path that failed.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// The bytes were read but are not decodable audio.
    #[error("failed to decode cue `{path}`")]
    Decode {
        /// Resource path that failed.
        path: String,
        /// Underlying decoder error.
        #[source]
        source: rodio::decoder::DecoderError,
    },
    /// Decoding succeeded but produced no samples.
    #[error("cue `{path}` decoded to no samples")]
    Empty {
        /// Resource path that failed.
        path: String,
    },
}

/// Loads, caches, throttles, and plays cue sounds.
///
/// One player is shared engine-wide; its cache maps resource paths to
/// decoded buffers and is populated at most once per path (failures leave it
/// empty so a later play retries). The player is always used behind an
/// [`Arc`] so load tasks can reach it after the caller has moved on.
pub struct CuePlayer {
    backend: Arc<dyn CueSink>,
    cache: DashMap<String, Arc<CueBuffer>>,
    loading: DashMap<String, ()>,
    last_played: DashMap<String, Instant>,
    throttle: Duration,
}

impl CuePlayer {
    /// Player with the default 50 ms throttle.
    pub fn new(backend: Arc<dyn CueSink>) -> Self {
        Self::with_throttle(backend, CUE_THROTTLE)
    }

    /// Player with a custom throttle window (tests use zero).
    pub fn with_throttle(backend: Arc<dyn CueSink>, throttle: Duration) -> Self {
        Self {
            backend,
            cache: DashMap::new(),
            loading: DashMap::new(),
            last_played: DashMap::new(),
            throttle,
        }
    }

    /// Request one playback of `path`. Never blocks, never fails.
    ///
    /// Repeat requests for the same path inside the throttle window are
    /// dropped, as are requests for a path whose first load is still in
    /// flight (those still refresh the throttle stamp so a burst does not
    /// retrigger the moment the window elapses). The first successful load
    /// also plays, so the initial click is not swallowed.
    pub fn play(self: &Arc<Self>, path: &str) {
        let now = Instant::now();
        let throttled = self
            .last_played
            .get(path)
            .is_some_and(|last| now.duration_since(*last) < self.throttle);
        if throttled {
            return;
        }
        self.last_played.insert(path.to_owned(), now);

        let cached = self.cache.get(path).map(|entry| Arc::clone(entry.value()));
        if let Some(cue) = cached {
            self.backend.dispatch(cue);
            return;
        }

        if self.loading.insert(path.to_owned(), ()).is_some() {
            // First load still in flight; it will play on completion.
            return;
        }

        let player = Arc::clone(self);
        let path = path.to_owned();
        tokio::spawn(async move {
            match load_cue(&path).await {
                Ok(cue) => {
                    let cue = Arc::new(cue);
                    debug!(cue = %path, samples = cue.samples.len(), "cue decoded and cached");
                    player.cache.insert(path.clone(), Arc::clone(&cue));
                    player.loading.remove(&path);
                    player.backend.dispatch(cue);
                }
                Err(err) => {
                    // Leave the cache empty so a later play retries the load.
                    warn!(cue = %path, error = %err, "cue load failed; playback skipped");
                    player.loading.remove(&path);
                }
            }
        });
    }

    /// Stop every live playback handle. Loads already in flight are not
    /// cancelled; their cues may still sound afterwards, which is fine for
    /// purely cosmetic audio.
    pub fn shutdown(&self) {
        self.backend.stop_all();
    }
}

async fn load_cue(path: &str) -> Result<CueBuffer, CueError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CueError::Read {
        path: path.to_owned(),
        source,
    })?;
    decode_cue(path, bytes)
}

fn decode_cue(path: &str, bytes: Vec<u8>) -> Result<CueBuffer, CueError> {
    let decoder = Decoder::new(Cursor::new(bytes)).map_err(|source| CueError::Decode {
        path: path.to_owned(),
        source,
    })?;

    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples().collect();
    if samples.is_empty() {
        return Err(CueError::Empty {
            path: path.to_owned(),
        });
    }

    Ok(CueBuffer {
        path: path.to_owned(),
        channels,
        sample_rate,
        samples,
    })
}
