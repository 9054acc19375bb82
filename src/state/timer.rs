use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Monotonic elapsed-time tracker for one round.
///
/// Time accrues only between [`start`](RoundTimer::start) and
/// [`freeze`](RoundTimer::freeze); a frozen timer holds its last value until
/// [`reset`](RoundTimer::reset) zeroes it. Sampling takes a short mutex and
/// is safe to call from a per-frame loop.
#[derive(Debug, Default)]
pub struct RoundTimer {
    inner: Mutex<TimerInner>,
}

#[derive(Debug, Default)]
struct TimerInner {
    /// Monotonic base of the currently running span, if any.
    base: Option<Instant>,
    /// Seconds accrued by spans that have already been frozen.
    banked: f64,
}

impl RoundTimer {
    /// A zeroed, stopped timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or resume) accruing time. A no-op if already running.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.base.is_none() {
            inner.base = Some(Instant::now());
        }
    }

    /// Stop accruing and retain the elapsed value. A no-op if not running.
    pub fn freeze(&self) {
        let mut inner = self.lock();
        if let Some(base) = inner.base.take() {
            inner.banked += base.elapsed().as_secs_f64();
        }
    }

    /// Zero the timer and clear the running base, so the next
    /// [`start`](RoundTimer::start) re-bases from zero.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.base = None;
        inner.banked = 0.0;
    }

    /// Elapsed seconds: banked time plus the currently running span.
    pub fn sample(&self) -> f64 {
        let inner = self.lock();
        inner.banked
            + inner
                .base
                .map(|base| base.elapsed().as_secs_f64())
                .unwrap_or(0.0)
    }

    /// Whether time is currently accruing.
    pub fn is_running(&self) -> bool {
        self.lock().base.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How elapsed time is rendered for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerFormat {
    /// `SS:CC` — whole seconds and hundredths. The default.
    #[default]
    SecondsCentis,
    /// `MM:SS` — whole minutes and seconds.
    MinutesSeconds,
}

/// Render elapsed seconds in the given display format.
pub fn format_elapsed(seconds: f64, format: TimerFormat) -> String {
    match format {
        TimerFormat::SecondsCentis => {
            let whole = seconds as u64;
            let centis = ((seconds - whole as f64) * 100.0) as u64 % 100;
            format!("{whole:02}:{centis:02}")
        }
        TimerFormat::MinutesSeconds => {
            let total = seconds as u64;
            format!("{:02}:{:02}", total / 60, total % 60)
        }
    }
}
