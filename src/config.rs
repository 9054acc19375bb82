//! Engine configuration loading: default board size, timer cadence and
//! display format, and the click-cue resource path.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::GridSize;
use crate::state::timer::TimerFormat;

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/engine.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GRIDTAP_CONFIG_PATH";
/// Cue played on every correct click.
const DEFAULT_CLICK_CUE: &str = "sounds/click.wav";
/// Timer sampling cadence while a round is running (frame-aligned, ~60 Hz).
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Immutable runtime configuration shared across the engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Board size a fresh engine deals.
    pub default_grid_size: GridSize,
    /// Spacing between timer-tick events while a round runs.
    pub tick_interval: Duration,
    /// Resource path of the correct-click cue.
    pub click_cue_path: String,
    /// How elapsed time is rendered for display.
    pub timer_format: TimerFormat,
}

impl AppConfig {
    /// Load the engine configuration from disk, falling back to baked-in
    /// defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        grid_size = %config.default_grid_size,
                        "loaded engine config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_grid_size: GridSize::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            click_cue_path: DEFAULT_CLICK_CUE.into(),
            timer_format: TimerFormat::default(),
        }
    }
}

/// JSON representation of the configuration file located at
/// [`DEFAULT_CONFIG_PATH`]. Every field is optional; anything absent keeps
/// its default.
#[derive(Debug, Deserialize)]
struct RawConfig {
    default_grid_size: Option<u8>,
    tick_interval_ms: Option<u64>,
    click_cue: Option<String>,
    timer_format: Option<TimerFormat>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();

        let default_grid_size = match value.default_grid_size {
            Some(raw) => GridSize::try_from(raw).unwrap_or_else(|err| {
                warn!(error = %err, "ignoring configured grid size");
                defaults.default_grid_size
            }),
            None => defaults.default_grid_size,
        };

        let tick_interval = match value.tick_interval_ms {
            Some(0) => {
                warn!("tick_interval_ms must be positive; using the default");
                defaults.tick_interval
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.tick_interval,
        };

        Self {
            default_grid_size,
            tick_interval,
            click_cue_path: value.click_cue.unwrap_or(defaults.click_cue_path),
            timer_format: value.timer_format.unwrap_or(defaults.timer_format),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
