use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::storage::data_dir;

/// Largest custom alarm sound accepted, in bytes (4.5 MiB).
pub const MAX_SOUND_BYTES: u64 = 4_718_592;

/// Default time between scanner ticks.
pub const DEFAULT_TICK_SECS: u64 = 2;

/// Default catch-up window for due tasks (five minutes).
pub const DEFAULT_WINDOW_SECS: u64 = 300;

/// User settings, stored as `settings.toml` next to the task database.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Custom alarm sound; `None` uses the built-in alarm.
    pub sound: Option<PathBuf>,
    /// Silent mode: due tasks still notify but no sound is played.
    pub muted: bool,
    /// Whether system notifications may be shown.
    pub notifications: bool,
    /// Seconds between scanner ticks, clamped to 1..=5.
    pub tick_secs: u64,
    /// How late a reminder may still fire after its due time.
    pub catch_up_window_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound: None,
            muted: false,
            notifications: true,
            tick_secs: DEFAULT_TICK_SECS,
            catch_up_window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs.clamp(1, 5))
    }

    /// Falls back to the default window when the value is too large to
    /// represent.
    pub fn catch_up_window(&self) -> chrono::Duration {
        i64::try_from(self.catch_up_window_secs.max(1))
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| {
                warn!(
                    secs = self.catch_up_window_secs,
                    "catch-up window out of range, using default"
                );
                chrono::Duration::seconds(DEFAULT_WINDOW_SECS as i64)
            })
    }
}

pub fn settings_path() -> PathBuf {
    data_dir().join("settings.toml")
}

/// Loads settings; a missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = toml::from_str(&text)?;
    debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

/// Re-reads `settings.toml` so a running loop sees changes made by the
/// CLI.
pub struct SettingsWatcher {
    path: PathBuf,
    current: Settings,
    failing: bool,
}

impl SettingsWatcher {
    pub fn new(path: impl Into<PathBuf>, current: Settings) -> Self {
        Self {
            path: path.into(),
            current,
            failing: false,
        }
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }

    /// Returns the new settings if the file changed since the last poll.
    ///
    /// A broken file keeps the last good settings and is logged once until
    /// it loads again.
    pub fn poll(&mut self) -> Option<&Settings> {
        match load_settings(&self.path) {
            Ok(settings) => {
                self.failing = false;
                if settings == self.current {
                    return None;
                }
                debug!(path = %self.path.display(), "settings changed on disk");
                self.current = settings;
                Some(&self.current)
            }
            Err(e) => {
                if !self.failing {
                    warn!(error = %e, "could not reload settings, keeping the previous ones");
                    self.failing = true;
                }
                None
            }
        }
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let text = toml::to_string_pretty(settings)?;
    fs::write(path, text).map_err(io_err)
}

/// Checks a custom sound file before it is stored in the settings.
pub fn validate_sound(path: &Path) -> Result<PathBuf, ConfigError> {
    let meta = fs::metadata(path).map_err(|_| ConfigError::SoundMissing(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(ConfigError::SoundMissing(path.to_path_buf()));
    }
    if meta.len() > MAX_SOUND_BYTES {
        return Err(ConfigError::SoundTooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit: MAX_SOUND_BYTES,
        });
    }
    Ok(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
}
