use std::path::PathBuf;

use crate::models::TaskId;

/// Problems with a single task record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task title must not be empty")]
    EmptyTitle,
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    /// The local date/time does not exist (daylight-saving gap).
    #[error("{date} {time} does not exist in the local time zone")]
    NonexistentLocalTime { date: String, time: String },
}

/// Failures of the task store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("task database is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Injected by in-memory stores to simulate a failing backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reading or writing settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("settings file is invalid: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("sound file {} does not exist", .0.display())]
    SoundMissing(PathBuf),
    #[error("sound file {} is {size} bytes, the limit is {limit}", .path.display())]
    SoundTooLarge { path: PathBuf, size: u64, limit: u64 },
}

/// Playback was rejected by the audio backend.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio player available for {}", .0.display())]
    NoPlayer(PathBuf),
    #[error("audio output released")]
    Released,
    #[error("audio output failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("playback blocked: {0}")]
    Blocked(String),
}

/// A system notification could not be shown.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification backend unavailable")]
    Unavailable,
    #[error("notification command failed: {0}")]
    Command(#[from] std::io::Error),
    #[error("notification command exited with {0}")]
    Exit(std::process::ExitStatus),
}

/// Top-level error for CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("subtask {sub} not found on task {task}")]
    SubtaskNotFound { task: TaskId, sub: u32 },
    #[error("unknown filter '{0}', expected one of all, today, upcoming, pinned, completed")]
    UnknownFilter(String),
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}
