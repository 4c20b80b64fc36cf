use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, TaskError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Opaque task identifier, stable for the task's lifetime.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A checklist item owned by a [`Task`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubTask {
    /// Unique within the parent task.
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Represents a single reminder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: TaskId,
    /// What has to be done.
    pub title: String,
    /// Optional longer text, also shown as the notification body.
    #[serde(default)]
    pub description: Option<String>,
    /// Scheduled calendar date, `YYYY-MM-DD`.
    ///
    /// Kept as text so a hand-edited database with a bad value still loads.
    pub date: String,
    /// Scheduled wall time, `HH:MM` (24h).
    pub time: String,
    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,
    /// Pinned tasks sort to the top of every view.
    #[serde(default)]
    pub pinned: bool,
    /// Timestamp when the task was created (RFC 3339).
    pub created_at: String,
    #[serde(default)]
    pub subtasks: Vec<SubTask>,
    /// Set once the due alarm has been raised (or skipped as stale).
    #[serde(default)]
    pub notified: bool,
}

impl Task {
    pub fn scheduled_date(&self) -> Result<NaiveDate, TaskError> {
        parse_date(&self.date)
    }

    pub fn scheduled_time(&self) -> Result<NaiveTime, TaskError> {
        parse_time(&self.time)
    }

    /// The local instant the task is due.
    ///
    /// A repeated local time (clocks going back) resolves to the earlier
    /// instant; a skipped one is an error.
    pub fn scheduled_at(&self) -> Result<DateTime<Local>, TaskError> {
        let naive = self.scheduled_date()?.and_time(self.scheduled_time()?);
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| TaskError::NonexistentLocalTime {
                date: self.date.clone(),
                time: self.time.clone(),
            })
    }

    /// Applies a partial update in place.
    ///
    /// Moving the schedule re-arms the reminder unless the patch sets
    /// `notified` itself.
    pub fn apply(&mut self, patch: &TaskPatch) {
        let mut rescheduled = false;
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(date) = &patch.date {
            rescheduled |= *date != self.date;
            self.date = date.clone();
        }
        if let Some(time) = &patch.time {
            rescheduled |= *time != self.time;
            self.time = time.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(subtasks) = &patch.subtasks {
            self.subtasks = subtasks.clone();
        }
        match patch.notified {
            Some(notified) => self.notified = notified,
            None if rescheduled => self.notified = false,
            None => {}
        }
    }

    /// Completed and total subtask counts.
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }

    pub fn next_subtask_id(&self) -> u32 {
        self.subtasks.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }
}

/// Partial update for [`Task`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub completed: Option<bool>,
    pub pinned: Option<bool>,
    pub subtasks: Option<Vec<SubTask>>,
    pub notified: Option<bool>,
}

impl TaskPatch {
    pub fn notified() -> Self {
        Self {
            notified: Some(true),
            ..Self::default()
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub date: String,
    pub time: String,
    pub pinned: bool,
    pub subtasks: Vec<String>,
}

impl NewTask {
    /// Validates the input and builds the stored record.
    pub fn into_task(self, id: TaskId, created_at: DateTime<Local>) -> Result<Task, TaskError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        let date = parse_date(self.date.trim())?;
        let time = parse_time(self.time.trim())?;
        let subtasks = self
            .subtasks
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .zip(1..)
            .map(|(title, id)| SubTask {
                id,
                title: title.to_string(),
                completed: false,
            })
            .collect();
        Ok(Task {
            id,
            title: title.to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            date: date.format(DATE_FORMAT).to_string(),
            time: time.format(TIME_FORMAT).to_string(),
            completed: false,
            pinned: self.pinned,
            created_at: created_at.to_rfc3339(),
            subtasks,
            notified: false,
        })
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, TaskError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| TaskError::InvalidDate(s.to_string()))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, TaskError> {
    NaiveTime::parse_from_str(s, TIME_FORMAT).map_err(|_| TaskError::InvalidTime(s.to_string()))
}

/// View selector; never stored on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterCategory {
    #[default]
    All,
    Today,
    Upcoming,
    Pinned,
    Completed,
}

impl FilterCategory {
    pub const ALL: [FilterCategory; 5] = [
        FilterCategory::All,
        FilterCategory::Today,
        FilterCategory::Upcoming,
        FilterCategory::Pinned,
        FilterCategory::Completed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterCategory::All => "all",
            FilterCategory::Today => "today",
            FilterCategory::Upcoming => "upcoming",
            FilterCategory::Pinned => "pinned",
            FilterCategory::Completed => "completed",
        }
    }

    /// The next category, wrapping around. Used by the TUI tab key.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FilterCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::UnknownFilter(s.to_string()))
    }
}
