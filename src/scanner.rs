//! Due-task detection.
//!
//! Each tick walks the task list and raises a [`DueEvent`] for every task
//! whose due instant has just passed. A task is flagged in memory before
//! its `notified` flag is written to the store, so two ticks can never both
//! see it pending while the write is in flight.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Local};
use tracing::{debug, info, warn};

use crate::error::{StoreError, TaskError};
use crate::models::{Task, TaskId, TaskPatch};
use crate::storage::TaskStore;

/// Deliveries allowed for one task while its `notified` write keeps failing.
pub const MAX_DELIVERIES: u32 = 3;

/// A task that just became due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEvent {
    pub task_id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Local>,
    pub fired_at: DateTime<Local>,
}

/// Outcome of one scanner tick.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub fired: Vec<DueEvent>,
    /// Missed by more than the catch-up window; marked without firing.
    pub stale: Vec<TaskId>,
    /// Tasks whose date or time cannot be turned into an instant.
    pub invalid: Vec<(TaskId, TaskError)>,
    /// Tasks whose `notified` write failed this tick.
    pub persist_failures: Vec<TaskId>,
}

#[derive(Debug, Clone)]
struct Mark {
    /// `(date, time)` the mark was made for.
    schedule: (String, String),
    deliveries: u32,
    persisted: bool,
    /// Cleared when a failed write releases the task for re-delivery.
    held: bool,
}

pub struct DueScanner {
    window: Duration,
    marks: HashMap<TaskId, Mark>,
    reported_invalid: HashSet<TaskId>,
}

impl DueScanner {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            marks: HashMap::new(),
            reported_invalid: HashSet::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Whether `id` is flagged in memory as already handled.
    pub fn is_marked(&self, id: TaskId) -> bool {
        self.marks.get(&id).is_some_and(|m| m.held)
    }

    /// Times a due event has been raised for `id` since it was last re-armed.
    pub fn deliveries(&self, id: TaskId) -> u32 {
        self.marks.get(&id).map_or(0, |m| m.deliveries)
    }

    pub fn tick(&mut self, store: &mut dyn TaskStore, now: DateTime<Local>) -> ScanReport {
        let tasks = store.get_all();
        self.prune(&tasks);

        let mut report = ScanReport::default();
        for task in &tasks {
            if task.completed || task.notified {
                continue;
            }
            let schedule = (task.date.clone(), task.time.clone());
            let mut deliveries = 0;
            let existing = self
                .marks
                .get(&task.id)
                .map(|m| (m.schedule == schedule, m.held, m.persisted, m.deliveries));
            match existing {
                // Rescheduled since the mark was made.
                Some((false, ..)) => {
                    self.marks.remove(&task.id);
                }
                Some((true, true, persisted, _)) => {
                    if !persisted {
                        self.persist(store, task.id, &mut report);
                    }
                    continue;
                }
                Some((true, false, _, n)) => deliveries = n,
                None => {}
            }

            let scheduled_at = match task.scheduled_at() {
                Ok(at) => at,
                Err(e) => {
                    if self.reported_invalid.insert(task.id) {
                        warn!(task = %task.id, error = %e, "task excluded from reminders");
                    }
                    report.invalid.push((task.id, e));
                    continue;
                }
            };
            if scheduled_at > now {
                continue;
            }

            let elapsed = now - scheduled_at;
            let fire = elapsed < self.window;
            if fire {
                deliveries += 1;
            }
            self.marks.insert(
                task.id,
                Mark {
                    schedule,
                    deliveries,
                    persisted: false,
                    held: true,
                },
            );
            if fire {
                info!(task = %task.id, title = %task.title, "task is due");
                report.fired.push(due_event(task, scheduled_at, now));
            } else {
                debug!(task = %task.id, late_by = elapsed.num_seconds(), "skipping stale reminder");
                report.stale.push(task.id);
            }
            self.persist(store, task.id, &mut report);
        }
        report
    }

    /// Marks a task notified on explicit user acknowledgement.
    pub fn acknowledge(&mut self, store: &mut dyn TaskStore, id: TaskId) -> Result<(), StoreError> {
        store.update(id, &TaskPatch::notified())?;
        if let Some(mark) = self.marks.get_mut(&id) {
            mark.persisted = true;
            mark.held = true;
        }
        Ok(())
    }

    fn persist(&mut self, store: &mut dyn TaskStore, id: TaskId, report: &mut ScanReport) {
        let result = store.update(id, &TaskPatch::notified());
        let Some(mark) = self.marks.get_mut(&id) else {
            return;
        };
        match result {
            Ok(()) => mark.persisted = true,
            Err(e) => {
                report.persist_failures.push(id);
                if mark.deliveries > 0 && mark.deliveries < MAX_DELIVERIES {
                    warn!(task = %id, error = %e, "could not mark task notified, will re-deliver");
                    mark.held = false;
                } else {
                    warn!(task = %id, error = %e, "could not mark task notified, retrying");
                }
            }
        }
    }

    /// Forgets marks the store has caught up with.
    fn prune(&mut self, tasks: &[Task]) {
        let live: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
        self.marks
            .retain(|id, _| live.get(id).is_some_and(|t| !t.completed && !t.notified));
        self.reported_invalid.retain(|id| live.contains_key(id));
    }
}

fn due_event(task: &Task, scheduled_at: DateTime<Local>, now: DateTime<Local>) -> DueEvent {
    DueEvent {
        task_id: task.id,
        title: task.title.clone(),
        description: task.description.clone(),
        scheduled_at,
        fired_at: now,
    }
}
