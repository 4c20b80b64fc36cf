use std::cmp::Ordering;

use chrono::{DateTime, Local, Timelike};

use crate::models::{FilterCategory, Task};

/// Per-category task counts for the sidebar/status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub all: usize,
    pub today: usize,
    pub upcoming: usize,
    pub pinned: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn get(&self, filter: FilterCategory) -> usize {
        match filter {
            FilterCategory::All => self.all,
            FilterCategory::Today => self.today,
            FilterCategory::Upcoming => self.upcoming,
            FilterCategory::Pinned => self.pinned,
            FilterCategory::Completed => self.completed,
        }
    }
}

/// Case-insensitive substring match on title and description.
pub fn matches_search(task: &Task, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(&q)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&q))
}

pub fn is_today(task: &Task, now: DateTime<Local>) -> bool {
    task.scheduled_date()
        .is_ok_and(|d| d == now.date_naive())
}

/// Strictly in the future and on a later calendar day than `now`.
///
/// A task due later today belongs to `today`, never to both.
pub fn is_upcoming(task: &Task, now: DateTime<Local>) -> bool {
    task.scheduled_at().is_ok_and(|at| at > now) && !is_today(task, now)
}

/// Not completed, past its due instant and not due today.
pub fn is_overdue(task: &Task, now: DateTime<Local>) -> bool {
    !task.completed && task.scheduled_at().is_ok_and(|at| at < now) && !is_today(task, now)
}

pub fn matches_filter(task: &Task, filter: FilterCategory, now: DateTime<Local>) -> bool {
    match filter {
        FilterCategory::All => true,
        FilterCategory::Today => is_today(task, now),
        FilterCategory::Upcoming => is_upcoming(task, now),
        FilterCategory::Pinned => task.pinned,
        FilterCategory::Completed => task.completed,
    }
}

/// Pinned first, then earliest due instant; unparseable schedules last.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    b.pinned.cmp(&a.pinned).then_with(|| {
        match (a.scheduled_at().ok(), b.scheduled_at().ok()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    })
}

/// Derives the ordered view for a filter and search query.
pub fn view(tasks: &[Task], filter: FilterCategory, query: &str, now: DateTime<Local>) -> Vec<Task> {
    let mut result: Vec<Task> = tasks
        .iter()
        .filter(|t| matches_search(t, query))
        .filter(|t| matches_filter(t, filter, now))
        .cloned()
        .collect();
    // sort_by is stable
    result.sort_by(compare_tasks);
    result
}

/// Counts over the whole, unfiltered task set.
pub fn counts(tasks: &[Task], now: DateTime<Local>) -> TaskCounts {
    let count = |filter| tasks.iter().filter(|t| matches_filter(t, filter, now)).count();
    TaskCounts {
        all: tasks.len(),
        today: count(FilterCategory::Today),
        upcoming: count(FilterCategory::Upcoming),
        pinned: count(FilterCategory::Pinned),
        completed: count(FilterCategory::Completed),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    revision: u64,
    filter: FilterCategory,
    query: String,
    minute: DateTime<Local>,
}

/// Memoizes [`view`] and [`counts`].
///
/// Schedules have minute resolution, so the result is reused until the
/// store revision, the filter, the query or the current minute changes.
#[derive(Debug, Default)]
pub struct ViewCache {
    key: Option<CacheKey>,
    tasks: Vec<Task>,
    counts: TaskCounts,
    recomputed: usize,
}

impl ViewCache {
    pub fn get(
        &mut self,
        revision: u64,
        all_tasks: impl FnOnce() -> Vec<Task>,
        filter: FilterCategory,
        query: &str,
        now: DateTime<Local>,
    ) -> (&[Task], TaskCounts) {
        let minute = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        let key = CacheKey {
            revision,
            filter,
            query: query.to_string(),
            minute,
        };
        if self.key.as_ref() != Some(&key) {
            let tasks = all_tasks();
            self.tasks = view(&tasks, filter, query, now);
            self.counts = counts(&tasks, now);
            self.key = Some(key);
            self.recomputed += 1;
        }
        (&self.tasks, self.counts)
    }

    /// How many times the view has been rebuilt.
    pub fn recomputed(&self) -> usize {
        self.recomputed
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
