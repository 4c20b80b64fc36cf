use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use chrono::{DateTime, Local};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use tracing::warn;

use crate::alarm::{PlaybackOutcome, SystemSink};
use crate::clock::{Clock, SystemClock};
use crate::config::{load_settings, save_settings, validate_sound, Settings, SettingsWatcher};
use crate::error::{AppError, StoreError};
use crate::models::{parse_date, parse_time, FilterCategory, NewTask, SubTask, Task, TaskId, TaskPatch, DATE_FORMAT, TIME_FORMAT};
use crate::notify::NotificationDispatcher;
use crate::reminder::ReminderEngine;
use crate::storage::{JsonTaskStore, TaskStore};
use crate::suggest::SubtaskSuggester;
use crate::view::{self, TaskCounts};

/// Adds a new task to the store.
///
/// With a suggester, AI-proposed steps are appended after the given
/// subtasks.
pub fn cmd_add(
    store: &mut dyn TaskStore,
    clock: &dyn Clock,
    mut input: NewTask,
    suggester: Option<&dyn SubtaskSuggester>,
    silent: bool,
) -> Result<TaskId, AppError> {
    if let Some(suggester) = suggester {
        let steps = suggester.suggest(&input.title);
        if !silent {
            if steps.is_empty() {
                println!("No subtask suggestions available.");
            } else {
                println!("Added {} suggested subtasks.", steps.len());
            }
        }
        input.subtasks.extend(steps);
    }
    let id = store.next_id();
    let task = input.into_task(id, clock.now())?;
    store.insert(task)?;
    if !silent {
        println!("Task added (id = {})", id);
    }
    Ok(id)
}

/// Flips the completion flag. Returns the new state.
pub fn cmd_complete(store: &mut dyn TaskStore, id: TaskId, silent: bool) -> Result<bool, AppError> {
    let task = find(store, id)?;
    let completed = !task.completed;
    store.update(
        id,
        &TaskPatch {
            completed: Some(completed),
            ..TaskPatch::default()
        },
    )?;
    if !silent {
        if completed {
            println!("Task {} marked as complete.", id);
        } else {
            println!("Task {} reopened.", id);
        }
    }
    Ok(completed)
}

/// Flips the pinned flag. Returns the new state.
pub fn cmd_pin(store: &mut dyn TaskStore, id: TaskId, silent: bool) -> Result<bool, AppError> {
    let task = find(store, id)?;
    let pinned = !task.pinned;
    store.update(
        id,
        &TaskPatch {
            pinned: Some(pinned),
            ..TaskPatch::default()
        },
    )?;
    if !silent {
        println!("Task {} {}.", id, if pinned { "pinned" } else { "unpinned" });
    }
    Ok(pinned)
}

/// Removes a task from the store by ID.
pub fn cmd_remove(store: &mut dyn TaskStore, id: TaskId, silent: bool) -> Result<(), AppError> {
    if !store.remove(id)? {
        return Err(StoreError::NotFound(id).into());
    }
    if !silent {
        println!("Task {} removed.", id);
    }
    Ok(())
}

/// Fields `edit` may change; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub clear_description: bool,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Edits an existing task's details.
///
/// Changing the date or time re-arms the reminder.
pub fn cmd_edit(store: &mut dyn TaskStore, id: TaskId, edit: TaskEdit, silent: bool) -> Result<(), AppError> {
    find(store, id)?;
    let mut patch = TaskPatch::default();
    if let Some(title) = edit.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(crate::error::TaskError::EmptyTitle.into());
        }
        patch.title = Some(title.to_string());
    }
    if edit.clear_description {
        patch.description = Some(None);
    } else if let Some(d) = edit.description {
        let d = d.trim();
        patch.description = Some((!d.is_empty()).then(|| d.to_string()));
    }
    if let Some(d) = edit.date {
        patch.date = Some(parse_date(d.trim())?.format(DATE_FORMAT).to_string());
    }
    if let Some(t) = edit.time {
        patch.time = Some(parse_time(t.trim())?.format(TIME_FORMAT).to_string());
    }
    store.update(id, &patch)?;
    if !silent {
        println!("Task {} updated.", id);
    }
    Ok(())
}

/// Appends a subtask. Returns its id.
pub fn cmd_subtask_add(store: &mut dyn TaskStore, id: TaskId, title: String, silent: bool) -> Result<u32, AppError> {
    let task = find(store, id)?;
    let title = title.trim();
    if title.is_empty() {
        return Err(crate::error::TaskError::EmptyTitle.into());
    }
    let sub_id = task.next_subtask_id();
    let mut subtasks = task.subtasks;
    subtasks.push(SubTask {
        id: sub_id,
        title: title.to_string(),
        completed: false,
    });
    store.update(
        id,
        &TaskPatch {
            subtasks: Some(subtasks),
            ..TaskPatch::default()
        },
    )?;
    if !silent {
        println!("Subtask {} added to task {}.", sub_id, id);
    }
    Ok(sub_id)
}

/// Flips a subtask's completion flag. Returns the new state.
pub fn cmd_subtask_toggle(store: &mut dyn TaskStore, id: TaskId, sub: u32, silent: bool) -> Result<bool, AppError> {
    let mut subtasks = find(store, id)?.subtasks;
    let item = subtasks
        .iter_mut()
        .find(|s| s.id == sub)
        .ok_or(AppError::SubtaskNotFound { task: id, sub })?;
    item.completed = !item.completed;
    let completed = item.completed;
    store.update(
        id,
        &TaskPatch {
            subtasks: Some(subtasks),
            ..TaskPatch::default()
        },
    )?;
    if !silent {
        println!("Subtask {} {}.", sub, if completed { "done" } else { "reopened" });
    }
    Ok(completed)
}

pub fn cmd_subtask_remove(store: &mut dyn TaskStore, id: TaskId, sub: u32, silent: bool) -> Result<(), AppError> {
    let mut subtasks = find(store, id)?.subtasks;
    let len_before = subtasks.len();
    subtasks.retain(|s| s.id != sub);
    if subtasks.len() == len_before {
        return Err(AppError::SubtaskNotFound { task: id, sub });
    }
    store.update(
        id,
        &TaskPatch {
            subtasks: Some(subtasks),
            ..TaskPatch::default()
        },
    )?;
    if !silent {
        println!("Subtask {} removed from task {}.", sub, id);
    }
    Ok(())
}

/// Prints AI suggestions for a title.
pub fn cmd_suggest(suggester: &dyn SubtaskSuggester, title: &str) -> Vec<String> {
    let steps = suggester.suggest(title);
    if steps.is_empty() {
        println!("No suggestions.");
    }
    for (i, step) in steps.iter().enumerate() {
        println!("{}. {}", i + 1, step);
    }
    steps
}

/// Lists the filtered, sorted view in a table, followed by the counts.
pub fn cmd_list(store: &dyn TaskStore, clock: &dyn Clock, filter: FilterCategory, search: &str) {
    let now = clock.now();
    let tasks = store.get_all();
    let shown = view::view(&tasks, filter, search, now);
    let counts = view::counts(&tasks, now);
    if shown.is_empty() {
        println!("No tasks found.");
    } else {
        println!("{}", task_table(&shown, now));
    }
    println!("{}", counts_line(&counts, filter));
}

/// Builds the task table shown by `list`.
pub fn task_table(tasks: &[Task], now: DateTime<Local>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Subtasks").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for t in tasks {
        let overdue = view::is_overdue(t, now);
        let due_color = if overdue {
            Color::Red
        } else if view::is_today(t, now) {
            Color::Cyan
        } else {
            Color::Reset
        };
        let (done, total) = t.subtask_progress();
        let (status, status_color) = if t.completed {
            ("Done", Color::Green)
        } else if overdue {
            ("Overdue", Color::Red)
        } else {
            ("Pending", Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(if t.pinned { "📌" } else { "" }),
            Cell::new(&t.title),
            Cell::new(format!("{} {}", t.date, t.time)).fg(due_color),
            Cell::new(if total > 0 { format!("{}/{}", done, total) } else { String::new() }),
            Cell::new(status).fg(status_color),
        ]);
    }
    table
}

/// `all 4 | today 2 | ...`, with the active filter in brackets.
pub fn counts_line(counts: &TaskCounts, active: FilterCategory) -> String {
    FilterCategory::ALL
        .iter()
        .map(|&c| {
            if c == active {
                format!("[{} {}]", c, counts.get(c))
            } else {
                format!("{} {}", c, counts.get(c))
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Stores a custom alarm sound after checking it.
pub fn cmd_sound_set(settings_path: &Path, sound: &Path, silent: bool) -> Result<(), AppError> {
    let sound = validate_sound(sound)?;
    let mut settings = load_settings(settings_path)?;
    settings.sound = Some(sound.clone());
    save_settings(settings_path, &settings)?;
    if !silent {
        println!("Alarm sound set to {}.", sound.display());
    }
    Ok(())
}

pub fn cmd_sound_reset(settings_path: &Path, silent: bool) -> Result<(), AppError> {
    let mut settings = load_settings(settings_path)?;
    settings.sound = None;
    save_settings(settings_path, &settings)?;
    if !silent {
        println!("Alarm sound reset to the default.");
    }
    Ok(())
}

pub fn cmd_set_muted(settings_path: &Path, muted: bool, silent: bool) -> Result<(), AppError> {
    let mut settings = load_settings(settings_path)?;
    settings.muted = muted;
    save_settings(settings_path, &settings)?;
    if !silent {
        println!("{}", if muted { "Alarm sound muted." } else { "Alarm sound unmuted." });
    }
    Ok(())
}

/// Plays the configured sound until Enter is pressed.
pub fn cmd_sound_preview(settings: &Settings) -> Result<(), AppError> {
    let mut engine = system_engine(settings);
    if engine.preview() == PlaybackOutcome::Blocked {
        println!("Could not play the alarm sound.");
        return Ok(());
    }
    println!("Playing alarm sound, press Enter to stop.");
    let (tx, rx) = mpsc::channel();
    spawn_stdin_reader(tx);
    loop {
        match rx.recv_timeout(settings.tick_interval()) {
            Err(RecvTimeoutError::Timeout) => engine.pump_audio(),
            _ => break,
        }
    }
    engine.shutdown();
    Ok(())
}

fn system_engine(settings: &Settings) -> ReminderEngine<SystemClock> {
    ReminderEngine::new(
        SystemClock,
        settings,
        Box::new(SystemSink::new()),
        NotificationDispatcher::system(settings.notifications),
    )
}

fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

/// Picks up task and settings changes made by other processes before a
/// reminder tick.
pub fn sync_from_disk<C: Clock>(
    store: &mut JsonTaskStore,
    settings: &mut SettingsWatcher,
    engine: &mut ReminderEngine<C>,
) {
    if let Err(e) = store.reload() {
        warn!(error = %e, "could not reload task database");
    }
    if let Some(changed) = settings.poll() {
        engine.apply_settings(changed);
    }
}

/// Runs reminders in the foreground until `q` is entered.
///
/// Each line on stdin counts as a user interaction; an empty line or `s`
/// stops a ringing alarm and acknowledges its task, `m` toggles silent
/// mode.
pub fn cmd_watch(store: &mut JsonTaskStore, settings: &Settings, settings_path: &Path) -> Result<(), AppError> {
    let mut engine = system_engine(settings);
    let mut watcher = SettingsWatcher::new(settings_path, settings.clone());
    let (tx, rx) = mpsc::channel();
    spawn_stdin_reader(tx);
    let mut input_open = true;
    println!(
        "Watching {} for due tasks. Enter/s: stop alarm, m: mute, q: quit.",
        store.path().display()
    );

    loop {
        sync_from_disk(store, &mut watcher, &mut engine);
        let report = engine.tick(store);
        for event in &report.fired {
            println!(
                "⏰ {} (task {}, due {})",
                event.title,
                event.task_id,
                event.scheduled_at.format("%Y-%m-%d %H:%M")
            );
        }

        let tick = watcher.current().tick_interval();
        if !input_open {
            thread::sleep(tick);
            continue;
        }
        match rx.recv_timeout(tick) {
            Ok(line) => {
                engine.on_user_gesture();
                match line.trim() {
                    "q" => break,
                    "" | "s" => {
                        if let Some(id) = engine.acknowledge_current(store) {
                            println!("Alarm for task {} stopped.", id);
                        }
                    }
                    "m" => {
                        let muted = !engine.is_muted();
                        engine.set_muted(muted);
                        if let Err(e) = cmd_set_muted(settings_path, muted, false) {
                            warn!(error = %e, "could not save silent mode");
                        }
                    }
                    other => println!("Unknown input '{}'. Enter/s: stop alarm, m: mute, q: quit.", other),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => input_open = false,
        }
    }
    engine.shutdown();
    println!("Stopped watching.");
    Ok(())
}

fn find(store: &dyn TaskStore, id: TaskId) -> Result<Task, AppError> {
    store.get(id).ok_or_else(|| StoreError::NotFound(id).into())
}
