use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::Local;
use ratatui::widgets::TableState;
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::commands::{
    cmd_add, cmd_complete, cmd_edit, cmd_pin, cmd_remove, cmd_set_muted, cmd_subtask_add, sync_from_disk,
    TaskEdit,
};
use crate::config::{Settings, SettingsWatcher};
use crate::error::AppError;
use crate::models::{FilterCategory, NewTask, SubTask, Task, TaskId, TaskPatch, DATE_FORMAT};
use crate::reminder::ReminderEngine;
use crate::storage::{JsonTaskStore, TaskStore};
use crate::suggest::SubtaskSuggester;
use crate::view::{TaskCounts, ViewCache};

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
    Adding,
    Searching,
    ConfirmDelete,
}

pub enum InputField {
    None,
    Title,
    Description,
    Date,
    Time,
    Subtask,
}

/// State for the multi-step "Add Task" wizard.
#[derive(Default)]
pub struct AddState {
    pub title: String,
    pub date: String,
    pub time: String,
    pub step: usize, // 0: Title, 1: Date, 2: Time, 3: Description
}

pub struct App {
    pub store: JsonTaskStore,
    pub engine: ReminderEngine<SystemClock>,
    pub suggester: Box<dyn SubtaskSuggester>,
    pub settings_path: PathBuf,
    pub settings: SettingsWatcher,
    /// Bumped by the store on every change it sees, ours or another
    /// process's.
    changes: Rc<Cell<u64>>,
    /// Current view, filtered and sorted.
    pub tasks: Vec<Task>,
    pub counts: TaskCounts,
    pub view_cache: ViewCache,
    pub filter: FilterCategory,
    pub search: String,
    pub state: TableState,
    pub input_mode: InputMode,
    pub input_field: InputField,
    pub input_buffer: String,
    pub target_id: Option<TaskId>,
    pub add_state: AddState,
    /// One-line feedback shown above the help bar.
    pub status: Option<String>,
}

impl App {
    /// Creates a new App instance and loads initial data.
    pub fn new(
        mut store: JsonTaskStore,
        settings: &Settings,
        settings_path: PathBuf,
        engine: ReminderEngine<SystemClock>,
        suggester: Box<dyn SubtaskSuggester>,
    ) -> App {
        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        store.subscribe(Box::new(move |_: &[Task]| counter.set(counter.get() + 1)));
        let mut app = App {
            store,
            engine,
            suggester,
            settings: SettingsWatcher::new(settings_path.clone(), settings.clone()),
            settings_path,
            changes,
            tasks: Vec::new(),
            counts: TaskCounts::default(),
            view_cache: ViewCache::default(),
            filter: FilterCategory::All,
            search: String::new(),
            state: TableState::default(),
            input_mode: InputMode::Normal,
            input_field: InputField::None,
            input_buffer: String::new(),
            target_id: None,
            add_state: AddState::default(),
            status: None,
        };
        if settings.muted {
            app.status = Some("Silent mode is on (m to unmute)".into());
        }
        app.refresh();
        app
    }

    /// Runs one reminder tick and refreshes the view.
    pub fn tick(&mut self) {
        sync_from_disk(&mut self.store, &mut self.settings, &mut self.engine);
        let report = self.engine.tick(&mut self.store);
        if let Some(event) = report.fired.last() {
            self.status = Some(format!("⏰ {} is due! Esc: stop alarm", event.title));
        }
        self.refresh();
    }

    /// Every key press counts as a user interaction for audio unlock.
    pub fn on_key(&mut self) {
        self.engine.on_user_gesture();
    }

    /// Recomputes the visible list if the store, filter, search or minute
    /// changed.
    pub fn refresh(&mut self) {
        let now = self.engine.clock().now();
        let (tasks, counts) = self.view_cache.get(
            self.changes.get(),
            || self.store.get_all(),
            self.filter,
            &self.search,
            now,
        );
        self.tasks = tasks.to_vec();
        self.counts = counts;

        if self.tasks.is_empty() {
            self.state.select(None);
        } else if let Some(i) = self.state.selected() {
            if i >= self.tasks.len() {
                self.state.select(Some(self.tasks.len() - 1));
            }
        } else {
            self.state.select(Some(0));
        }
    }

    /// Selects the next task in the list.
    pub fn next(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.tasks.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    /// Selects the previous task in the list.
    pub fn previous(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.tasks.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn selected(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.tasks.get(i))
    }

    fn report(&mut self, result: Result<(), AppError>) {
        if let Err(e) = result {
            self.status = Some(format!("Error: {}", e));
        }
        self.refresh();
    }

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.state.select(Some(0));
        self.refresh();
    }

    /// Toggles completion of the selected task; always silences the alarm.
    pub fn complete_selected(&mut self) {
        let Some(id) = self.selected().map(|t| t.id) else { return };
        self.engine.on_task_completed(id);
        let result = cmd_complete(&mut self.store, id, true).map(|_| ());
        self.report(result);
    }

    pub fn pin_selected(&mut self) {
        let Some(id) = self.selected().map(|t| t.id) else { return };
        let result = cmd_pin(&mut self.store, id, true).map(|_| ());
        self.report(result);
    }

    /// Asks for confirmation before deleting.
    pub fn start_delete(&mut self) {
        if let Some(id) = self.selected().map(|t| t.id) {
            self.target_id = Some(id);
            self.input_mode = InputMode::ConfirmDelete;
        }
    }

    pub fn confirm_delete(&mut self) {
        self.input_mode = InputMode::Normal;
        let Some(id) = self.target_id.take() else { return };
        self.engine.on_task_deleted(id);
        let result = cmd_remove(&mut self.store, id, true);
        self.report(result);
    }

    /// Stops a ringing alarm and marks its task notified.
    pub fn stop_alarm(&mut self) {
        match self.engine.acknowledge_current(&mut self.store) {
            Some(id) => self.status = Some(format!("Alarm for task {} stopped", id)),
            // A preview has no task to acknowledge.
            None => self.engine.stop_alarm(),
        }
        self.refresh();
    }

    pub fn toggle_mute(&mut self) {
        let muted = !self.engine.is_muted();
        self.engine.set_muted(muted);
        if let Err(e) = cmd_set_muted(&self.settings_path, muted, true) {
            warn!(error = %e, "could not save silent mode");
        }
        self.status = Some(if muted { "Silent mode on".into() } else { "Silent mode off".into() });
    }

    pub fn preview_sound(&mut self) {
        if self.engine.player().is_active() {
            self.engine.stop_alarm();
            return;
        }
        self.engine.preview();
        self.status = Some("Previewing alarm sound, Esc to stop".into());
    }

    /// Appends AI-suggested subtasks to the selected task.
    pub fn suggest_for_selected(&mut self) {
        let Some(task) = self.selected().cloned() else { return };
        let steps = self.suggester.suggest(&task.title);
        if steps.is_empty() {
            self.status = Some("No suggestions available".into());
            return;
        }
        let mut subtasks = task.subtasks.clone();
        let mut next_id = task.next_subtask_id();
        for title in steps {
            subtasks.push(SubTask { id: next_id, title, completed: false });
            next_id += 1;
        }
        let patch = TaskPatch { subtasks: Some(subtasks), ..TaskPatch::default() };
        let result = self.store.update(task.id, &patch).map_err(AppError::from);
        self.report(result);
    }

    pub fn start_search(&mut self) {
        self.input_mode = InputMode::Searching;
        self.input_buffer = self.search.clone();
    }

    /// Applies the search box live while typing.
    pub fn update_search(&mut self) {
        self.search = self.input_buffer.clone();
        self.state.select(Some(0));
        self.refresh();
    }

    /// Initiates the "Add Task" wizard.
    pub fn start_add(&mut self) {
        self.input_mode = InputMode::Adding;
        self.add_state = AddState {
            date: Local::now().format(DATE_FORMAT).to_string(),
            time: "09:00".into(),
            ..AddState::default()
        };
        self.input_buffer.clear();
    }

    /// Initiates editing of a specific field for the selected task.
    pub fn start_edit(&mut self, field: InputField) {
        let Some(t) = self.selected().cloned() else { return };
        self.target_id = Some(t.id);
        self.input_mode = InputMode::Editing;
        // Pre-fill buffer for editing
        self.input_buffer = match field {
            InputField::Title => t.title,
            InputField::Description => t.description.unwrap_or_default(),
            InputField::Date => t.date,
            InputField::Time => t.time,
            InputField::Subtask | InputField::None => String::new(),
        };
        self.input_field = field;
    }

    pub fn cancel_input(&mut self) {
        if self.input_mode == InputMode::Searching {
            self.search.clear();
            self.refresh();
        }
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.target_id = None;
    }

    /// Handles text input based on the current mode.
    pub fn handle_input(&mut self) {
        match self.input_mode {
            InputMode::Adding => self.handle_adding_input(),
            InputMode::Editing => self.handle_editing_input(),
            InputMode::Searching => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            _ => {}
        }
    }

    /// Handles input for the "Add Task" wizard.
    fn handle_adding_input(&mut self) {
        match self.add_state.step {
            0 => {
                // Title
                if !self.input_buffer.trim().is_empty() {
                    self.add_state.title = self.input_buffer.clone();
                    self.add_state.step += 1;
                    self.input_buffer.clear();
                }
            }
            1 => {
                // Date, empty keeps today
                if !self.input_buffer.trim().is_empty() {
                    self.add_state.date = self.input_buffer.clone();
                }
                self.add_state.step += 1;
                self.input_buffer.clear();
            }
            2 => {
                // Time, empty keeps 09:00
                if !self.input_buffer.trim().is_empty() {
                    self.add_state.time = self.input_buffer.clone();
                }
                self.add_state.step += 1;
                self.input_buffer.clear();
            }
            3 => {
                // Description (optional), finish add
                let input = NewTask {
                    title: self.add_state.title.clone(),
                    description: Some(self.input_buffer.clone()),
                    date: self.add_state.date.clone(),
                    time: self.add_state.time.clone(),
                    pinned: false,
                    subtasks: Vec::new(),
                };
                let clock = SystemClock;
                let result = cmd_add(&mut self.store, &clock, input, None, true).map(|_| ());
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
                self.report(result);
            }
            _ => {}
        }
    }

    /// Handles input for the "Edit Task" mode.
    fn handle_editing_input(&mut self) {
        let Some(id) = self.target_id.take() else {
            self.input_mode = InputMode::Normal;
            return;
        };
        let value = std::mem::take(&mut self.input_buffer);
        let result = match self.input_field {
            InputField::Title => cmd_edit(&mut self.store, id, TaskEdit { title: Some(value), ..TaskEdit::default() }, true),
            InputField::Description => cmd_edit(
                &mut self.store,
                id,
                TaskEdit {
                    clear_description: value.trim().is_empty(),
                    description: Some(value),
                    ..TaskEdit::default()
                },
                true,
            ),
            InputField::Date => cmd_edit(&mut self.store, id, TaskEdit { date: Some(value), ..TaskEdit::default() }, true),
            InputField::Time => cmd_edit(&mut self.store, id, TaskEdit { time: Some(value), ..TaskEdit::default() }, true),
            InputField::Subtask => cmd_subtask_add(&mut self.store, id, value, true).map(|_| ()),
            InputField::None => Ok(()),
        };
        self.input_mode = InputMode::Normal;
        self.input_field = InputField::None;
        self.report(result);
    }

    /// Stops reminders and releases audio before the terminal is restored.
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }
}
