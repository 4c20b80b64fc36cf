use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::{Task, TaskId, TaskPatch};

/// Called with the full task list after every successful write.
pub type ChangeListener = Box<dyn FnMut(&[Task])>;

/// Ordered task set the rest of the program reads from and writes to.
pub trait TaskStore {
    /// All tasks in store order (newest first).
    fn get_all(&self) -> Vec<Task>;

    /// Applies a partial update to one task.
    fn update(&mut self, id: TaskId, patch: &TaskPatch) -> Result<(), StoreError>;

    /// Adds a task at the front of the list.
    fn insert(&mut self, task: Task) -> Result<(), StoreError>;

    /// Deletes a task; `Ok(false)` if there was nothing to delete.
    fn remove(&mut self, id: TaskId) -> Result<bool, StoreError>;

    /// Bumped on every successful write.
    fn revision(&self) -> u64;

    fn subscribe(&mut self, listener: ChangeListener);

    fn get(&self, id: TaskId) -> Option<Task> {
        self.get_all().into_iter().find(|t| t.id == id)
    }

    fn next_id(&self) -> TaskId {
        TaskId(self.get_all().iter().map(|t| t.id.0).max().unwrap_or(0) + 1)
    }
}

/// Returns the path to the tasks database file (`tasks.json`).
///
/// The path is determined in the following order:
/// 1. `DAILYFOCUS_DB` environment variable.
/// 2. `~/.local/share/dailyfocus/tasks.json` (on Linux).
/// 3. `./tasks.json` (fallback).
pub fn db_path() -> PathBuf {
    std::env::var("DAILYFOCUS_DB").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = data_dir();
        p.push("tasks.json");
        p
    })
}

/// Directory holding the database, settings and log file.
pub fn data_dir() -> PathBuf {
    if let Ok(db) = std::env::var("DAILYFOCUS_DB") {
        let mut p = PathBuf::from(db);
        p.pop();
        if p.as_os_str().is_empty() {
            p.push(".");
        }
        return p;
    }
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("dailyfocus");
    p
}

/// Task list persisted as pretty-printed JSON.
///
/// Reads are served from a copy cached on open; [`JsonTaskStore::reload`]
/// picks up edits made by another process (e.g. the CLI while `watch` runs).
/// Every write re-reads the file first, so it never overwrites a change the
/// cache has not seen yet.
pub struct JsonTaskStore {
    path: PathBuf,
    tasks: Vec<Task>,
    revision: u64,
    listeners: Vec<ChangeListener>,
}

impl JsonTaskStore {
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(db_path())
    }

    /// Opens the database at `path`; a missing file is an empty list.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tasks = load_tasks(&path)?;
        debug!(path = %path.display(), count = tasks.len(), "opened task database");
        Ok(Self {
            path,
            tasks,
            revision: 0,
            listeners: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file, bumping the revision and notifying listeners if
    /// anything changed.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let tasks = load_tasks(&self.path)?;
        if tasks != self.tasks {
            debug!(path = %self.path.display(), "task database changed on disk");
            self.replace(tasks);
        }
        Ok(())
    }

    fn replace(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.revision += 1;
        for listener in self.listeners.iter_mut() {
            listener(&self.tasks);
        }
    }

    fn commit(&mut self, tasks: Vec<Task>) -> Result<(), StoreError> {
        save_tasks(&self.path, &tasks)?;
        self.replace(tasks);
        Ok(())
    }
}

impl TaskStore for JsonTaskStore {
    fn get_all(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    fn update(&mut self, id: TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        let mut tasks = load_tasks(&self.path)?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        task.apply(patch);
        self.commit(tasks)
    }

    fn insert(&mut self, task: Task) -> Result<(), StoreError> {
        let mut tasks = load_tasks(&self.path)?;
        tasks.insert(0, task);
        self.commit(tasks)
    }

    fn remove(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let mut tasks = load_tasks(&self.path)?;
        let len_before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == len_before {
            if tasks != self.tasks {
                self.replace(tasks);
            }
            return Ok(false);
        }
        self.commit(tasks)?;
        Ok(true)
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// Allocated from the file so a task added by another process is not
    /// given the same id.
    fn next_id(&self) -> TaskId {
        let on_disk = load_tasks(&self.path).unwrap_or_else(|e| {
            warn!(error = %e, "could not re-read task database, using cached ids");
            self.tasks.clone()
        });
        let max = on_disk
            .iter()
            .chain(self.tasks.iter())
            .map(|t| t.id.0)
            .max()
            .unwrap_or(0);
        TaskId(max + 1)
    }
}

/// Loads all tasks from `path`.
///
/// A missing file is an empty list; an unreadable or corrupt one is an error
/// so that a later save cannot silently wipe the user's tasks.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut f = OpenOptions::new().read(true).open(path).map_err(io_err)?;
    let mut s = String::new();
    f.read_to_string(&mut s).map_err(io_err)?;
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&s)?)
}

/// Saves the given list of tasks to `path`.
///
/// Writes a sibling temp file and renames it over the database.
pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let s = serde_json::to_string_pretty(tasks)?;
    let tmp = path.with_extension("json.tmp");
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .map_err(io_err)?;
    f.write_all(s.as_bytes()).map_err(io_err)?;
    f.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        warn!(path = %path.display(), "failed to replace task database");
        io_err(e)
    })
}

/// In-process store, used by tests and as a scratch store.
///
/// `fail_updates` makes every `update` fail, to exercise the scanner's
/// persistence-failure path.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Vec<Task>,
    revision: u64,
    listeners: Vec<ChangeListener>,
    pub fail_updates: bool,
    /// Number of `update` calls seen, successful or not.
    pub update_calls: usize,
}

impl MemoryTaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    fn changed(&mut self) {
        self.revision += 1;
        for listener in self.listeners.iter_mut() {
            listener(&self.tasks);
        }
    }
}

impl TaskStore for MemoryTaskStore {
    fn get_all(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    fn update(&mut self, id: TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        self.update_calls += 1;
        if self.fail_updates {
            return Err(StoreError::Unavailable("updates disabled".into()));
        }
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        task.apply(patch);
        self.changed();
        Ok(())
    }

    fn insert(&mut self, task: Task) -> Result<(), StoreError> {
        self.tasks.insert(0, task);
        self.changed();
        Ok(())
    }

    fn remove(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let len_before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == len_before {
            return Ok(false);
        }
        self.changed();
        Ok(true)
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }
}
