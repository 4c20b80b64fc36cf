//! # DailyFocus
//!
//! A terminal task planner that rings when things are due. DailyFocus combines a fast CLI for quick entry with a TUI (Terminal User Interface) that keeps watching your schedule.
//!
//! ## Features
//!
//! *   **Due Reminders**: Every task has a date and a time. When it comes due, DailyFocus shows a desktop notification and loops an alarm sound until you stop it.
//! *   **Late Catch-up**: A task that came due while nothing was running still fires if you start within five minutes; older ones are skipped silently.
//! *   **Filters & Search**: All, Today, Upcoming, Pinned and Completed views, with live counts and case-insensitive search over titles and descriptions.
//! *   **Pinning**: Pinned tasks always sort first.
//! *   **Subtasks**: Break tasks into checklist items, or let Gemini suggest them (`GEMINI_API_KEY`).
//! *   **Custom Alarm**: Use any audio file up to 4.5 MB, preview it, or mute everything with silent mode.
//! *   **Data Persistence**: Tasks are stored in standard XDG data directories (JSON format).
//!
//! ## Installation
//!
//! ```bash
//! cargo install --path .
//! ```
//!
//! ## Usage
//!
//! ### Interactive Mode (TUI)
//!
//! Simply run the command without arguments to launch the interactive UI:
//!
//! ```bash
//! dailyfocus
//! # or explicitly
//! dailyfocus ui
//! ```
//!
//! #### TUI Key Bindings
//!
//! *   `q`: Quit
//! *   `a`: Add new task
//! *   `Space`: Toggle Done
//! *   `d`: Delete selected task (asks first)
//! *   `n` / `x` / `t` / `h`: Edit title / description / date / time
//! *   `s`: Add a subtask, `g`: Suggest subtasks
//! *   `p`: Pin or unpin
//! *   `Tab`: Next filter, `/`: Search
//! *   `Esc`: Stop the ringing alarm
//! *   `m`: Toggle silent mode, `P`: Preview the alarm sound
//!
//! ### Command Line Interface (CLI)
//!
//! ```bash
//! # Add a task for today at 14:30
//! dailyfocus add "Call the bank" --time 14:30
//!
//! # List what is due today, matching "bank"
//! dailyfocus list --filter today --search bank
//!
//! # Ring in the foreground without the TUI
//! dailyfocus watch
//!
//! # Use your own alarm
//! dailyfocus sound set ~/Music/alarm.mp3
//! ```
//!
//! ## Data Storage
//!
//! Tasks are saved in your local data directory:
//! *   Linux: `~/.local/share/dailyfocus/tasks.json`
//! *   macOS: `~/Library/Application Support/dailyfocus/tasks.json`
//! *   Windows: `%LOCALAPPDATA%\dailyfocus\tasks.json`
//!
//! Settings live next to it in `settings.toml`. You can override the location by setting the `DAILYFOCUS_DB` environment variable.
//!
//! ## Logging
//!
//! `RUST_LOG` controls verbosity (default `dailyfocus=info`). The TUI logs to `dailyfocus.log` in the data directory.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use dailyfocus::clock::SystemClock;
use dailyfocus::commands::*;
use dailyfocus::config::{load_settings, settings_path, Settings};
use dailyfocus::error::AppError;
use dailyfocus::models::{FilterCategory, NewTask, TaskId, DATE_FORMAT};
use dailyfocus::storage::{data_dir, JsonTaskStore};
use dailyfocus::suggest::suggester_from_env;
use dailyfocus::tui::run_tui;

#[derive(Parser)]
#[command(name = "dailyfocus")]
#[command(about = "Daily task planner with due-time alarms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        /// Date in YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
        /// Time in HH:MM (default: 09:00)
        #[arg(short, long, default_value = "09:00")]
        time: String,
        /// Description
        #[arg(long = "desc")]
        description: Option<String>,
        /// Pin the task
        #[arg(short, long)]
        pin: bool,
        /// Subtask, may be repeated
        #[arg(short, long = "subtask")]
        subtasks: Vec<String>,
        /// Ask Gemini for subtasks
        #[arg(long)]
        suggest: bool,
    },
    /// List tasks, pinned first then by due time
    List {
        /// all, today, upcoming, pinned or completed
        #[arg(short, long, default_value = "all")]
        filter: String,
        /// Case-insensitive search on title and description
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Toggle a task's completion
    Complete { id: u64 },
    /// Pin or unpin a task
    Pin { id: u64 },
    /// Remove a task
    Remove { id: u64 },
    /// Edit a task
    Edit {
        id: u64,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long = "desc")]
        description: Option<String>,
        /// Remove the description
        #[arg(long = "clear-desc", conflicts_with = "description")]
        clear_description: bool,
        /// New date (re-arms the reminder)
        #[arg(short, long)]
        date: Option<String>,
        /// New time (re-arms the reminder)
        #[arg(short, long)]
        time: Option<String>,
    },
    /// Manage subtasks
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },
    /// Print suggested subtasks for a title
    Suggest { title: String },
    /// Configure the alarm sound
    Sound {
        #[command(subcommand)]
        command: SoundCommands,
    },
    /// Turn on silent mode (notifications only)
    Mute,
    /// Turn off silent mode
    Unmute,
    /// Ring reminders in the foreground
    Watch,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Open interactive TUI
    Ui,
}

#[derive(Subcommand)]
enum SubtaskCommands {
    /// Add a subtask
    Add { id: u64, title: String },
    /// Toggle a subtask's completion
    Toggle { id: u64, sub: u32 },
    /// Remove a subtask
    Remove { id: u64, sub: u32 },
}

#[derive(Subcommand)]
enum SoundCommands {
    /// Use an audio file (at most 4.5 MB) as the alarm
    Set { path: PathBuf },
    /// Go back to the default alarm
    Reset,
    /// Play the alarm until Enter is pressed
    Preview,
}

fn main() {
    let cli = Cli::parse();
    let is_tui = matches!(cli.command, Some(Commands::Ui) | None);
    init_logging(is_tui);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(is_tui: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dailyfocus=info"));
    if !is_tui {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(filter)
            .init();
        return;
    }

    // The alternate screen hides stderr, so the TUI logs to a file.
    let dir = data_dir();
    let file = fs::create_dir_all(&dir)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(dir.join("dailyfocus.log")));
    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(filter)
            .init(),
        Err(e) => eprintln!("Warning: could not open log file: {}", e),
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let settings_file = settings_path();
    match cli.command {
        Some(Commands::Add { title, date, time, description, pin, subtasks, suggest }) => {
            let mut store = JsonTaskStore::open_default()?;
            let input = NewTask {
                title,
                description,
                date: date.unwrap_or_else(|| Local::now().format(DATE_FORMAT).to_string()),
                time,
                pinned: pin,
                subtasks,
            };
            let suggester = suggest.then(suggester_from_env);
            cmd_add(&mut store, &SystemClock, input, suggester.as_deref(), false)?;
        }
        Some(Commands::List { filter, search }) => {
            let filter: FilterCategory = filter.parse()?;
            let store = JsonTaskStore::open_default()?;
            cmd_list(&store, &SystemClock, filter, &search);
        }
        Some(Commands::Complete { id }) => {
            cmd_complete(&mut JsonTaskStore::open_default()?, TaskId(id), false)?;
        }
        Some(Commands::Pin { id }) => {
            cmd_pin(&mut JsonTaskStore::open_default()?, TaskId(id), false)?;
        }
        Some(Commands::Remove { id }) => cmd_remove(&mut JsonTaskStore::open_default()?, TaskId(id), false)?,
        Some(Commands::Edit { id, title, description, clear_description, date, time }) => {
            let edit = TaskEdit { title, description, clear_description, date, time };
            cmd_edit(&mut JsonTaskStore::open_default()?, TaskId(id), edit, false)?;
        }
        Some(Commands::Subtask { command }) => {
            let mut store = JsonTaskStore::open_default()?;
            match command {
                SubtaskCommands::Add { id, title } => {
                    cmd_subtask_add(&mut store, TaskId(id), title, false)?;
                }
                SubtaskCommands::Toggle { id, sub } => {
                    cmd_subtask_toggle(&mut store, TaskId(id), sub, false)?;
                }
                SubtaskCommands::Remove { id, sub } => cmd_subtask_remove(&mut store, TaskId(id), sub, false)?,
            }
        }
        Some(Commands::Suggest { title }) => {
            cmd_suggest(suggester_from_env().as_ref(), &title);
        }
        Some(Commands::Sound { command }) => match command {
            SoundCommands::Set { path } => cmd_sound_set(&settings_file, &path, false)?,
            SoundCommands::Reset => cmd_sound_reset(&settings_file, false)?,
            SoundCommands::Preview => cmd_sound_preview(&settings(&settings_file))?,
        },
        Some(Commands::Mute) => cmd_set_muted(&settings_file, true, false)?,
        Some(Commands::Unmute) => cmd_set_muted(&settings_file, false, false)?,
        Some(Commands::Watch) => {
            let mut store = JsonTaskStore::open_default()?;
            cmd_watch(&mut store, &settings(&settings_file), &settings_file)?;
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "dailyfocus", &mut io::stdout());
        }
        Some(Commands::Ui) | None => {
            let store = JsonTaskStore::open_default()?;
            run_tui(store, settings(&settings_file), settings_file)?;
        }
    }
    Ok(())
}

/// A broken settings file must not keep reminders from running.
fn settings(path: &Path) -> Settings {
    load_settings(path).unwrap_or_else(|e| {
        warn!(error = %e, "could not read settings, using defaults");
        Settings::default()
    })
}
