pub mod app;
pub mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info};

use crate::alarm::SystemSink;
use crate::clock::SystemClock;
use crate::config::Settings;
use crate::error::AppError;
use crate::notify::{DesktopNotifier, NoVibration, NotificationDispatcher};
use crate::reminder::ReminderEngine;
use crate::storage::JsonTaskStore;
use crate::suggest::suggester_from_env;
use app::{App, InputField, InputMode};
use ui::ui;

pub fn run_tui(store: JsonTaskStore, settings: Settings, settings_path: PathBuf) -> Result<(), AppError> {
    // The terminal notifier would write over the alternate screen, so
    // only desktop notifications are used here.
    let dispatcher = NotificationDispatcher::new(
        vec![Box::new(DesktopNotifier)],
        Box::new(NoVibration),
        settings.notifications,
    );
    let engine = ReminderEngine::new(SystemClock, &settings, Box::new(SystemSink::new()), dispatcher);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut app = App::new(store, &settings, settings_path, engine, suggester_from_env());
    info!("tui started");

    // Run loop
    let res = run_app(&mut terminal, &mut app);
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "tui loop failed");
        return Err(err.into());
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let mut last_tick = Instant::now();
    app.tick();
    loop {
        terminal.draw(|f| ui(f, app))?;

        // Follows `tick_secs` if the settings file changes while running.
        let tick = app.settings.current().tick_interval();
        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                app.on_key();
                match app.input_mode {
                    InputMode::Normal => match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Down | KeyCode::Char('j') => app.next(),
                        KeyCode::Up | KeyCode::Char('k') => app.previous(),
                        KeyCode::Char(' ') => app.complete_selected(),
                        KeyCode::Char('d') | KeyCode::Delete => app.start_delete(),
                        KeyCode::Char('a') => app.start_add(),
                        KeyCode::Char('n') => app.start_edit(InputField::Title),
                        KeyCode::Char('x') => app.start_edit(InputField::Description),
                        KeyCode::Char('t') => app.start_edit(InputField::Date),
                        KeyCode::Char('h') => app.start_edit(InputField::Time), // 'h' for Hour
                        KeyCode::Char('s') => app.start_edit(InputField::Subtask),
                        KeyCode::Char('g') => app.suggest_for_selected(),
                        KeyCode::Char('p') => app.pin_selected(),
                        KeyCode::Tab => app.cycle_filter(),
                        KeyCode::Char('/') => app.start_search(),
                        KeyCode::Esc | KeyCode::Char('S') => app.stop_alarm(),
                        KeyCode::Char('m') => app.toggle_mute(),
                        KeyCode::Char('P') => app.preview_sound(),
                        _ => {}
                    },
                    InputMode::ConfirmDelete => match key.code {
                        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
                        _ => app.cancel_input(),
                    },
                    InputMode::Searching => match key.code {
                        KeyCode::Enter => app.handle_input(),
                        KeyCode::Esc => app.cancel_input(),
                        KeyCode::Char(c) => {
                            app.input_buffer.push(c);
                            app.update_search();
                        }
                        KeyCode::Backspace => {
                            app.input_buffer.pop();
                            app.update_search();
                        }
                        _ => {}
                    },
                    InputMode::Editing | InputMode::Adding => match key.code {
                        KeyCode::Enter => app.handle_input(),
                        KeyCode::Esc => app.cancel_input(),
                        KeyCode::Char(c) => {
                            app.input_buffer.push(c);
                        }
                        KeyCode::Backspace => {
                            app.input_buffer.pop();
                        }
                        _ => {}
                    },
                }
            }
        }

        if last_tick.elapsed() >= tick {
            app.tick();
            last_tick = Instant::now();
        }
    }
}
