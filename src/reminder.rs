//! Glue between the scanner, the alarm and the notifications.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::alarm::{AlarmPlayer, AudioSink, PlaybackOutcome, PlaybackOwner, SoundSource};
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::StoreError;
use crate::models::TaskId;
use crate::notify::NotificationDispatcher;
use crate::scanner::{DueScanner, ScanReport};
use crate::storage::TaskStore;

/// Runs reminders for one task store.
///
/// The caller drives [`ReminderEngine::tick`] from its event loop at the
/// configured interval and calls [`ReminderEngine::shutdown`] on exit.
pub struct ReminderEngine<C: Clock> {
    clock: C,
    scanner: DueScanner,
    player: AlarmPlayer,
    dispatcher: NotificationDispatcher,
    muted: bool,
    running: bool,
}

impl<C: Clock> ReminderEngine<C> {
    pub fn new(
        clock: C,
        settings: &Settings,
        sink: Box<dyn AudioSink>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            clock,
            scanner: DueScanner::new(settings.catch_up_window()),
            player: AlarmPlayer::new(sink, SoundSource::from_setting(settings.sound.clone())),
            dispatcher,
            muted: settings.muted,
            running: true,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn player(&self) -> &AlarmPlayer {
        &self.player
    }

    pub fn scanner(&self) -> &DueScanner {
        &self.scanner
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Task whose alarm is sounding, if any.
    pub fn sounding(&self) -> Option<TaskId> {
        match self.player.owner() {
            Some(PlaybackOwner::Alarm(id)) => Some(id),
            _ => None,
        }
    }

    /// One scan: notify and ring for every newly due task, keep the loop
    /// going for an alarm already sounding.
    ///
    /// An alarm whose task was completed or deleted since the last tick,
    /// e.g. from another process, is stopped first.
    pub fn tick(&mut self, store: &mut dyn TaskStore) -> ScanReport {
        if !self.running {
            return ScanReport::default();
        }
        if let Some(id) = self.sounding() {
            match store.get(id) {
                None => self.on_task_deleted(id),
                Some(task) if task.completed => self.on_task_completed(id),
                Some(_) => {}
            }
        }
        let now = self.clock.now();
        let report = self.scanner.tick(store, now);
        for event in &report.fired {
            self.dispatcher.dispatch(event);
            if self.muted {
                debug!(task = %event.task_id, "muted, alarm sound skipped");
                continue;
            }
            if self.player.start_alarm(event.task_id) == PlaybackOutcome::Blocked {
                self.dispatcher.fallback();
            }
        }
        self.player.pump();
        report
    }

    /// Stop action on a reminder: silences it and marks the task notified.
    pub fn acknowledge(&mut self, store: &mut dyn TaskStore, id: TaskId) -> Result<(), StoreError> {
        if self.sounding() == Some(id) {
            self.player.stop();
        }
        self.scanner.acknowledge(store, id)
    }

    /// Acknowledges whatever is ringing. Returns the task, if an alarm was
    /// sounding.
    pub fn acknowledge_current(&mut self, store: &mut dyn TaskStore) -> Option<TaskId> {
        let id = self.sounding();
        self.player.stop();
        if let Some(id) = id {
            if let Err(e) = self.scanner.acknowledge(store, id) {
                warn!(task = %id, error = %e, "could not mark acknowledged task notified");
            }
        }
        id
    }

    pub fn stop_alarm(&mut self) {
        self.player.stop();
    }

    /// Completing a task always silences the alarm.
    pub fn on_task_completed(&mut self, id: TaskId) {
        debug!(task = %id, "task completed, alarm stopped");
        self.player.stop();
    }

    /// Deleting a task always silences the alarm.
    pub fn on_task_deleted(&mut self, id: TaskId) {
        debug!(task = %id, "task deleted, alarm stopped");
        self.player.stop();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.player.stop();
        }
        info!(muted, "silent mode changed");
    }

    pub fn set_sound(&mut self, sound: Option<PathBuf>) {
        self.player.set_source(SoundSource::from_setting(sound));
    }

    /// Brings a running engine in line with settings saved elsewhere
    /// (`sound set`, `mute` or a hand edit of `settings.toml`).
    pub fn apply_settings(&mut self, settings: &Settings) {
        if *self.player.source() != SoundSource::from_setting(settings.sound.clone()) {
            self.set_sound(settings.sound.clone());
        }
        if settings.muted != self.muted {
            self.set_muted(settings.muted);
        }
        self.dispatcher.set_permission(settings.notifications);
        self.scanner.set_window(settings.catch_up_window());
    }

    /// Plays the current sound as a preview; stopped like any alarm.
    pub fn preview(&mut self) -> PlaybackOutcome {
        self.player.start_preview()
    }

    /// Keeps a preview looping without scanning for due tasks.
    pub fn pump_audio(&mut self) {
        self.player.pump();
    }

    pub fn on_user_gesture(&mut self) -> bool {
        self.player.on_user_gesture()
    }

    /// Stops ticking and releases the audio output.
    pub fn shutdown(&mut self) {
        if self.running {
            self.running = false;
            self.player.dispose();
            debug!("reminder engine shut down");
        }
    }
}

impl<C: Clock> Drop for ReminderEngine<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
