#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Local};
use dailyfocus::alarm::{AudioSink, SoundSource};
use dailyfocus::clock::ManualClock;
use dailyfocus::error::{AudioError, NotifyError};
use dailyfocus::models::{Task, TaskId};
use dailyfocus::notify::{NotificationOptions, Notifier, Vibrator};

pub fn task(id: u64, title: &str, date: &str, time: &str) -> Task {
    Task {
        id: TaskId(id),
        title: title.to_string(),
        description: None,
        date: date.to_string(),
        time: time.to_string(),
        completed: false,
        pinned: false,
        created_at: "2024-01-01T08:00:00+00:00".to_string(),
        subtasks: Vec::new(),
        notified: false,
    }
}

pub fn clock(local: &str) -> ManualClock {
    ManualClock::at(local).unwrap()
}

pub fn at(local: &str) -> DateTime<Local> {
    use dailyfocus::clock::Clock;
    clock(local).now()
}

/// Everything a [`FakeSink`] was asked to do.
#[derive(Debug, Default)]
pub struct SinkLog {
    pub plays: Vec<(SoundSource, f32)>,
    pub stops: usize,
    pub playing: bool,
    pub released: bool,
    /// Makes every `play` fail, like a browser refusing autoplay.
    pub reject: bool,
}

pub struct FakeSink(pub Rc<RefCell<SinkLog>>);

impl FakeSink {
    pub fn new() -> (Self, Rc<RefCell<SinkLog>>) {
        let log = Rc::new(RefCell::new(SinkLog::default()));
        (FakeSink(log.clone()), log)
    }
}

impl AudioSink for FakeSink {
    fn play(&mut self, source: &SoundSource, volume: f32) -> Result<(), AudioError> {
        let mut log = self.0.borrow_mut();
        if log.reject {
            return Err(AudioError::Blocked("not allowed".into()));
        }
        log.plays.push((source.clone(), volume));
        log.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.0.borrow_mut();
        log.stops += 1;
        log.playing = false;
    }

    fn is_playing(&mut self) -> bool {
        self.0.borrow().playing
    }

    fn release(&mut self) {
        self.0.borrow_mut().released = true;
    }
}

pub type Shown = Rc<RefCell<Vec<(&'static str, String, String)>>>;

pub struct RecordingNotifier {
    pub name: &'static str,
    pub background: bool,
    pub available: bool,
    pub shown: Shown,
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_background_capable(&self) -> bool {
        self.background
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn show(&self, title: &str, body: &str, options: &NotificationOptions) -> Result<(), NotifyError> {
        assert!(options.require_interaction);
        self.shown
            .borrow_mut()
            .push((self.name, title.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingVibrator(pub Rc<RefCell<Vec<Vec<u64>>>>);

impl Vibrator for RecordingVibrator {
    fn vibrate(&self, pattern: &[u64]) -> bool {
        self.0.borrow_mut().push(pattern.to_vec());
        true
    }
}
