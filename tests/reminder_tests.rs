mod common;

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Duration;
use common::{clock, task, FakeSink, RecordingNotifier, RecordingVibrator, Shown, SinkLog};
use dailyfocus::clock::ManualClock;
use dailyfocus::config::Settings;
use dailyfocus::models::TaskId;
use dailyfocus::notify::{NotificationDispatcher, Notifier, DEFAULT_BODY, DUE_PATTERN, FALLBACK_PATTERN};
use dailyfocus::reminder::ReminderEngine;
use dailyfocus::storage::{MemoryTaskStore, TaskStore};
use pretty_assertions::assert_eq;

struct Harness {
    shown: Shown,
    vibrations: Rc<RefCell<Vec<Vec<u64>>>>,
    sink: Rc<RefCell<SinkLog>>,
}

fn engine<'a>(clock: &'a ManualClock, settings: &Settings) -> (ReminderEngine<&'a ManualClock>, Harness) {
    let shown: Shown = Rc::default();
    let vibrator = RecordingVibrator::default();
    let vibrations = vibrator.0.clone();
    let dispatcher = NotificationDispatcher::new(
        vec![Box::new(RecordingNotifier {
            name: "desktop",
            background: true,
            available: true,
            shown: shown.clone(),
        })],
        Box::new(vibrator),
        settings.notifications,
    );
    let (sink, log) = FakeSink::new();
    let engine = ReminderEngine::new(clock, settings, Box::new(sink), dispatcher);
    (
        engine,
        Harness {
            shown,
            vibrations,
            sink: log,
        },
    )
}

#[test]
fn test_due_task_notifies_and_rings() {
    let clock = clock("2024-01-10T09:02");
    let mut rent = task(1, "Pay rent", "2024-01-10", "09:00");
    rent.description = Some("Transfer to landlord".into());
    let mut store = MemoryTaskStore::new(vec![rent, task(2, "Gym", "2024-01-10", "18:00")]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    let report = engine.tick(&mut store);
    assert_eq!(report.fired.len(), 1);
    assert_eq!(
        *h.shown.borrow(),
        vec![("desktop", "⏰ Pay rent".to_string(), "Transfer to landlord".to_string())]
    );
    assert_eq!(*h.vibrations.borrow(), vec![DUE_PATTERN.to_vec()]);
    assert_eq!(engine.sounding(), Some(TaskId(1)));
    assert!(h.sink.borrow().playing);
    assert!(store.get(TaskId(1)).unwrap().notified);
}

#[test]
fn test_default_body_without_description() {
    let clock = clock("2024-01-10T09:00");
    let mut store = MemoryTaskStore::new(vec![task(1, "Stretch", "2024-01-10", "09:00")]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    engine.tick(&mut store);
    assert_eq!(h.shown.borrow()[0].2, DEFAULT_BODY);
}

#[test]
fn test_muted_notifies_without_sound() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![task(1, "Quiet", "2024-01-10", "09:00")]);
    let settings = Settings {
        muted: true,
        ..Settings::default()
    };
    let (mut engine, h) = engine(&clock, &settings);

    engine.tick(&mut store);
    assert_eq!(h.shown.borrow().len(), 1);
    assert!(h.sink.borrow().plays.is_empty());
    assert_eq!(engine.sounding(), None);
}

#[test]
fn test_blocked_sound_falls_back_to_vibration() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![task(1, "Loud", "2024-01-10", "09:00")]);
    let (mut engine, h) = engine(&clock, &Settings::default());
    h.sink.borrow_mut().reject = true;

    engine.tick(&mut store);
    assert_eq!(
        *h.vibrations.borrow(),
        vec![DUE_PATTERN.to_vec(), FALLBACK_PATTERN.to_vec()]
    );
    assert_eq!(engine.sounding(), None);
}

#[test]
fn test_no_permission_still_vibrates() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![task(1, "Private", "2024-01-10", "09:00")]);
    let settings = Settings {
        notifications: false,
        ..Settings::default()
    };
    let (mut engine, h) = engine(&clock, &settings);

    engine.tick(&mut store);
    assert!(h.shown.borrow().is_empty());
    assert_eq!(h.vibrations.borrow().len(), 1);
    assert_eq!(engine.sounding(), Some(TaskId(1)));
}

#[test]
fn test_acknowledge_current_stops_alarm() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![task(1, "Stop me", "2024-01-10", "09:00")]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    engine.tick(&mut store);
    assert_eq!(engine.acknowledge_current(&mut store), Some(TaskId(1)));
    assert_eq!(engine.sounding(), None);
    assert!(!h.sink.borrow().playing);
    assert_eq!(engine.acknowledge_current(&mut store), None);
}

#[test]
fn test_alarm_loops_across_ticks() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![task(1, "Loop", "2024-01-10", "09:00")]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    engine.tick(&mut store);
    h.sink.borrow_mut().playing = false;
    clock.advance(Duration::seconds(2));
    let report = engine.tick(&mut store);
    assert!(report.fired.is_empty());
    assert_eq!(h.sink.borrow().plays.len(), 2);
}

#[test]
fn test_completion_and_mute_silence_alarm() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![
        task(1, "First", "2024-01-10", "09:00"),
        task(2, "Second", "2024-01-10", "09:30"),
    ]);
    let (mut engine, _h) = engine(&clock, &Settings::default());

    engine.tick(&mut store);
    engine.on_task_completed(TaskId(1));
    assert_eq!(engine.sounding(), None);

    clock.set(common::at("2024-01-10T09:30"));
    engine.tick(&mut store);
    assert_eq!(engine.sounding(), Some(TaskId(2)));
    engine.set_muted(true);
    assert!(engine.is_muted());
    assert_eq!(engine.sounding(), None);
}

#[test]
fn test_shutdown_stops_ticking() {
    let clock = clock("2024-01-10T08:00");
    let mut store = MemoryTaskStore::new(vec![task(1, "After exit", "2024-01-10", "09:00")]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    engine.shutdown();
    assert!(!engine.is_running());
    assert!(h.sink.borrow().released);

    clock.advance(Duration::hours(1));
    assert!(engine.tick(&mut store).fired.is_empty());
    assert!(!store.get(TaskId(1)).unwrap().notified);
}

#[test]
fn test_dispatcher_prefers_background_notifiers() {
    let shown: Shown = Rc::default();
    let notifier = |name: &'static str, background: bool, available: bool| -> Box<dyn Notifier> {
        Box::new(RecordingNotifier {
            name,
            background,
            available,
            shown: shown.clone(),
        })
    };
    let dispatcher = NotificationDispatcher::new(
        vec![
            notifier("inline", false, true),
            notifier("service-worker", true, false),
            notifier("desktop", true, true),
        ],
        Box::new(RecordingVibrator::default()),
        true,
    );
    let mut store = MemoryTaskStore::new(vec![task(1, "Order", "2024-01-10", "09:00")]);
    let event = dailyfocus::scanner::DueScanner::new(Duration::minutes(5))
        .tick(&mut store, common::at("2024-01-10T09:00"))
        .fired
        .remove(0);

    assert_eq!(dispatcher.dispatch(&event), Some("desktop"));
    assert_eq!(shown.borrow().len(), 1);
}

#[test]
fn test_acknowledge_and_sound_change() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![
        task(1, "Ring", "2024-01-10", "09:00"),
        task(2, "Later", "2024-01-10", "09:30"),
    ]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    engine.tick(&mut store);
    // Acknowledging another task leaves the alarm alone.
    engine.acknowledge(&mut store, TaskId(2)).unwrap();
    assert_eq!(engine.sounding(), Some(TaskId(1)));
    assert!(store.get(TaskId(2)).unwrap().notified);

    let custom = std::path::PathBuf::from("/tmp/custom.ogg");
    engine.set_sound(Some(custom.clone()));
    engine.acknowledge(&mut store, TaskId(1)).unwrap();
    assert_eq!(engine.sounding(), None);

    engine.preview();
    assert_eq!(
        h.sink.borrow().plays.last().map(|p| p.0.clone()),
        Some(dailyfocus::alarm::SoundSource::File(custom))
    );
    engine.stop_alarm();
    assert!(!engine.player().is_active());
}

#[test]
fn test_alarm_stops_when_task_completed_elsewhere() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![task(1, "Ring", "2024-01-10", "09:00")]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    engine.tick(&mut store);
    assert_eq!(engine.sounding(), Some(TaskId(1)));

    // Another process completes the task between ticks.
    store
        .update(
            TaskId(1),
            &dailyfocus::models::TaskPatch {
                completed: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    engine.tick(&mut store);
    assert_eq!(engine.sounding(), None);
    assert!(!h.sink.borrow().playing);
    assert_eq!(h.sink.borrow().plays.len(), 1);
}

#[test]
fn test_alarm_stops_when_task_deleted_elsewhere() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![
        task(1, "Ring", "2024-01-10", "09:00"),
        task(2, "Stay", "2024-01-10", "12:00"),
    ]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    engine.tick(&mut store);
    store.remove(TaskId(1)).unwrap();
    engine.tick(&mut store);
    assert_eq!(engine.sounding(), None);
    assert!(!h.sink.borrow().playing);

    // A preview is not tied to a task and keeps looping.
    engine.preview();
    engine.tick(&mut store);
    assert!(engine.player().is_active());
}

#[test]
fn test_settings_apply_to_running_engine() {
    let clock = clock("2024-01-10T09:01");
    let mut store = MemoryTaskStore::new(vec![task(1, "Changed", "2024-01-10", "09:01")]);
    let (mut engine, h) = engine(&clock, &Settings::default());

    let custom = std::path::PathBuf::from("/tmp/custom.ogg");
    engine.apply_settings(&Settings {
        sound: Some(custom.clone()),
        muted: true,
        notifications: false,
        catch_up_window_secs: 60,
        ..Settings::default()
    });
    assert!(engine.is_muted());
    assert_eq!(
        *engine.player().source(),
        dailyfocus::alarm::SoundSource::File(custom.clone())
    );
    assert_eq!(engine.scanner().window(), Duration::minutes(1));

    let report = engine.tick(&mut store);
    assert_eq!(report.fired.len(), 1);
    assert!(h.shown.borrow().is_empty());
    assert!(h.sink.borrow().plays.is_empty());

    engine.apply_settings(&Settings {
        sound: Some(custom.clone()),
        ..Settings::default()
    });
    assert!(!engine.is_muted());
    engine.preview();
    assert_eq!(
        h.sink.borrow().plays.last().map(|p| p.0.clone()),
        Some(dailyfocus::alarm::SoundSource::File(custom))
    );
}
