mod common;

use chrono::Duration;
use common::{at, task};
use dailyfocus::error::TaskError;
use dailyfocus::models::{TaskId, TaskPatch};
use dailyfocus::scanner::{DueScanner, MAX_DELIVERIES};
use dailyfocus::storage::{MemoryTaskStore, TaskStore};
use pretty_assertions::assert_eq;

fn scanner() -> DueScanner {
    DueScanner::new(Duration::minutes(5))
}

#[test]
fn test_due_task_fires_once() {
    let mut store = MemoryTaskStore::new(vec![task(1, "Pay rent", "2024-01-01", "09:00")]);
    let mut scanner = scanner();

    let report = scanner.tick(&mut store, at("2024-01-01T09:02"));
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].task_id, TaskId(1));
    assert_eq!(report.fired[0].title, "Pay rent");
    assert_eq!(report.fired[0].scheduled_at, at("2024-01-01T09:00"));
    assert!(store.get(TaskId(1)).unwrap().notified);

    for minute in ["09:02", "09:03", "09:04"] {
        let report = scanner.tick(&mut store, at(&format!("2024-01-01T{minute}")));
        assert!(report.fired.is_empty());
    }
}

#[test]
fn test_future_task_fires_when_due() {
    let mut store = MemoryTaskStore::new(vec![task(1, "Standup", "2024-01-10", "09:00")]);
    let mut scanner = scanner();

    assert!(scanner.tick(&mut store, at("2024-01-10T08:59")).fired.is_empty());
    assert!(!store.get(TaskId(1)).unwrap().notified);

    let report = scanner.tick(&mut store, at("2024-01-10T09:00"));
    assert_eq!(report.fired.len(), 1);
}

#[test]
fn test_missed_task_is_skipped_silently() {
    let mut store = MemoryTaskStore::new(vec![task(1, "Old", "2024-01-01", "09:00")]);
    let mut scanner = scanner();

    let report = scanner.tick(&mut store, at("2024-01-01T09:10"));
    assert!(report.fired.is_empty());
    assert_eq!(report.stale, vec![TaskId(1)]);
    assert!(store.get(TaskId(1)).unwrap().notified);
}

#[test]
fn test_window_boundary_is_exclusive() {
    let mut store = MemoryTaskStore::new(vec![
        task(1, "Just in", "2024-01-10", "09:01"),
        task(2, "Just out", "2024-01-10", "09:00"),
    ]);
    let mut scanner = scanner();

    let report = scanner.tick(&mut store, at("2024-01-10T09:05"));
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].task_id, TaskId(1));
    assert_eq!(report.stale, vec![TaskId(2)]);
}

#[test]
fn test_completed_task_never_fires() {
    let mut done = task(1, "Done", "2024-01-10", "09:00");
    done.completed = true;
    let mut store = MemoryTaskStore::new(vec![done]);
    let mut scanner = scanner();

    let report = scanner.tick(&mut store, at("2024-01-10T09:01"));
    assert!(report.fired.is_empty());
    assert!(report.stale.is_empty());
    assert_eq!(store.update_calls, 0);
}

#[test]
fn test_several_tasks_fire_in_one_tick() {
    let mut store = MemoryTaskStore::new(vec![
        task(1, "A", "2024-01-10", "09:00"),
        task(2, "B", "2024-01-10", "09:01"),
        task(3, "C", "2024-01-10", "12:00"),
    ]);
    let mut scanner = scanner();

    let report = scanner.tick(&mut store, at("2024-01-10T09:02"));
    let mut fired: Vec<u64> = report.fired.iter().map(|e| e.task_id.0).collect();
    fired.sort();
    assert_eq!(fired, vec![1, 2]);
}

#[test]
fn test_failed_write_redelivers_at_most_three_times() {
    let mut store = MemoryTaskStore::new(vec![task(1, "Flaky", "2024-01-10", "09:00")]);
    store.fail_updates = true;
    let mut scanner = scanner();

    let mut fired = 0;
    for _ in 0..6 {
        let report = scanner.tick(&mut store, at("2024-01-10T09:01"));
        assert_eq!(report.persist_failures, vec![TaskId(1)]);
        fired += report.fired.len();
    }
    assert_eq!(fired, MAX_DELIVERIES as usize);
    assert_eq!(scanner.deliveries(TaskId(1)), MAX_DELIVERIES);
    assert!(scanner.is_marked(TaskId(1)));
    assert!(!store.get(TaskId(1)).unwrap().notified);

    // Once the store recovers the pending write goes through.
    store.fail_updates = false;
    let report = scanner.tick(&mut store, at("2024-01-10T09:02"));
    assert!(report.fired.is_empty());
    assert!(report.persist_failures.is_empty());
    assert!(store.get(TaskId(1)).unwrap().notified);
}

#[test]
fn test_reschedule_rearms_reminder() {
    let mut store = MemoryTaskStore::new(vec![task(1, "Call", "2024-01-10", "09:00")]);
    let mut scanner = scanner();

    assert_eq!(scanner.tick(&mut store, at("2024-01-10T09:01")).fired.len(), 1);

    store
        .update(
            TaskId(1),
            &TaskPatch {
                time: Some("09:30".into()),
                ..TaskPatch::default()
            },
        )
        .unwrap();
    assert!(!store.get(TaskId(1)).unwrap().notified);

    assert!(scanner.tick(&mut store, at("2024-01-10T09:05")).fired.is_empty());
    assert!(!scanner.is_marked(TaskId(1)));

    let report = scanner.tick(&mut store, at("2024-01-10T09:31"));
    assert_eq!(report.fired.len(), 1);
    assert_eq!(scanner.deliveries(TaskId(1)), 1);
}

#[test]
fn test_invalid_schedule_is_reported_not_fired() {
    let mut store = MemoryTaskStore::new(vec![
        task(1, "Broken", "2024-13-45", "09:00"),
        task(2, "Fine", "2024-01-10", "09:00"),
    ]);
    let mut scanner = scanner();

    let report = scanner.tick(&mut store, at("2024-01-10T09:01"));
    assert_eq!(report.fired.len(), 1);
    assert_eq!(
        report.invalid,
        vec![(TaskId(1), TaskError::InvalidDate("2024-13-45".into()))]
    );
    assert!(!store.get(TaskId(1)).unwrap().notified);

    // Still reported on later ticks, never fired.
    let report = scanner.tick(&mut store, at("2024-01-10T09:02"));
    assert_eq!(report.invalid.len(), 1);
    assert!(report.fired.is_empty());
}

#[test]
fn test_acknowledge_marks_task_notified() {
    let mut store = MemoryTaskStore::new(vec![task(1, "Later", "2024-01-10", "18:00")]);
    let mut scanner = scanner();

    scanner.acknowledge(&mut store, TaskId(1)).unwrap();
    assert!(store.get(TaskId(1)).unwrap().notified);
    assert!(scanner.tick(&mut store, at("2024-01-10T18:01")).fired.is_empty());
    assert!(scanner.acknowledge(&mut store, TaskId(9)).is_err());
}

#[test]
fn test_deleted_task_mark_is_dropped() {
    let mut store = MemoryTaskStore::new(vec![task(1, "Gone", "2024-01-10", "09:00")]);
    store.fail_updates = true;
    let mut scanner = scanner();

    scanner.tick(&mut store, at("2024-01-10T09:01"));
    store.remove(TaskId(1)).unwrap();
    scanner.tick(&mut store, at("2024-01-10T09:02"));
    assert_eq!(scanner.deliveries(TaskId(1)), 0);
}
