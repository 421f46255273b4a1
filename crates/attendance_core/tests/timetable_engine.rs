mod common;

use attendance_core::model::attendance::{AttendanceRecord, AttendanceStatus, CounterOp};
use attendance_core::model::schedule::{ScheduleEntry, Weekday};
use attendance_core::{cycle_attendance, Repository, TimetableEngine, TimetableState, WeekKey};
use common::{repository, seed_slot, week_of, ControlledGateway};
use uuid::Uuid;

fn status_in(engine: &TimetableEngine, slot: &ScheduleEntry) -> Option<AttendanceStatus> {
    engine
        .timetable_state()
        .snapshot()
        .expect("timetable should be loaded")
        .status_of(slot.id)
}

async fn stored_status(
    repo: &Repository,
    week: WeekKey,
    slot: &ScheduleEntry,
) -> Option<AttendanceStatus> {
    repo.get_attendance_record(week, slot.id)
        .await
        .unwrap()
        .map(|record| record.status)
}

#[tokio::test]
async fn marking_present_updates_state_and_tally() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (math, slot) = seed_slot(&repo, "Math", Weekday::Monday, 0).await;
    let week = week_of(2024, 1, 3);

    let engine = TimetableEngine::new(repo.clone(), week);
    engine.settle().await;
    let snapshot = engine.timetable_state().snapshot().cloned().unwrap();
    assert_eq!(snapshot.slot_count(), 1);
    assert_eq!(snapshot.schedule_by_day[&Weekday::Monday], vec![slot.clone()]);
    assert_eq!(snapshot.status_of(slot.id), None);

    engine.update_attendance_status(slot.id, AttendanceStatus::Present);
    engine.update_attendance_count(math.id, CounterOp::IncrementPresent);
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Present));

    engine.settle().await;
    assert_eq!(
        stored_status(&repo, week, &slot).await,
        Some(AttendanceStatus::Present)
    );
    let stored = repo.list_subjects().await.unwrap().remove(0);
    assert_eq!((stored.present, stored.absent), (1, 0));

    let mut subjects = engine.subscribe_subject_map();
    let map = subjects
        .wait_for(|map| map.get(&math.id).is_some_and(|subject| subject.present == 1))
        .await
        .unwrap();
    assert_eq!(map[&math.id].absent, 0);
}

#[tokio::test]
async fn repeated_updates_keep_one_record_with_latest_status() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (_, slot) = seed_slot(&repo, "Math", Weekday::Friday, 2).await;
    let week = week_of(2024, 2, 9);

    let engine = TimetableEngine::new(repo.clone(), week);
    engine.settle().await;
    engine.update_attendance_status(slot.id, AttendanceStatus::Present);
    engine.update_attendance_status(slot.id, AttendanceStatus::Absent);
    engine.settle().await;

    assert_eq!(
        repo.weekly_attendance(week).await.unwrap(),
        vec![AttendanceRecord::new(week, slot.id, AttendanceStatus::Absent)]
    );
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Absent));
}

#[tokio::test]
async fn cached_week_wins_over_late_fetch_of_previous_navigation() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (_, slot) = seed_slot(&repo, "Math", Weekday::Monday, 0).await;
    let w1 = week_of(2024, 4, 1);
    let w2 = w1.next();
    repo.mark_attendance(AttendanceRecord::new(w1, slot.id, AttendanceStatus::Present))
        .await
        .unwrap();
    repo.mark_attendance(AttendanceRecord::new(w2, slot.id, AttendanceStatus::Absent))
        .await
        .unwrap();

    let engine = TimetableEngine::new(repo, w1);
    engine.settle().await;
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Present));

    let gate = gateway.hold_week(w2);
    engine.set_week(w2);
    // Provisional state: schedule shown, attendance not fetched yet.
    assert_eq!(status_in(&engine, &slot), None);

    engine.set_week(w1);
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Present));

    gate.add_permits(1);
    engine.settle().await;
    assert_eq!(engine.current_week(), w1);
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Present));

    // The discarded fetch still filled the cache.
    engine.set_week(w2);
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Absent));
}

#[tokio::test]
async fn cold_load_of_abandoned_week_never_publishes() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (_, slot) = seed_slot(&repo, "Math", Weekday::Tuesday, 0).await;
    let w1 = week_of(2024, 6, 3);
    let w2 = w1.previous();
    repo.mark_attendance(AttendanceRecord::new(w2, slot.id, AttendanceStatus::Absent))
        .await
        .unwrap();

    let gate = gateway.hold_week(w1);
    let engine = TimetableEngine::new(repo, w1);
    assert!(engine.timetable_state().is_loading());

    engine.set_week(w2);
    let mut state = engine.subscribe_timetable();
    state
        .wait_for(|state| matches!(state, TimetableState::Success(_)))
        .await
        .unwrap();
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Absent));

    gate.add_permits(1);
    engine.settle().await;
    assert_eq!(engine.current_week(), w2);
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Absent));
}

#[tokio::test]
async fn failed_schedule_load_publishes_error_until_week_is_reselected() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    seed_slot(&repo, "Math", Weekday::Monday, 0).await;
    let week = week_of(2024, 7, 1);

    gateway.fail_schedule_loads(true);
    let engine = TimetableEngine::new(repo, week);
    engine.settle().await;
    match engine.timetable_state() {
        TimetableState::Error(message) => assert!(message.contains("schedule table unreadable")),
        other => panic!("unexpected state: {other:?}"),
    }

    gateway.fail_schedule_loads(false);
    engine.set_week(week);
    assert!(engine.timetable_state().is_loading());
    engine.settle().await;
    assert_eq!(
        engine.timetable_state().snapshot().map(|s| s.slot_count()),
        Some(1)
    );
}

#[tokio::test]
async fn schedule_is_loaded_once_until_reloaded() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (math, _) = seed_slot(&repo, "Math", Weekday::Monday, 0).await;
    let week = week_of(2024, 8, 5);

    let engine = TimetableEngine::new(repo.clone(), week);
    engine.next_week();
    engine.next_week();
    engine.previous_week();
    engine.settle().await;
    assert_eq!(engine.current_week(), week.next());
    assert_eq!(gateway.schedule_loads(), 1);

    repo.add_schedule_entry(ScheduleEntry::new(Weekday::Saturday, math.id, 0))
        .await
        .unwrap();
    engine.settle().await;
    assert_eq!(
        engine.timetable_state().snapshot().map(|s| s.slot_count()),
        Some(1)
    );

    engine.reload_schedule().await;
    engine.settle().await;
    assert_eq!(gateway.schedule_loads(), 2);
    assert_eq!(
        engine.timetable_state().snapshot().map(|s| s.slot_count()),
        Some(2)
    );
}

#[tokio::test]
async fn local_mark_survives_merge_with_pending_fetch() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (_, slot) = seed_slot(&repo, "Math", Weekday::Thursday, 0).await;
    let w1 = week_of(2024, 10, 7);
    let w2 = w1.next();
    repo.mark_attendance(AttendanceRecord::new(w2, slot.id, AttendanceStatus::Absent))
        .await
        .unwrap();

    let engine = TimetableEngine::new(repo.clone(), w1);
    engine.settle().await;

    let gate = gateway.hold_week(w2);
    engine.set_week(w2);
    let marked_week = engine.update_attendance_status(slot.id, AttendanceStatus::Present);
    assert_eq!(marked_week, w2);

    gate.add_permits(1);
    engine.settle().await;
    assert_eq!(status_in(&engine, &slot), Some(AttendanceStatus::Present));
    assert_eq!(
        stored_status(&repo, w2, &slot).await,
        Some(AttendanceStatus::Present)
    );
}

#[tokio::test]
async fn failed_write_keeps_optimistic_state_and_reports_error() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    seed_slot(&repo, "Math", Weekday::Monday, 0).await;
    let week = week_of(2024, 11, 4);

    let engine = TimetableEngine::new(repo.clone(), week);
    engine.settle().await;
    let ghost = Uuid::new_v4();
    engine.update_attendance_status(ghost, AttendanceStatus::Present);
    engine.settle().await;

    assert_eq!(
        engine
            .timetable_state()
            .snapshot()
            .and_then(|s| s.status_of(ghost)),
        Some(AttendanceStatus::Present)
    );
    let errors = engine.subscribe_write_errors();
    assert!(errors.borrow().as_deref().is_some_and(|message| message.contains("constraint")));
    assert!(repo.weekly_attendance(week).await.unwrap().is_empty());
}

#[tokio::test]
async fn tapping_cycles_status_and_moves_tallies() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (_, slot) = seed_slot(&repo, "Math", Weekday::Wednesday, 1).await;
    let week = week_of(2024, 12, 2);

    let engine = TimetableEngine::new(repo.clone(), week);
    engine.settle().await;

    let tally = |repo: Repository| async move {
        let subject = repo.list_subjects().await.unwrap().remove(0);
        (subject.present, subject.absent)
    };

    assert_eq!(cycle_attendance(&engine, &slot), AttendanceStatus::Present);
    engine.settle().await;
    assert_eq!(tally(repo.clone()).await, (1, 0));

    assert_eq!(cycle_attendance(&engine, &slot), AttendanceStatus::Absent);
    engine.settle().await;
    assert_eq!(tally(repo.clone()).await, (0, 1));

    assert_eq!(cycle_attendance(&engine, &slot), AttendanceStatus::Unmarked);
    engine.settle().await;
    assert_eq!(tally(repo.clone()).await, (0, 0));
    assert_eq!(
        stored_status(&repo, week, &slot).await,
        Some(AttendanceStatus::Unmarked)
    );
}

#[tokio::test]
async fn current_week_is_published() {
    let gateway = ControlledGateway::new();
    let week = week_of(2025, 1, 6);
    let engine = TimetableEngine::new(repository(&gateway), week);
    let weeks = engine.subscribe_current_week();
    assert_eq!(*weeks.borrow(), week);

    engine.previous_week();
    assert_eq!(*weeks.borrow(), week.previous());
    engine.settle().await;
    assert_eq!(
        engine.timetable_state().snapshot().map(|s| s.slot_count()),
        Some(0)
    );
}

#[tokio::test]
async fn schedule_reload_drops_marks_of_removed_slots() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (_, old_slot) = seed_slot(&repo, "Math", Weekday::Monday, 0).await;
    let week = week_of(2024, 3, 4);

    let engine = TimetableEngine::new(repo.clone(), week);
    engine.settle().await;
    engine.update_attendance_status(old_slot.id, AttendanceStatus::Present);
    engine.settle().await;

    repo.clear_schedule().await.unwrap();
    let (_, new_slot) = seed_slot(&repo, "Art", Weekday::Tuesday, 0).await;
    engine.reload_schedule().await;
    engine.settle().await;

    assert!(repo.weekly_attendance(week).await.unwrap().is_empty());
    let snapshot = engine.timetable_state().snapshot().cloned().unwrap();
    assert_eq!(snapshot.slot_count(), 1);
    assert!(snapshot.attendance_by_schedule.is_empty());
    assert_eq!(snapshot.status_of(new_slot.id), None);
}

#[tokio::test]
async fn schedule_reload_refetches_previously_loaded_weeks() {
    let gateway = ControlledGateway::new();
    let repo = repository(&gateway);
    let (_, old_slot) = seed_slot(&repo, "Math", Weekday::Monday, 0).await;
    let w1 = week_of(2024, 4, 1);
    let w2 = w1.next();

    let engine = TimetableEngine::new(repo.clone(), w1);
    engine.settle().await;
    engine.update_attendance_status(old_slot.id, AttendanceStatus::Absent);
    engine.set_week(w2);
    engine.settle().await;

    repo.clear_schedule().await.unwrap();
    let (_, new_slot) = seed_slot(&repo, "Art", Weekday::Friday, 1).await;
    engine.reload_schedule().await;
    engine.settle().await;
    repo.mark_attendance(AttendanceRecord::new(w1, new_slot.id, AttendanceStatus::Present))
        .await
        .unwrap();

    engine.set_week(w1);
    engine.settle().await;
    let snapshot = engine.timetable_state().snapshot().cloned().unwrap();
    assert_eq!(snapshot.status_of(old_slot.id), None);
    assert_eq!(snapshot.status_of(new_slot.id), Some(AttendanceStatus::Present));
    assert_eq!(snapshot.attendance_by_schedule.len(), 1);
}
