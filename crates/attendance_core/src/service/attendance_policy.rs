//! Counter policy applied when a timetable cell is tapped.
//!
//! # Responsibility
//! - Decide the next status of a cell and the tally adjustments it implies.
//!
//! # Invariants
//! - Into `Present`: increment present.
//! - Into `Absent`: increment absent, decrement present.
//! - Into `Unmarked`: decrement absent.

use crate::model::attendance::{AttendanceStatus, CounterOp};
use crate::model::schedule::ScheduleEntry;
use crate::service::timetable_engine::TimetableEngine;

/// Counter operations fired when a cell transitions into `target`.
pub fn counter_ops_for(target: AttendanceStatus) -> &'static [CounterOp] {
    match target {
        AttendanceStatus::Present => &[CounterOp::IncrementPresent],
        AttendanceStatus::Absent => &[CounterOp::IncrementAbsent, CounterOp::DecrementPresent],
        AttendanceStatus::Unmarked => &[CounterOp::DecrementAbsent],
    }
}

/// Next status of a cell; a cell without a record becomes `Present`.
pub fn next_status(current: Option<AttendanceStatus>) -> AttendanceStatus {
    current.map_or(AttendanceStatus::Present, AttendanceStatus::next)
}

/// Advances one slot of the engine's current week and queues its counters.
///
/// Returns the status the slot was moved to.
pub fn cycle_attendance(engine: &TimetableEngine, entry: &ScheduleEntry) -> AttendanceStatus {
    let current = engine
        .timetable_state()
        .snapshot()
        .and_then(|snapshot| snapshot.status_of(entry.id));
    let target = next_status(current);
    engine.update_attendance_status(entry.id, target);
    for op in counter_ops_for(target) {
        engine.update_attendance_count(entry.subject_id, *op);
    }
    target
}

#[cfg(test)]
mod tests {
    use super::{counter_ops_for, next_status};
    use crate::model::attendance::{AttendanceStatus, CounterOp};

    #[test]
    fn missing_record_cycles_to_present() {
        assert_eq!(next_status(None), AttendanceStatus::Present);
        assert_eq!(
            next_status(Some(AttendanceStatus::Present)),
            AttendanceStatus::Absent
        );
        assert_eq!(
            next_status(Some(AttendanceStatus::Absent)),
            AttendanceStatus::Unmarked
        );
    }

    #[test]
    fn absent_moves_one_tally_from_present_to_absent() {
        assert_eq!(
            counter_ops_for(AttendanceStatus::Absent),
            &[CounterOp::IncrementAbsent, CounterOp::DecrementPresent]
        );
        assert_eq!(
            counter_ops_for(AttendanceStatus::Present),
            &[CounterOp::IncrementPresent]
        );
        assert_eq!(
            counter_ops_for(AttendanceStatus::Unmarked),
            &[CounterOp::DecrementAbsent]
        );
    }
}
