//! Attendance marks and counter operations.
//!
//! # Responsibility
//! - Define the per-week mark of one schedule slot.
//! - Define the status cycle and the counter operations a mark can trigger.
//!
//! # Invariants
//! - `(week, schedule_id)` identifies at most one record.

use crate::model::schedule::ScheduleId;
use crate::model::week::WeekKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attendance records of one week keyed by schedule slot.
pub type AttendanceMap = HashMap<ScheduleId, AttendanceRecord>;

/// Mark state of one slot in one week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Unmarked,
    Present,
    Absent,
}

impl AttendanceStatus {
    /// Next status in the tap cycle `Unmarked -> Present -> Absent -> Unmarked`.
    pub fn next(self) -> Self {
        match self {
            Self::Unmarked => Self::Present,
            Self::Present => Self::Absent,
            Self::Absent => Self::Unmarked,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unmarked => "unmarked",
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unmarked" => Some(Self::Unmarked),
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

/// One slot's mark for one specific week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub week: WeekKey,
    pub schedule_id: ScheduleId,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn new(week: WeekKey, schedule_id: ScheduleId, status: AttendanceStatus) -> Self {
        Self {
            week,
            schedule_id,
            status,
        }
    }
}

/// Durable adjustment of a subject's present/absent tally.
///
/// Decrements are floored at zero by storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterOp {
    IncrementPresent,
    IncrementAbsent,
    DecrementPresent,
    DecrementAbsent,
}

impl CounterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncrementPresent => "increment_present",
            Self::IncrementAbsent => "increment_absent",
            Self::DecrementPresent => "decrement_present",
            Self::DecrementAbsent => "decrement_absent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AttendanceStatus;

    #[test]
    fn cycle_returns_to_unmarked_after_three_taps() {
        let start = AttendanceStatus::Unmarked;
        assert_eq!(start.next(), AttendanceStatus::Present);
        assert_eq!(start.next().next(), AttendanceStatus::Absent);
        assert_eq!(start.next().next().next(), start);
    }

    #[test]
    fn storage_labels_roundtrip() {
        for status in [
            AttendanceStatus::Unmarked,
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
        ] {
            assert_eq!(AttendanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttendanceStatus::parse("late"), None);
    }
}
