//! Published timetable state.
//!
//! # Responsibility
//! - Define the derived `{schedule x attendance}` view for one week.
//! - Define the tagged state the timetable engine publishes.
//!
//! # Invariants
//! - Snapshots are never persisted; they are rebuilt from caches.

use crate::model::attendance::{AttendanceMap, AttendanceStatus};
use crate::model::schedule::{ScheduleByDay, ScheduleId};
use std::sync::Arc;

/// Schedule and attendance of one week.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimetableSnapshot {
    /// Shared with the engine's schedule cache; identical across weeks.
    pub schedule_by_day: Arc<ScheduleByDay>,
    pub attendance_by_schedule: AttendanceMap,
}

impl TimetableSnapshot {
    /// Status of one slot; slots without a record read as `None`.
    pub fn status_of(&self, schedule_id: ScheduleId) -> Option<AttendanceStatus> {
        self.attendance_by_schedule
            .get(&schedule_id)
            .map(|record| record.status)
    }

    /// Total number of slots across all days.
    pub fn slot_count(&self) -> usize {
        self.schedule_by_day.values().map(Vec::len).sum()
    }
}

/// State published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimetableState {
    #[default]
    Loading,
    Success(TimetableSnapshot),
    Error(String),
}

impl TimetableState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn snapshot(&self) -> Option<&TimetableSnapshot> {
        match self {
            Self::Success(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}
