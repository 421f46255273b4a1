//! Domain model for subjects, weekly schedule and attendance.
//!
//! # Responsibility
//! - Define canonical records shared by storage, services and callers.
//! - Keep week identity normalized so all week-scoped data agrees on keys.
//!
//! # Invariants
//! - Every subject and schedule slot is identified by a stable UUID.
//! - Attendance is identified by `(WeekKey, ScheduleId)`.

pub mod attendance;
pub mod schedule;
pub mod subject;
pub mod timetable;
pub mod week;
