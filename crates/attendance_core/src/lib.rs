//! Core timetable and attendance logic.
//! This crate is the single source of truth for schedule, attendance and
//! tally invariants.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use gateway::{LiveQuery, PersistenceGateway, SqliteGateway, Table, Versioned};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attendance::{AttendanceMap, AttendanceRecord, AttendanceStatus, CounterOp};
pub use model::schedule::{group_by_day, ScheduleByDay, ScheduleEntry, ScheduleId, Weekday};
pub use model::subject::{Subject, SubjectId, SubjectValidationError};
pub use model::timetable::{TimetableSnapshot, TimetableState};
pub use model::week::WeekKey;
pub use repo::{RepoError, RepoResult};
pub use service::attendance_policy::{counter_ops_for, cycle_attendance, next_status};
pub use service::repository::Repository;
pub use service::setup_service::{SetupError, SetupPhase, SetupStateManager};
pub use service::timetable_engine::{SubjectMap, TimetableEngine};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
