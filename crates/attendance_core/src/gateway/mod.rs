//! Asynchronous persistence gateway.
//!
//! # Responsibility
//! - Define the async storage contract consumed by the domain repository.
//! - Publish per-table change signals that back live queries.
//!
//! # Invariants
//! - Implementations are explicitly constructed handles; there is no
//!   process-wide store instance.
//! - A successful write bumps the change signal of every table it can
//!   affect, cascaded tables included.
//! - Failures are returned unchanged; the gateway never retries.

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::schedule::{ScheduleEntry, ScheduleId, Weekday};
use crate::model::subject::{Subject, SubjectId};
use crate::model::week::WeekKey;
use crate::repo::RepoResult;
use async_trait::async_trait;
use tokio::sync::watch;

pub mod live;
pub mod sqlite;

pub use live::{ChangeFeed, LiveQuery, Versioned};
pub use sqlite::SqliteGateway;

/// Stored table, used to scope change signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Subjects,
    Schedules,
    Attendance,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subjects => "subjects",
            Self::Schedules => "schedules",
            Self::Attendance => "attendance",
        }
    }
}

/// Async CRUD contract over subjects, schedule slots and attendance.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Subjects ordered by name ascending.
    async fn list_subjects(&self) -> RepoResult<Vec<Subject>>;
    /// Replace-on-conflict by id.
    async fn insert_subject(&self, subject: Subject) -> RepoResult<()>;
    /// Cascades to schedule slots and their attendance.
    async fn delete_subject(&self, id: SubjectId) -> RepoResult<()>;

    /// Slots ordered by `(day, time_slot)`.
    async fn list_schedules(&self) -> RepoResult<Vec<ScheduleEntry>>;
    async fn list_schedule_for_day(&self, day: Weekday) -> RepoResult<Vec<ScheduleEntry>>;
    async fn clear_schedules(&self) -> RepoResult<()>;
    /// Replace-on-conflict by id; fails on a `(day, time_slot)` collision.
    async fn insert_schedule(&self, entry: ScheduleEntry) -> RepoResult<()>;

    /// Replace-on-conflict by `(week, schedule_id)`.
    async fn mark_attendance(&self, record: AttendanceRecord) -> RepoResult<()>;
    async fn get_attendance_record(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
    ) -> RepoResult<Option<AttendanceRecord>>;
    /// No-op when the record does not exist.
    async fn update_attendance_status(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    ) -> RepoResult<()>;
    async fn list_weekly_attendance(&self, week: WeekKey) -> RepoResult<Vec<AttendanceRecord>>;

    async fn increment_present(&self, id: SubjectId) -> RepoResult<()>;
    async fn increment_absent(&self, id: SubjectId) -> RepoResult<()>;
    /// Floored at zero.
    async fn decrement_present(&self, id: SubjectId) -> RepoResult<()>;
    /// Floored at zero.
    async fn decrement_absent(&self, id: SubjectId) -> RepoResult<()>;

    /// Change counter of `table`; bumps after every committed write.
    fn changes(&self, table: Table) -> watch::Receiver<u64>;
}
