//! SQLite-backed persistence gateway.
//!
//! # Responsibility
//! - Own one migrated connection and serialize access to it.
//! - Run blocking SQL on the Tokio blocking pool so callers only await.
//! - Bump change signals after committed writes.
//!
//! # Invariants
//! - The connection mutex is never held across an `.await`.
//! - Change signals fire only for writes that returned `Ok`.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::gateway::{ChangeFeed, PersistenceGateway, Table};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, CounterOp};
use crate::model::schedule::{ScheduleEntry, ScheduleId, Weekday};
use crate::model::subject::{Subject, SubjectId};
use crate::model::week::WeekKey;
use crate::repo::attendance_repo::{AttendanceRepository, SqliteAttendanceRepository};
use crate::repo::schedule_repo::{ScheduleRepository, SqliteScheduleRepository};
use crate::repo::subject_repo::{SqliteSubjectRepository, SubjectRepository};
use crate::repo::{RepoError, RepoResult};
use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;

const SUBJECT_CASCADE: &[Table] = &[Table::Subjects, Table::Schedules, Table::Attendance];
const SCHEDULE_CASCADE: &[Table] = &[Table::Schedules, Table::Attendance];

/// Gateway over one SQLite connection.
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
    feed: ChangeFeed,
}

impl SqliteGateway {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            feed: ChangeFeed::new(),
        }
    }

    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> RepoResult<T>
    where
        F: FnOnce(&Connection) -> RepoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| RepoError::ConnectionPoisoned)?;
            f(&*guard)
        })
        .await
        .map_err(|err| RepoError::Background(format!("{operation}: {err}")))?
    }

    async fn write<F>(&self, operation: &'static str, touched: &[Table], f: F) -> RepoResult<()>
    where
        F: FnOnce(&Connection) -> RepoResult<()> + Send + 'static,
    {
        let started_at = Instant::now();
        let result = self.run(operation, f).await;
        match &result {
            Ok(()) => {
                self.feed.notify(touched);
                debug!(
                    "event=gateway_write module=gateway status=ok op={} duration_ms={}",
                    operation,
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => warn!(
                "event=gateway_write module=gateway status=error op={} duration_ms={} error={}",
                operation,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    async fn apply_counter(&self, id: SubjectId, op: CounterOp) -> RepoResult<()> {
        self.write(op.as_str(), &[Table::Subjects], move |conn| {
            SqliteSubjectRepository::new(conn).apply_counter(id, op)
        })
        .await
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn list_subjects(&self) -> RepoResult<Vec<Subject>> {
        self.run("list_subjects", |conn| {
            SqliteSubjectRepository::new(conn).list_subjects()
        })
        .await
    }

    async fn insert_subject(&self, subject: Subject) -> RepoResult<()> {
        self.write("insert_subject", &[Table::Subjects], move |conn| {
            SqliteSubjectRepository::new(conn).upsert_subject(&subject)
        })
        .await
    }

    async fn delete_subject(&self, id: SubjectId) -> RepoResult<()> {
        self.write("delete_subject", SUBJECT_CASCADE, move |conn| {
            SqliteSubjectRepository::new(conn).delete_subject(id)
        })
        .await
    }

    async fn list_schedules(&self) -> RepoResult<Vec<ScheduleEntry>> {
        self.run("list_schedules", |conn| {
            SqliteScheduleRepository::new(conn).list_schedules()
        })
        .await
    }

    async fn list_schedule_for_day(&self, day: Weekday) -> RepoResult<Vec<ScheduleEntry>> {
        self.run("list_schedule_for_day", move |conn| {
            SqliteScheduleRepository::new(conn).list_schedule_for_day(day)
        })
        .await
    }

    async fn clear_schedules(&self) -> RepoResult<()> {
        self.write("clear_schedules", SCHEDULE_CASCADE, |conn| {
            SqliteScheduleRepository::new(conn)
                .clear_schedules()
                .map(|_| ())
        })
        .await
    }

    async fn insert_schedule(&self, entry: ScheduleEntry) -> RepoResult<()> {
        self.write("insert_schedule", &[Table::Schedules], move |conn| {
            SqliteScheduleRepository::new(conn).upsert_schedule(&entry)
        })
        .await
    }

    async fn mark_attendance(&self, record: AttendanceRecord) -> RepoResult<()> {
        self.write("mark_attendance", &[Table::Attendance], move |conn| {
            SqliteAttendanceRepository::new(conn).mark_attendance(&record)
        })
        .await
    }

    async fn get_attendance_record(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
    ) -> RepoResult<Option<AttendanceRecord>> {
        self.run("get_attendance_record", move |conn| {
            SqliteAttendanceRepository::new(conn).get_attendance_record(week, schedule_id)
        })
        .await
    }

    async fn update_attendance_status(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    ) -> RepoResult<()> {
        self.write("update_attendance_status", &[Table::Attendance], move |conn| {
            SqliteAttendanceRepository::new(conn)
                .update_attendance_status(week, schedule_id, status)
                .map(|_| ())
        })
        .await
    }

    async fn list_weekly_attendance(&self, week: WeekKey) -> RepoResult<Vec<AttendanceRecord>> {
        self.run("list_weekly_attendance", move |conn| {
            SqliteAttendanceRepository::new(conn).list_weekly_attendance(week)
        })
        .await
    }

    async fn increment_present(&self, id: SubjectId) -> RepoResult<()> {
        self.apply_counter(id, CounterOp::IncrementPresent).await
    }

    async fn increment_absent(&self, id: SubjectId) -> RepoResult<()> {
        self.apply_counter(id, CounterOp::IncrementAbsent).await
    }

    async fn decrement_present(&self, id: SubjectId) -> RepoResult<()> {
        self.apply_counter(id, CounterOp::DecrementPresent).await
    }

    async fn decrement_absent(&self, id: SubjectId) -> RepoResult<()> {
        self.apply_counter(id, CounterOp::DecrementAbsent).await
    }

    fn changes(&self, table: Table) -> watch::Receiver<u64> {
        self.feed.subscribe(table)
    }
}
