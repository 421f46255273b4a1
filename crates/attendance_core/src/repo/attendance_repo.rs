//! Attendance repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist per-week marks of schedule slots.
//!
//! # Invariants
//! - At most one row per `(week_start, schedule_id)`; `mark_attendance`
//!   replaces the status of an existing row.
//! - Rows disappear with their schedule slot (cascade).

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::schedule::ScheduleId;
use crate::model::week::WeekKey;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const ATTENDANCE_SELECT_SQL: &str = "SELECT
    week_start,
    schedule_id,
    status
FROM attendance";

/// Repository interface for attendance persistence.
pub trait AttendanceRepository {
    /// Inserts a record, replacing the status on composite-key conflict.
    fn mark_attendance(&self, record: &AttendanceRecord) -> RepoResult<()>;
    fn get_attendance_record(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
    ) -> RepoResult<Option<AttendanceRecord>>;
    /// Updates the status of an existing record.
    ///
    /// Returns `false` without writing when no record exists.
    fn update_attendance_status(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    ) -> RepoResult<bool>;
    fn list_weekly_attendance(&self, week: WeekKey) -> RepoResult<Vec<AttendanceRecord>>;
}

/// SQLite-backed attendance repository.
pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn mark_attendance(&self, record: &AttendanceRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO attendance (week_start, schedule_id, status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (week_start, schedule_id) DO UPDATE SET
                status = excluded.status;",
            params![
                record.week.storage_key(),
                record.schedule_id.to_string(),
                record.status.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get_attendance_record(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
    ) -> RepoResult<Option<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTENDANCE_SELECT_SQL} WHERE week_start = ?1 AND schedule_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![week.storage_key(), schedule_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_attendance_row(row)?));
        }
        Ok(None)
    }

    fn update_attendance_status(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE attendance
             SET status = ?3
             WHERE week_start = ?1 AND schedule_id = ?2;",
            params![week.storage_key(), schedule_id.to_string(), status.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn list_weekly_attendance(&self, week: WeekKey) -> RepoResult<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTENDANCE_SELECT_SQL} WHERE week_start = ?1 ORDER BY schedule_id ASC;"
        ))?;
        let mut rows = stmt.query([week.storage_key()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_attendance_row(row)?);
        }
        Ok(records)
    }
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let week_text: String = row.get("week_start")?;
    let week = WeekKey::parse_storage_key(&week_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid week key `{week_text}` in attendance.week_start"
        ))
    })?;

    let schedule_text: String = row.get("schedule_id")?;
    let status_text: String = row.get("status")?;
    let status = AttendanceStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in attendance.status"
        ))
    })?;

    Ok(AttendanceRecord {
        week,
        schedule_id: parse_uuid(&schedule_text, "attendance.schedule_id")?,
        status,
    })
}
