//! Schedule repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist recurring weekly slots.
//! - Return slots in deterministic `(day, time_slot)` order.
//!
//! # Invariants
//! - `(day_of_week, time_slot)` is unique; a conflicting insert fails and
//!   leaves existing rows untouched.
//! - Upsert replaces by id without deleting, so attendance rows survive.

use crate::model::schedule::{ScheduleEntry, Weekday};
use crate::repo::{parse_u32, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const SCHEDULE_SELECT_SQL: &str = "SELECT
    id,
    day_of_week,
    subject_id,
    time_slot
FROM schedules";

/// Repository interface for weekly schedule persistence.
pub trait ScheduleRepository {
    /// Inserts a slot, replacing an existing row with the same id.
    fn upsert_schedule(&self, entry: &ScheduleEntry) -> RepoResult<()>;
    /// Lists every slot ordered by `(day, time_slot)`.
    fn list_schedules(&self) -> RepoResult<Vec<ScheduleEntry>>;
    /// Lists one day's slots ordered by `time_slot`.
    fn list_schedule_for_day(&self, day: Weekday) -> RepoResult<Vec<ScheduleEntry>>;
    /// Deletes every slot and, through cascade, every attendance record.
    ///
    /// Returns the number of slots removed.
    fn clear_schedules(&self) -> RepoResult<usize>;
}

/// SQLite-backed schedule repository.
pub struct SqliteScheduleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScheduleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_entries(&self, sql: &str, day: Option<Weekday>) -> RepoResult<Vec<ScheduleEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match day {
            Some(day) => stmt.query([i64::from(day.number())])?,
            None => stmt.query([])?,
        };
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_schedule_row(row)?);
        }
        Ok(entries)
    }
}

impl ScheduleRepository for SqliteScheduleRepository<'_> {
    fn upsert_schedule(&self, entry: &ScheduleEntry) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO schedules (id, day_of_week, subject_id, time_slot)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                day_of_week = excluded.day_of_week,
                subject_id = excluded.subject_id,
                time_slot = excluded.time_slot;",
            params![
                entry.id.to_string(),
                i64::from(entry.day.number()),
                entry.subject_id.to_string(),
                i64::from(entry.time_slot),
            ],
        )?;
        Ok(())
    }

    fn list_schedules(&self) -> RepoResult<Vec<ScheduleEntry>> {
        self.query_entries(
            &format!("{SCHEDULE_SELECT_SQL} ORDER BY day_of_week ASC, time_slot ASC;"),
            None,
        )
    }

    fn list_schedule_for_day(&self, day: Weekday) -> RepoResult<Vec<ScheduleEntry>> {
        self.query_entries(
            &format!("{SCHEDULE_SELECT_SQL} WHERE day_of_week = ?1 ORDER BY time_slot ASC;"),
            Some(day),
        )
    }

    fn clear_schedules(&self) -> RepoResult<usize> {
        Ok(self.conn.execute("DELETE FROM schedules;", [])?)
    }
}

fn parse_schedule_row(row: &Row<'_>) -> RepoResult<ScheduleEntry> {
    let id_text: String = row.get("id")?;
    let subject_text: String = row.get("subject_id")?;
    let day_number: i64 = row.get("day_of_week")?;
    let day = u8::try_from(day_number)
        .ok()
        .and_then(Weekday::from_number)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid day `{day_number}` in schedules.day_of_week"
            ))
        })?;

    Ok(ScheduleEntry {
        id: parse_uuid(&id_text, "schedules.id")?,
        day,
        subject_id: parse_uuid(&subject_text, "schedules.subject_id")?,
        time_slot: parse_u32(row.get("time_slot")?, "schedules.time_slot")?,
    })
}
