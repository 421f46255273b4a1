//! Subject repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist subjects and their present/absent counters.
//! - Keep counter arithmetic inside SQL so it cannot race with reads.
//!
//! # Invariants
//! - Upsert replaces by id without deleting the row, so it never cascades.
//! - Decrements are floored at zero; a decrement at zero is a no-op.
//! - Deleting a subject cascades to its schedule slots and their attendance.

use crate::model::attendance::CounterOp;
use crate::model::subject::{Subject, SubjectId};
use crate::repo::{parse_u32, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const SUBJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    present,
    absent
FROM subjects";

/// Repository interface for subject persistence.
pub trait SubjectRepository {
    /// Inserts a subject, replacing an existing row with the same id.
    fn upsert_subject(&self, subject: &Subject) -> RepoResult<()>;
    fn get_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>>;
    /// Lists subjects ordered by name, then id.
    fn list_subjects(&self) -> RepoResult<Vec<Subject>>;
    /// Deletes a subject and everything that references it.
    fn delete_subject(&self, id: SubjectId) -> RepoResult<()>;
    /// Applies one counter operation. Unknown ids are ignored.
    fn apply_counter(&self, id: SubjectId, op: CounterOp) -> RepoResult<()>;
}

/// SQLite-backed subject repository.
pub struct SqliteSubjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSubjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SubjectRepository for SqliteSubjectRepository<'_> {
    fn upsert_subject(&self, subject: &Subject) -> RepoResult<()> {
        subject.validate()?;

        self.conn.execute(
            "INSERT INTO subjects (id, name, present, absent)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                present = excluded.present,
                absent = excluded.absent;",
            params![
                subject.id.to_string(),
                subject.name.as_str(),
                i64::from(subject.present),
                i64::from(subject.absent),
            ],
        )?;
        Ok(())
    }

    fn get_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SUBJECT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_subject_row(row)?));
        }
        Ok(None)
    }

    fn list_subjects(&self) -> RepoResult<Vec<Subject>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SUBJECT_SELECT_SQL} ORDER BY name ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut subjects = Vec::new();
        while let Some(row) = rows.next()? {
            subjects.push(parse_subject_row(row)?);
        }
        Ok(subjects)
    }

    fn delete_subject(&self, id: SubjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM subjects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "subject",
                id,
            });
        }
        Ok(())
    }

    fn apply_counter(&self, id: SubjectId, op: CounterOp) -> RepoResult<()> {
        self.conn.execute(counter_sql(op), [id.to_string()])?;
        Ok(())
    }
}

fn counter_sql(op: CounterOp) -> &'static str {
    match op {
        CounterOp::IncrementPresent => "UPDATE subjects SET present = present + 1 WHERE id = ?1;",
        CounterOp::IncrementAbsent => "UPDATE subjects SET absent = absent + 1 WHERE id = ?1;",
        CounterOp::DecrementPresent => {
            "UPDATE subjects SET present = present - 1 WHERE id = ?1 AND present > 0;"
        }
        CounterOp::DecrementAbsent => {
            "UPDATE subjects SET absent = absent - 1 WHERE id = ?1 AND absent > 0;"
        }
    }
}

fn parse_subject_row(row: &Row<'_>) -> RepoResult<Subject> {
    let id_text: String = row.get("id")?;
    let subject = Subject {
        id: parse_uuid(&id_text, "subjects.id")?,
        name: row.get("name")?,
        present: parse_u32(row.get("present")?, "subjects.present")?,
        absent: parse_u32(row.get("absent")?, "subjects.absent")?,
    };
    subject.validate()?;
    Ok(subject)
}
