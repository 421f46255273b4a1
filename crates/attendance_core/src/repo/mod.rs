//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define synchronous, entity-oriented data access contracts.
//! - Isolate SQL details from the async gateway and services above.
//!
//! # Invariants
//! - Subject writes call `Subject::validate()` before SQL mutations.
//! - Read paths reject unparseable persisted rows instead of masking them.
//! - Constraint violations surface as `RepoError::Constraint`, never as a
//!   silent partial write.

use crate::db::DbError;
use crate::model::subject::SubjectValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod attendance_repo;
pub mod schedule_repo;
pub mod subject_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage failure for subject/schedule/attendance persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Input rejected before reaching SQL.
    Validation(SubjectValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Unique or foreign-key constraint rejected the write.
    Constraint(String),
    /// Target row does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Persisted data cannot be converted to a valid domain record.
    InvalidData(String),
    /// A previous holder of the shared connection panicked.
    ConnectionPoisoned,
    /// Blocking storage task failed before producing a result.
    Background(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Constraint(message) => write!(f, "constraint violation: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::ConnectionPoisoned => write!(f, "storage connection is poisoned"),
            Self::Background(message) => write!(f, "storage task failed: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SubjectValidationError> for RepoError {
    fn from(value: SubjectValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.unwrap_or_else(|| err.to_string()))
            }
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_u32(value: i64, column: &str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("out of range value `{value}` in {column}")))
}
