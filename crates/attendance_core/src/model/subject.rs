//! Subject domain model.
//!
//! # Responsibility
//! - Define the subject record and its running present/absent tally.
//! - Validate subject input before it reaches storage.
//!
//! # Invariants
//! - `id` is generated once on creation and never reused.
//! - `name` is non-blank after trimming.
//! - Counters are unsigned, so `present >= 0` and `absent >= 0` by type.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a subject.
pub type SubjectId = Uuid;

/// Validation failure for subject input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectValidationError {
    /// Name is empty or whitespace only.
    BlankName,
}

impl Display for SubjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "subject name must not be blank"),
        }
    }
}

impl Error for SubjectValidationError {}

/// One subject with its attendance tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    /// Display name, stored trimmed.
    pub name: String,
    pub present: u32,
    pub absent: u32,
}

impl Subject {
    /// Creates a subject with a generated id and zeroed counters.
    pub fn new(name: &str) -> Result<Self, SubjectValidationError> {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Creates a subject with a caller-provided id.
    pub fn with_id(id: SubjectId, name: &str) -> Result<Self, SubjectValidationError> {
        let subject = Self {
            id,
            name: name.trim().to_string(),
            present: 0,
            absent: 0,
        };
        subject.validate()?;
        Ok(subject)
    }

    pub fn validate(&self) -> Result<(), SubjectValidationError> {
        if self.name.trim().is_empty() {
            return Err(SubjectValidationError::BlankName);
        }
        Ok(())
    }

    /// Case-insensitive comparison form of the name.
    pub fn normalized_name(&self) -> String {
        normalize_subject_name(&self.name)
    }

    /// Share of marked classes attended, as a whole percentage.
    ///
    /// A subject with no absences reports 100, including one never marked.
    pub fn attendance_percent(&self) -> u32 {
        if self.absent == 0 {
            return 100;
        }
        let present = u64::from(self.present);
        let total = present + u64::from(self.absent);
        // present <= total, so the quotient always fits in u32.
        (present * 100 / total) as u32
    }
}

/// Trims and lowercases a subject name for duplicate checks.
pub fn normalize_subject_name(name: &str) -> String {
    name.trim().to_lowercase()
}
