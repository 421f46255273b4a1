//! Initial setup state.
//!
//! # Responsibility
//! - Decide whether setup (at least one subject and one slot) is done.
//! - Expose the subject list and per-day schedule to the setup flow.
//!
//! # Invariants
//! - Phase moves `Unknown -> {Incomplete, Complete}` and never leaves
//!   `Complete`.
//! - Blank subject names are rejected before any storage call.
//! - Published lists only move forward: a snapshot loaded before a newer
//!   change is discarded.

use crate::gateway::{LiveQuery, Table, Versioned};
use crate::model::schedule::{group_by_day, ScheduleByDay, ScheduleEntry, Weekday};
use crate::model::subject::{normalize_subject_name, Subject, SubjectId, SubjectValidationError};
use crate::repo::{RepoError, RepoResult};
use crate::service::repository::Repository;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Setup completion state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetupPhase {
    /// Storage has not answered yet.
    #[default]
    Unknown,
    Incomplete,
    Complete,
}

/// Error type for setup commands.
#[derive(Debug)]
pub enum SetupError {
    Validation(SubjectValidationError),
    /// `complete_setup` called without subjects or without schedule slots.
    IncompleteSetup { has_subjects: bool, has_schedule: bool },
    Storage(RepoError),
}

impl Display for SetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::IncompleteSetup {
                has_subjects,
                has_schedule,
            } => write!(
                f,
                "setup needs at least one subject and one schedule slot (subjects: {has_subjects}, schedule: {has_schedule})"
            ),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::IncompleteSetup { .. } => None,
        }
    }
}

impl From<SubjectValidationError> for SetupError {
    fn from(value: SubjectValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for SetupError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

struct SetupShared {
    repo: Repository,
    phase: watch::Sender<SetupPhase>,
    subjects: watch::Sender<Versioned<Vec<Subject>>>,
    schedule: watch::Sender<Versioned<ScheduleByDay>>,
}

/// Setup flow state over one repository.
pub struct SetupStateManager {
    shared: Arc<SetupShared>,
    tasks: Vec<JoinHandle<()>>,
}

impl SetupStateManager {
    /// Creates the manager and starts determining the phase.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime, like `tokio::spawn`.
    pub fn new(repo: Repository) -> Self {
        let shared = Arc::new(SetupShared {
            repo,
            phase: watch::channel(SetupPhase::Unknown).0,
            subjects: watch::channel(Versioned::default()).0,
            schedule: watch::channel(Versioned::default()).0,
        });

        let init = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                // Failure keeps the phase `Unknown`; `determine` retries.
                let _ = shared.determine().await;
            })
        };
        let subjects = tokio::spawn(follow_subjects(Arc::clone(&shared)));
        let schedule = tokio::spawn(follow_schedule(Arc::clone(&shared)));

        Self {
            shared,
            tasks: vec![init, subjects, schedule],
        }
    }

    /// Queries storage and sets the phase.
    ///
    /// A `Complete` phase is kept even if storage reads as incomplete.
    pub async fn determine(&self) -> Result<SetupPhase, SetupError> {
        self.shared.determine().await
    }

    /// Waits until the phase is no longer `Unknown`.
    ///
    /// Does not return while determination keeps failing.
    pub async fn wait_until_known(&self) -> SetupPhase {
        let mut phase = self.shared.phase.subscribe();
        let known = phase
            .wait_for(|phase| *phase != SetupPhase::Unknown)
            .await
            .map(|phase| *phase);
        known.unwrap_or_else(|_| *self.shared.phase.borrow())
    }

    /// Validates and stores a new subject.
    ///
    /// Names differing only in case are accepted; see `has_subject_named`.
    pub async fn add_subject(&self, name: &str) -> Result<Subject, SetupError> {
        let subject = Subject::new(name)?;
        self.shared.repo.add_subject(subject.clone()).await?;
        info!(
            "event=setup_write module=setup status=ok op=add_subject subject_id={}",
            subject.id
        );
        self.shared.refresh_subjects().await?;
        Ok(subject)
    }

    /// Deletes a subject together with its slots and their attendance.
    pub async fn delete_subject(&self, id: SubjectId) -> Result<(), SetupError> {
        self.shared.repo.delete_subject(id).await?;
        info!(
            "event=setup_write module=setup status=ok op=delete_subject subject_id={}",
            id
        );
        self.shared.refresh_subjects().await?;
        self.shared.refresh_schedule().await?;
        Ok(())
    }

    /// Stores one slot. A taken `(day, position)` fails in storage.
    pub async fn add_schedule_entry(
        &self,
        day: Weekday,
        subject_id: SubjectId,
        position: u32,
    ) -> Result<ScheduleEntry, SetupError> {
        let entry = ScheduleEntry::new(day, subject_id, position);
        self.shared.repo.add_schedule_entry(entry.clone()).await?;
        info!(
            "event=setup_write module=setup status=ok op=add_schedule_entry schedule_id={} day={} slot={}",
            entry.id, day, position
        );
        self.shared.refresh_schedule().await?;
        Ok(entry)
    }

    /// Removes every slot and, through them, all attendance.
    pub async fn clear_schedule(&self) -> Result<(), SetupError> {
        self.shared.repo.clear_schedule().await?;
        info!("event=setup_write module=setup status=ok op=clear_schedule");
        self.shared.refresh_schedule().await?;
        Ok(())
    }

    /// Moves to `Complete` when the in-memory lists are both non-empty.
    pub fn complete_setup(&self) -> Result<(), SetupError> {
        let has_subjects = !self.shared.subjects.borrow().value.is_empty();
        let has_schedule = self
            .shared
            .schedule
            .borrow()
            .value
            .values()
            .any(|slots| !slots.is_empty());

        if !(has_subjects && has_schedule) {
            warn!(
                "event=setup_complete module=setup status=error has_subjects={} has_schedule={}",
                has_subjects, has_schedule
            );
            return Err(SetupError::IncompleteSetup {
                has_subjects,
                has_schedule,
            });
        }

        self.shared.phase.send_replace(SetupPhase::Complete);
        info!("event=setup_complete module=setup status=ok");
        Ok(())
    }

    pub fn phase(&self) -> SetupPhase {
        *self.shared.phase.borrow()
    }

    pub fn is_setup_complete(&self) -> bool {
        self.phase() == SetupPhase::Complete
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SetupPhase> {
        self.shared.phase.subscribe()
    }

    /// Subjects ordered by name.
    pub fn subjects(&self) -> Vec<Subject> {
        self.shared.subjects.borrow().value.clone()
    }

    pub fn subscribe_subjects(&self) -> watch::Receiver<Versioned<Vec<Subject>>> {
        self.shared.subjects.subscribe()
    }

    pub fn schedule_by_day(&self) -> ScheduleByDay {
        self.shared.schedule.borrow().value.clone()
    }

    pub fn subscribe_schedule(&self) -> watch::Receiver<Versioned<ScheduleByDay>> {
        self.shared.schedule.subscribe()
    }

    /// Whether a known subject has `name`, ignoring case and padding.
    pub fn has_subject_named(&self, name: &str) -> bool {
        let wanted = normalize_subject_name(name);
        self.shared
            .subjects
            .borrow()
            .value
            .iter()
            .any(|subject| subject.normalized_name() == wanted)
    }
}

impl Drop for SetupStateManager {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl SetupShared {
    async fn determine(&self) -> Result<SetupPhase, SetupError> {
        let result = async {
            self.refresh_subjects().await?;
            self.refresh_schedule().await?;
            Ok::<(), RepoError>(())
        }
        .await;
        if let Err(err) = result {
            error!(
                "event=setup_init module=setup status=error error={}",
                err
            );
            return Err(err.into());
        }

        let has_subjects = !self.subjects.borrow().value.is_empty();
        let has_schedule = !self.schedule.borrow().value.is_empty();
        let stored = if has_subjects && has_schedule {
            SetupPhase::Complete
        } else {
            SetupPhase::Incomplete
        };
        self.phase.send_if_modified(|phase| {
            if *phase == SetupPhase::Complete || *phase == stored {
                return false;
            }
            *phase = stored;
            true
        });

        let phase = *self.phase.borrow();
        info!(
            "event=setup_init module=setup status=ok phase={:?} has_subjects={} has_schedule={}",
            phase, has_subjects, has_schedule
        );
        Ok(phase)
    }

    async fn refresh_subjects(&self) -> RepoResult<()> {
        let version = self.repo.change_version(Table::Subjects);
        let subjects = self.repo.list_subjects().await?;
        apply_snapshot(&self.subjects, version, subjects);
        Ok(())
    }

    async fn refresh_schedule(&self) -> RepoResult<()> {
        let version = self.repo.change_version(Table::Schedules);
        let entries = self.repo.list_schedules().await?;
        apply_snapshot(&self.schedule, version, group_by_day(entries));
        Ok(())
    }
}

fn apply_snapshot<T>(sender: &watch::Sender<Versioned<T>>, version: u64, value: T) {
    sender.send_if_modified(|current| {
        if version < current.version {
            return false;
        }
        *current = Versioned { version, value };
        true
    });
}

async fn follow_subjects(shared: Arc<SetupShared>) {
    let live: LiveQuery<Vec<Subject>> = shared.repo.subjects_live();
    follow(live, "subjects", |version, subjects| {
        apply_snapshot(&shared.subjects, version, subjects)
    })
    .await;
}

async fn follow_schedule(shared: Arc<SetupShared>) {
    follow(shared.repo.schedules_live(), "schedules", |version, entries| {
        apply_snapshot(&shared.schedule, version, group_by_day(entries))
    })
    .await;
}

async fn follow<T>(mut live: LiveQuery<T>, list: &'static str, apply: impl Fn(u64, T)) {
    while let Some((version, result)) = live.next_versioned().await {
        match result {
            Ok(value) => apply(version, value),
            Err(err) => warn!(
                "event=setup_list_load module=setup status=error list={} error={}",
                list, err
            ),
        }
    }
}
