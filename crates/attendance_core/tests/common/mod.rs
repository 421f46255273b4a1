#![allow(dead_code)]

use async_trait::async_trait;
use attendance_core::gateway::{PersistenceGateway, SqliteGateway, Table};
use attendance_core::model::attendance::{AttendanceRecord, AttendanceStatus};
use attendance_core::model::schedule::{ScheduleEntry, ScheduleId, Weekday};
use attendance_core::model::subject::{Subject, SubjectId};
use attendance_core::model::week::WeekKey;
use attendance_core::repo::{RepoError, RepoResult};
use attendance_core::Repository;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};

/// In-memory gateway that can stall one week's attendance fetch or fail
/// schedule loads.
pub struct ControlledGateway {
    inner: SqliteGateway,
    held_week: Mutex<Option<(WeekKey, Arc<Semaphore>)>>,
    fail_schedules: AtomicBool,
    schedule_loads: AtomicUsize,
}

impl ControlledGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteGateway::open_in_memory().unwrap(),
            held_week: Mutex::new(None),
            fail_schedules: AtomicBool::new(false),
            schedule_loads: AtomicUsize::new(0),
        })
    }

    /// Blocks attendance fetches of `week` until a permit is added to the
    /// returned semaphore.
    pub fn hold_week(&self, week: WeekKey) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.held_week.lock().unwrap() = Some((week, Arc::clone(&gate)));
        gate
    }

    pub fn fail_schedule_loads(&self, fail: bool) {
        self.fail_schedules.store(fail, Ordering::SeqCst);
    }

    pub fn schedule_loads(&self) -> usize {
        self.schedule_loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceGateway for ControlledGateway {
    async fn list_subjects(&self) -> RepoResult<Vec<Subject>> {
        self.inner.list_subjects().await
    }

    async fn insert_subject(&self, subject: Subject) -> RepoResult<()> {
        self.inner.insert_subject(subject).await
    }

    async fn delete_subject(&self, id: SubjectId) -> RepoResult<()> {
        self.inner.delete_subject(id).await
    }

    async fn list_schedules(&self) -> RepoResult<Vec<ScheduleEntry>> {
        self.schedule_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_schedules.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData("schedule table unreadable".to_string()));
        }
        self.inner.list_schedules().await
    }

    async fn list_schedule_for_day(&self, day: Weekday) -> RepoResult<Vec<ScheduleEntry>> {
        self.inner.list_schedule_for_day(day).await
    }

    async fn clear_schedules(&self) -> RepoResult<()> {
        self.inner.clear_schedules().await
    }

    async fn insert_schedule(&self, entry: ScheduleEntry) -> RepoResult<()> {
        self.inner.insert_schedule(entry).await
    }

    async fn mark_attendance(&self, record: AttendanceRecord) -> RepoResult<()> {
        self.inner.mark_attendance(record).await
    }

    async fn get_attendance_record(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
    ) -> RepoResult<Option<AttendanceRecord>> {
        self.inner.get_attendance_record(week, schedule_id).await
    }

    async fn update_attendance_status(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    ) -> RepoResult<()> {
        self.inner
            .update_attendance_status(week, schedule_id, status)
            .await
    }

    async fn list_weekly_attendance(&self, week: WeekKey) -> RepoResult<Vec<AttendanceRecord>> {
        let gate = self
            .held_week
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(held, _)| *held == week)
            .map(|(_, gate)| Arc::clone(gate));
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }
        self.inner.list_weekly_attendance(week).await
    }

    async fn increment_present(&self, id: SubjectId) -> RepoResult<()> {
        self.inner.increment_present(id).await
    }

    async fn increment_absent(&self, id: SubjectId) -> RepoResult<()> {
        self.inner.increment_absent(id).await
    }

    async fn decrement_present(&self, id: SubjectId) -> RepoResult<()> {
        self.inner.decrement_present(id).await
    }

    async fn decrement_absent(&self, id: SubjectId) -> RepoResult<()> {
        self.inner.decrement_absent(id).await
    }

    fn changes(&self, table: Table) -> watch::Receiver<u64> {
        self.inner.changes(table)
    }
}

pub fn repository(gateway: &Arc<ControlledGateway>) -> Repository {
    Repository::new(Arc::clone(gateway) as Arc<dyn PersistenceGateway>)
}

/// Stores one subject and one slot for it.
pub async fn seed_slot(
    repo: &Repository,
    name: &str,
    day: Weekday,
    time_slot: u32,
) -> (Subject, ScheduleEntry) {
    let subject = Subject::new(name).unwrap();
    repo.add_subject(subject.clone()).await.unwrap();
    let slot = ScheduleEntry::new(day, subject.id, time_slot);
    repo.add_schedule_entry(slot.clone()).await.unwrap();
    (subject, slot)
}

pub fn week_of(year: i32, month: u32, day: u32) -> WeekKey {
    WeekKey::containing(NaiveDate::from_ymd_opt(year, month, day).unwrap())
}
