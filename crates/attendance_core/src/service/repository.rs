//! Typed domain repository over the persistence gateway.
//!
//! # Responsibility
//! - Offer one method per entity operation to the setup and timetable services.
//! - Offer every list operation both as a one-shot call and as a live query.
//!
//! # Invariants
//! - Pure pass-through: no validation, retries or caching here.
//! - Gateway failures propagate unchanged.

use crate::gateway::{LiveQuery, PersistenceGateway, Table};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::schedule::{ScheduleEntry, ScheduleId, Weekday};
use crate::model::subject::{Subject, SubjectId};
use crate::model::week::WeekKey;
use crate::repo::RepoResult;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Cloneable handle shared by the services of one store.
#[derive(Clone)]
pub struct Repository {
    gateway: Arc<dyn PersistenceGateway>,
}

impl Repository {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Current change counter of `table`.
    pub fn change_version(&self, table: Table) -> u64 {
        *self.gateway.changes(table).borrow()
    }

    // Subjects

    pub async fn add_subject(&self, subject: Subject) -> RepoResult<()> {
        self.gateway.insert_subject(subject).await
    }

    pub async fn list_subjects(&self) -> RepoResult<Vec<Subject>> {
        self.gateway.list_subjects().await
    }

    pub fn subjects_live(&self) -> LiveQuery<Vec<Subject>> {
        self.live(Table::Subjects, |gateway| async move {
            gateway.list_subjects().await
        })
    }

    pub async fn delete_subject(&self, id: SubjectId) -> RepoResult<()> {
        self.gateway.delete_subject(id).await
    }

    // Schedule

    pub async fn add_schedule_entry(&self, entry: ScheduleEntry) -> RepoResult<()> {
        self.gateway.insert_schedule(entry).await
    }

    pub async fn list_schedules(&self) -> RepoResult<Vec<ScheduleEntry>> {
        self.gateway.list_schedules().await
    }

    pub fn schedules_live(&self) -> LiveQuery<Vec<ScheduleEntry>> {
        self.live(Table::Schedules, |gateway| async move {
            gateway.list_schedules().await
        })
    }

    pub async fn daily_schedule(&self, day: Weekday) -> RepoResult<Vec<ScheduleEntry>> {
        self.gateway.list_schedule_for_day(day).await
    }

    pub fn daily_schedule_live(&self, day: Weekday) -> LiveQuery<Vec<ScheduleEntry>> {
        self.live(Table::Schedules, move |gateway| async move {
            gateway.list_schedule_for_day(day).await
        })
    }

    pub async fn clear_schedule(&self) -> RepoResult<()> {
        self.gateway.clear_schedules().await
    }

    // Attendance

    pub async fn mark_attendance(&self, record: AttendanceRecord) -> RepoResult<()> {
        self.gateway.mark_attendance(record).await
    }

    pub async fn update_attendance_status(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    ) -> RepoResult<()> {
        self.gateway
            .update_attendance_status(week, schedule_id, status)
            .await
    }

    pub async fn get_attendance_record(
        &self,
        week: WeekKey,
        schedule_id: ScheduleId,
    ) -> RepoResult<Option<AttendanceRecord>> {
        self.gateway.get_attendance_record(week, schedule_id).await
    }

    pub async fn weekly_attendance(&self, week: WeekKey) -> RepoResult<Vec<AttendanceRecord>> {
        self.gateway.list_weekly_attendance(week).await
    }

    pub fn weekly_attendance_live(&self, week: WeekKey) -> LiveQuery<Vec<AttendanceRecord>> {
        self.live(Table::Attendance, move |gateway| async move {
            gateway.list_weekly_attendance(week).await
        })
    }

    // Counters

    pub async fn increment_present(&self, id: SubjectId) -> RepoResult<()> {
        self.gateway.increment_present(id).await
    }

    pub async fn increment_absent(&self, id: SubjectId) -> RepoResult<()> {
        self.gateway.increment_absent(id).await
    }

    pub async fn decrement_present(&self, id: SubjectId) -> RepoResult<()> {
        self.gateway.decrement_present(id).await
    }

    pub async fn decrement_absent(&self, id: SubjectId) -> RepoResult<()> {
        self.gateway.decrement_absent(id).await
    }

    fn live<T, F, Fut>(&self, table: Table, query: F) -> LiveQuery<T>
    where
        F: Fn(Arc<dyn PersistenceGateway>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RepoResult<T>> + Send + 'static,
        T: 'static,
    {
        let gateway = Arc::clone(&self.gateway);
        LiveQuery::new(self.gateway.changes(table), move || {
            query(Arc::clone(&gateway)).boxed()
        })
    }
}
