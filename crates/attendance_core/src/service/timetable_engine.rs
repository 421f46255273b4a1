//! Timetable state engine.
//!
//! # Responsibility
//! - Cache the weekly schedule once and attendance lazily per week.
//! - Publish `Loading | Success | Error` for the current week.
//! - Apply attendance edits optimistically and persist them in the background.
//!
//! # Invariants
//! - The last `set_week` wins: a fetch whose week is no longer current, or
//!   whose schedule was invalidated meanwhile, never publishes.
//! - Attendance edits patch the cache in place; only `reload_schedule`
//!   invalidates the schedule cache.
//! - A reload marks every cached week for refetch, and cached records whose
//!   slot is absent from the reloaded schedule are dropped.
//! - Durable writes run on one writer task, in the order they were issued.
//! - Cache locks are never held across an `.await`.

use crate::gateway::LiveQuery;
use crate::model::attendance::{AttendanceMap, AttendanceRecord, AttendanceStatus, CounterOp};
use crate::model::schedule::{group_by_day, ScheduleByDay, ScheduleId};
use crate::model::subject::{Subject, SubjectId};
use crate::model::timetable::{TimetableSnapshot, TimetableState};
use crate::model::week::WeekKey;
use crate::repo::{RepoError, RepoResult};
use crate::service::repository::Repository;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Subjects keyed by id, as shown next to timetable cells.
pub type SubjectMap = HashMap<SubjectId, Subject>;

#[derive(Debug, Default)]
struct WeekAttendance {
    records: AttendanceMap,
    /// Storage has been merged in; until then `records` holds local edits only.
    loaded: bool,
}

#[derive(Debug)]
struct EngineCache {
    current_week: WeekKey,
    schedule: Option<Arc<ScheduleByDay>>,
    /// Bumped by every `reload_schedule`.
    schedule_generation: u64,
    attendance: HashMap<WeekKey, WeekAttendance>,
}

#[derive(Debug)]
enum WriteCommand {
    UpsertAttendance {
        week: WeekKey,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    },
    AdjustCounter {
        subject_id: SubjectId,
        op: CounterOp,
    },
    Flush(oneshot::Sender<()>),
}

struct EngineInner {
    repo: Repository,
    cache: Mutex<EngineCache>,
    /// Serializes schedule fetches so the schedule is read once.
    schedule_load: tokio::sync::Mutex<()>,
    current_week: watch::Sender<WeekKey>,
    timetable: watch::Sender<TimetableState>,
    subject_map: watch::Receiver<SubjectMap>,
    write_errors: watch::Receiver<Option<String>>,
    writes: mpsc::UnboundedSender<WriteCommand>,
    loads: Mutex<Vec<JoinHandle<()>>>,
}

/// Per-week timetable cache with optimistic attendance updates.
pub struct TimetableEngine {
    inner: Arc<EngineInner>,
    subject_watcher: JoinHandle<()>,
}

impl TimetableEngine {
    /// Creates the engine and starts loading `initial_week`.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime, like `tokio::spawn`.
    pub fn new(repo: Repository, initial_week: WeekKey) -> Self {
        let (writes, write_rx) = mpsc::unbounded_channel();
        let (errors_tx, write_errors) = watch::channel(None);
        let (subjects_tx, subject_map) = watch::channel(SubjectMap::new());

        tokio::spawn(run_writer(repo.clone(), write_rx, errors_tx));
        let subject_watcher = tokio::spawn(follow_subjects(repo.subjects_live(), subjects_tx));

        let inner = Arc::new(EngineInner {
            repo,
            cache: Mutex::new(EngineCache {
                current_week: initial_week,
                schedule: None,
                schedule_generation: 0,
                attendance: HashMap::new(),
            }),
            schedule_load: tokio::sync::Mutex::new(()),
            current_week: watch::channel(initial_week).0,
            timetable: watch::channel(TimetableState::Loading).0,
            subject_map,
            write_errors,
            writes,
            loads: Mutex::new(Vec::new()),
        });

        let engine = Self {
            inner,
            subject_watcher,
        };
        engine.set_week(initial_week);
        engine
    }

    /// Creates the engine positioned on the current local week.
    pub fn for_current_week(repo: Repository) -> Self {
        Self::new(repo, WeekKey::current())
    }

    /// Moves the current week pointer and publishes what the caches allow.
    ///
    /// A fully cached week publishes `Success` before returning. A week whose
    /// attendance is not loaded yet publishes a provisional `Success` with
    /// local edits only and fetches in the background. Without a cached
    /// schedule this publishes `Loading`.
    pub fn set_week(&self, week: WeekKey) {
        let mut guard = lock(&self.inner.cache);
        let cache = &mut *guard;
        cache.current_week = week;
        self.inner.current_week.send_replace(week);

        let Some(schedule) = cache.schedule.clone() else {
            self.inner.timetable.send_replace(TimetableState::Loading);
            drop(guard);
            info!(
                "event=week_set module=timetable status=ok week={} cache=cold",
                week
            );
            self.inner.spawn_load(week);
            return;
        };

        let cached = cache.attendance.get(&week);
        let loaded = cached.is_some_and(|entry| entry.loaded);
        let records = cached
            .map(|entry| entry.records.clone())
            .unwrap_or_default();
        self.inner
            .timetable
            .send_replace(success(schedule, records));
        drop(guard);

        info!(
            "event=week_set module=timetable status=ok week={} cache={}",
            week,
            if loaded { "hit" } else { "partial" }
        );
        if !loaded {
            self.inner.spawn_load(week);
        }
    }

    pub fn next_week(&self) {
        self.set_week(self.current_week().next());
    }

    pub fn previous_week(&self) {
        self.set_week(self.current_week().previous());
    }

    /// Marks one slot of the current week.
    ///
    /// The cache is patched and `Success` republished before returning; the
    /// durable write is queued. Returns the week the mark applies to.
    pub fn update_attendance_status(
        &self,
        schedule_id: ScheduleId,
        status: AttendanceStatus,
    ) -> WeekKey {
        let mut guard = lock(&self.inner.cache);
        let cache = &mut *guard;
        let week = cache.current_week;
        let entry = cache.attendance.entry(week).or_default();
        entry
            .records
            .entry(schedule_id)
            .and_modify(|record| record.status = status)
            .or_insert_with(|| AttendanceRecord::new(week, schedule_id, status));
        if let Some(schedule) = cache.schedule.clone() {
            self.inner
                .timetable
                .send_replace(success(schedule, entry.records.clone()));
        }
        drop(guard);

        self.inner.enqueue(WriteCommand::UpsertAttendance {
            week,
            schedule_id,
            status,
        });
        week
    }

    /// Queues one durable counter adjustment.
    pub fn update_attendance_count(&self, subject_id: SubjectId, op: CounterOp) {
        self.inner
            .enqueue(WriteCommand::AdjustCounter { subject_id, op });
    }

    /// Drops the cached schedule, marks every cached week for refetch and
    /// reloads the current week.
    ///
    /// Call after the stored schedule changed.
    pub async fn reload_schedule(&self) {
        {
            let _loading = self.inner.schedule_load.lock().await;
            let mut cache = lock(&self.inner.cache);
            cache.schedule = None;
            cache.schedule_generation += 1;
            for entry in cache.attendance.values_mut() {
                entry.loaded = false;
            }
            debug!(
                "event=schedule_reload module=timetable status=ok generation={} weeks={}",
                cache.schedule_generation,
                cache.attendance.len()
            );
        }
        self.set_week(self.current_week());
    }

    /// Waits until in-flight loads finished and queued writes reached storage.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *lock(&self.inner.loads));
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(err) = handle.await {
                    warn!(
                        "event=timetable_load module=timetable status=error error=join_failed detail={}",
                        err
                    );
                }
            }
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.inner.writes.send(WriteCommand::Flush(done_tx)).is_ok() {
            // A closed channel means the writer is gone; nothing left to wait on.
            let _ = done_rx.await;
        }
    }

    pub fn current_week(&self) -> WeekKey {
        *self.inner.current_week.borrow()
    }

    pub fn subscribe_current_week(&self) -> watch::Receiver<WeekKey> {
        self.inner.current_week.subscribe()
    }

    pub fn timetable_state(&self) -> TimetableState {
        self.inner.timetable.borrow().clone()
    }

    pub fn subscribe_timetable(&self) -> watch::Receiver<TimetableState> {
        self.inner.timetable.subscribe()
    }

    pub fn subject_map(&self) -> SubjectMap {
        self.inner.subject_map.borrow().clone()
    }

    pub fn subscribe_subject_map(&self) -> watch::Receiver<SubjectMap> {
        self.inner.subject_map.clone()
    }

    /// Latest failed durable write, if any.
    pub fn subscribe_write_errors(&self) -> watch::Receiver<Option<String>> {
        self.inner.write_errors.clone()
    }
}

impl Drop for TimetableEngine {
    fn drop(&mut self) {
        self.subject_watcher.abort();
    }
}

impl EngineInner {
    fn spawn_load(self: &Arc<Self>, week: WeekKey) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.load_week(week).await });
        let mut loads = lock(&self.loads);
        loads.retain(|handle| !handle.is_finished());
        loads.push(handle);
    }

    async fn load_week(&self, week: WeekKey) {
        let started_at = Instant::now();
        debug!(
            "event=timetable_load module=timetable status=start week={}",
            week
        );
        let generation = lock(&self.cache).schedule_generation;

        if let Err(err) = self.ensure_schedule().await {
            self.publish_failure(week, &err);
            return;
        }
        let fetched = match self.repo.weekly_attendance(week).await {
            Ok(records) => records,
            Err(err) => {
                self.publish_failure(week, &err);
                return;
            }
        };

        let mut guard = lock(&self.cache);
        let cache = &mut *guard;
        if cache.schedule_generation != generation {
            // Fetched against a replaced schedule; the reload refetches.
            debug!(
                "event=timetable_load module=timetable status=stale week={} generation={}",
                week, generation
            );
            return;
        }
        let entry = cache.attendance.entry(week).or_default();
        let fetched_count = fetched.len();
        for record in fetched {
            // Local edits are newer than anything read from storage.
            entry.records.entry(record.schedule_id).or_insert(record);
        }
        entry.loaded = true;

        let schedule = match cache.schedule.clone() {
            Some(schedule) if cache.current_week == week => schedule,
            _ => {
                debug!(
                    "event=timetable_load module=timetable status=stale week={} current={}",
                    week, cache.current_week
                );
                return;
            }
        };
        self.timetable
            .send_replace(success(schedule, entry.records.clone()));
        drop(guard);

        info!(
            "event=timetable_load module=timetable status=ok week={} records={} duration_ms={}",
            week,
            fetched_count,
            started_at.elapsed().as_millis()
        );
    }

    async fn ensure_schedule(&self) -> RepoResult<Arc<ScheduleByDay>> {
        let cached = lock(&self.cache).schedule.clone();
        if let Some(schedule) = cached {
            return Ok(schedule);
        }

        let _loading = self.schedule_load.lock().await;
        let cached = lock(&self.cache).schedule.clone();
        if let Some(schedule) = cached {
            return Ok(schedule);
        }

        let schedule = Arc::new(group_by_day(self.repo.list_schedules().await?));
        let slots: HashSet<ScheduleId> = schedule
            .values()
            .flatten()
            .map(|entry| entry.id)
            .collect();
        let mut cache = lock(&self.cache);
        for entry in cache.attendance.values_mut() {
            entry.records.retain(|schedule_id, _| slots.contains(schedule_id));
        }
        cache.schedule = Some(Arc::clone(&schedule));
        Ok(schedule)
    }

    fn publish_failure(&self, week: WeekKey, err: &RepoError) {
        let cache = lock(&self.cache);
        if cache.current_week != week {
            warn!(
                "event=timetable_load module=timetable status=stale week={} current={} error={}",
                week, cache.current_week, err
            );
            return;
        }
        self.timetable
            .send_replace(TimetableState::Error(err.to_string()));
        drop(cache);
        error!(
            "event=timetable_load module=timetable status=error week={} error={}",
            week, err
        );
    }

    fn enqueue(&self, command: WriteCommand) {
        if self.writes.send(command).is_err() {
            error!("event=attendance_write module=timetable status=error error=writer_stopped");
        }
    }
}

fn success(schedule: Arc<ScheduleByDay>, records: AttendanceMap) -> TimetableState {
    TimetableState::Success(TimetableSnapshot {
        schedule_by_day: schedule,
        attendance_by_schedule: records,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_writer(
    repo: Repository,
    mut commands: mpsc::UnboundedReceiver<WriteCommand>,
    errors: watch::Sender<Option<String>>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriteCommand::UpsertAttendance {
                week,
                schedule_id,
                status,
            } => {
                match upsert_attendance(&repo, week, schedule_id, status).await {
                    Ok(()) => debug!(
                        "event=attendance_write module=timetable status=ok week={} schedule_id={} mark={}",
                        week,
                        schedule_id,
                        status.as_str()
                    ),
                    Err(err) => {
                        error!(
                            "event=attendance_write module=timetable status=error week={} schedule_id={} error={}",
                            week, schedule_id, err
                        );
                        errors.send_replace(Some(err.to_string()));
                    }
                }
            }
            WriteCommand::AdjustCounter { subject_id, op } => {
                match adjust_counter(&repo, subject_id, op).await {
                    Ok(()) => debug!(
                        "event=counter_write module=timetable status=ok subject_id={} op={}",
                        subject_id,
                        op.as_str()
                    ),
                    Err(err) => {
                        error!(
                            "event=counter_write module=timetable status=error subject_id={} op={} error={}",
                            subject_id,
                            op.as_str(),
                            err
                        );
                        errors.send_replace(Some(err.to_string()));
                    }
                }
            }
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn upsert_attendance(
    repo: &Repository,
    week: WeekKey,
    schedule_id: ScheduleId,
    status: AttendanceStatus,
) -> RepoResult<()> {
    match repo.get_attendance_record(week, schedule_id).await? {
        Some(_) => {
            repo.update_attendance_status(week, schedule_id, status)
                .await
        }
        None => {
            repo.mark_attendance(AttendanceRecord::new(week, schedule_id, status))
                .await
        }
    }
}

async fn adjust_counter(repo: &Repository, subject_id: SubjectId, op: CounterOp) -> RepoResult<()> {
    match op {
        CounterOp::IncrementPresent => repo.increment_present(subject_id).await,
        CounterOp::IncrementAbsent => repo.increment_absent(subject_id).await,
        CounterOp::DecrementPresent => repo.decrement_present(subject_id).await,
        CounterOp::DecrementAbsent => repo.decrement_absent(subject_id).await,
    }
}

async fn follow_subjects(mut live: LiveQuery<Vec<Subject>>, sink: watch::Sender<SubjectMap>) {
    while let Some(result) = live.next().await {
        match result {
            Ok(subjects) => {
                sink.send_replace(
                    subjects
                        .into_iter()
                        .map(|subject| (subject.id, subject))
                        .collect(),
                );
            }
            Err(err) => warn!(
                "event=subject_map_load module=timetable status=error error={}",
                err
            ),
        }
    }
}
