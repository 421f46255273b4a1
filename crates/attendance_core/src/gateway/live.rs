//! Change signals and live queries.
//!
//! # Responsibility
//! - Track one monotonically bumped counter per table.
//! - Turn a one-shot query plus a change signal into a snapshot stream.
//!
//! # Invariants
//! - A live query yields its first snapshot without waiting.
//! - Snapshots of one subscription are delivered in order; bursts of changes
//!   between two `next()` calls coalesce into one re-query.
//! - Subscriptions are independent; dropping one never affects another.

use crate::gateway::Table;
use crate::repo::RepoResult;
use futures::future::BoxFuture;
use tokio::sync::watch;

/// Per-table change counters shared by one gateway.
#[derive(Debug)]
pub struct ChangeFeed {
    subjects: watch::Sender<u64>,
    schedules: watch::Sender<u64>,
    attendance: watch::Sender<u64>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            subjects: watch::channel(0).0,
            schedules: watch::channel(0).0,
            attendance: watch::channel(0).0,
        }
    }

    pub fn subscribe(&self, table: Table) -> watch::Receiver<u64> {
        self.sender(table).subscribe()
    }

    /// Signals a committed write to every listed table.
    pub fn notify(&self, tables: &[Table]) {
        for table in tables {
            self.sender(*table)
                .send_modify(|version| *version = version.wrapping_add(1));
        }
    }

    fn sender(&self, table: Table) -> &watch::Sender<u64> {
        match table {
            Table::Subjects => &self.subjects,
            Table::Schedules => &self.schedules,
            Table::Attendance => &self.attendance,
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot tagged with the change counter observed before it was loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

type Loader<T> = Box<dyn Fn() -> BoxFuture<'static, RepoResult<T>> + Send + Sync>;

/// Push-based sequence of query snapshots.
pub struct LiveQuery<T> {
    changes: watch::Receiver<u64>,
    loader: Loader<T>,
    primed: bool,
}

impl<T> LiveQuery<T> {
    pub fn new(
        changes: watch::Receiver<u64>,
        loader: impl Fn() -> BoxFuture<'static, RepoResult<T>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            changes,
            loader: Box::new(loader),
            primed: false,
        }
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the gateway that feeds this query is gone.
    pub async fn next(&mut self) -> Option<RepoResult<T>> {
        self.next_versioned()
            .await
            .map(|(_, result)| result)
    }

    /// Like [`LiveQuery::next`], also returning the change counter the
    /// snapshot reflects at least.
    pub async fn next_versioned(&mut self) -> Option<(u64, RepoResult<T>)> {
        if self.primed {
            if self.changes.changed().await.is_err() {
                return None;
            }
        } else {
            self.primed = true;
        }
        let version = *self.changes.borrow_and_update();
        Some((version, (self.loader)().await))
    }
}
