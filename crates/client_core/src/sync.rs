//! Revision-driven snapshot refresh.
//!
//! The synchronizer never mutates recipients. It watches the store's revision
//! marker and, when it moves, refetches the whole list and republishes it.
//! Whole-list refetch suits small tables; large ones would need delta updates.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::domain::{RecipientId, RecipientRecord, RevisionMarker};
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{error::SyncError, remote::RemoteStore};

/// Immutable copy of the canonical list, tagged with the revision it was
/// fetched for. `revision` is `None` until the first successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub revision: Option<RevisionMarker>,
    pub records: Vec<RecipientRecord>,
}

impl Snapshot {
    pub fn find(&self, recipient_id: RecipientId) -> Option<&RecipientRecord> {
        self.records
            .iter()
            .find(|record| record.recipient_id == recipient_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new snapshot was published for this revision.
    Refreshed(RevisionMarker),
    /// The revision was already observed; nothing was fetched.
    UpToDate(RevisionMarker),
    /// A fetch for this revision (or a newer one) was already outstanding.
    Coalesced(RevisionMarker),
    /// A newer fetch started while this one was in flight; its result was dropped.
    Superseded(RevisionMarker),
}

#[derive(Default)]
struct SyncState {
    observed: Option<RevisionMarker>,
    inflight: Option<(RevisionMarker, u64)>,
    next_ticket: u64,
    last_error: Option<SyncError>,
}

pub struct ViewSynchronizer {
    store: Arc<dyn RemoteStore>,
    state: Mutex<SyncState>,
    snapshots: watch::Sender<Arc<Snapshot>>,
    settled: Notify,
}

/// Clears the in-flight slot if an `observe` future is dropped mid-fetch, so
/// the same revision can be fetched again.
struct InflightGuard<'a> {
    sync: &'a ViewSynchronizer,
    ticket: u64,
    armed: bool,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.sync.lock_state();
        if state.inflight.is_some_and(|(_, ticket)| ticket == self.ticket) {
            state.inflight = None;
            drop(state);
            self.sync.settled.notify_waiters();
        }
    }
}

impl ViewSynchronizer {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            store,
            state: Mutex::new(SyncState::default()),
            snapshots,
            settled: Notify::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    pub fn observed(&self) -> Option<RevisionMarker> {
        self.lock_state().observed
    }

    /// The view is fresh only once the store's current marker has been observed.
    pub fn is_fresh(&self, current: RevisionMarker) -> bool {
        self.observed() == Some(current)
    }

    /// Failure of the most recent refresh, cleared by the next success.
    pub fn last_error(&self) -> Option<SyncError> {
        self.lock_state().last_error.clone()
    }

    /// Brings the snapshot up to `revision`. Re-observing a revision whose
    /// fetch failed retries it.
    pub async fn observe(&self, revision: RevisionMarker) -> Result<SyncOutcome, SyncError> {
        let ticket = {
            let mut state = self.lock_state();
            if let Some(observed) = state.observed.filter(|observed| revision <= *observed) {
                return Ok(SyncOutcome::UpToDate(observed));
            }
            if let Some((pending, _)) = state.inflight.filter(|(pending, _)| revision <= *pending) {
                debug!(%revision, %pending, "recipient fetch already outstanding");
                return Ok(SyncOutcome::Coalesced(pending));
            }
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.inflight = Some((revision, ticket));
            ticket
        };

        let mut guard = InflightGuard {
            sync: self,
            ticket,
            armed: true,
        };
        let fetched = self.store.fetch_all().await;
        guard.armed = false;

        let mut state = self.lock_state();
        if state.inflight.map(|(_, current)| current) != Some(ticket) {
            debug!(%revision, "dropping superseded recipient fetch");
            return Ok(SyncOutcome::Superseded(revision));
        }
        state.inflight = None;

        let outcome = match fetched {
            Ok(records) => {
                state.observed = Some(revision);
                state.last_error = None;
                drop(state);
                info!(%revision, count = records.len(), "published recipient snapshot");
                self.snapshots.send_replace(Arc::new(Snapshot {
                    revision: Some(revision),
                    records,
                }));
                Ok(SyncOutcome::Refreshed(revision))
            }
            Err(err) => {
                let error = SyncError::Fetch {
                    revision: Some(revision),
                    reason: format!("{err:#}"),
                };
                warn!(%revision, error = %err, "recipient fetch failed; keeping previous snapshot");
                state.last_error = Some(error.clone());
                Err(error)
            }
        };
        self.settled.notify_waiters();
        outcome
    }

    /// Like `observe`, but when another caller's fetch covers `revision` this
    /// waits for that fetch to finish instead of returning early. On return
    /// the snapshot includes `revision`, or the error says why it does not.
    pub async fn observe_settled(
        &self,
        revision: RevisionMarker,
    ) -> Result<SyncOutcome, SyncError> {
        loop {
            let settled = self.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();
            match self.observe(revision).await? {
                SyncOutcome::Coalesced(pending) | SyncOutcome::Superseded(pending) => {
                    debug!(%revision, %pending, "waiting for outstanding recipient fetch");
                    settled.await;
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// Reads the store's current revision and observes it.
    pub async fn refresh(&self) -> Result<SyncOutcome, SyncError> {
        let revision = self.current_revision().await?;
        self.observe(revision).await
    }

    /// `refresh` for callers that must see their own write in the snapshot.
    pub async fn refresh_settled(&self) -> Result<SyncOutcome, SyncError> {
        let revision = self.current_revision().await?;
        self.observe_settled(revision).await
    }

    async fn current_revision(&self) -> Result<RevisionMarker, SyncError> {
        match self.store.current_revision().await {
            Ok(revision) => Ok(revision),
            Err(err) => {
                let error = SyncError::Fetch {
                    revision: None,
                    reason: format!("{err:#}"),
                };
                warn!(error = %err, "failed to read store revision");
                self.lock_state().last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Polls the revision marker and refetches whenever it moves. Abort the
    /// returned handle to stop watching.
    pub fn spawn_revision_watch(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = sync.refresh().await {
                    debug!(error = %err, "revision watch refresh failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
