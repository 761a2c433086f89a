//! In-memory store shared by the client_core unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::domain::{
    Ethnicity, Gender, Race, RecipientFields, RecipientId, RecipientRecord, RevisionMarker,
};
use tokio::sync::oneshot;

use crate::remote::RemoteStore;

pub(crate) fn fields(first_name: &str, last_name: &str, veteran_status: bool) -> RecipientFields {
    RecipientFields {
        first_name: first_name.into(),
        last_name: last_name.into(),
        date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 1).expect("date"),
        gender: Gender::Female,
        race: Race::Asian,
        ethnicity: Ethnicity::NonHispanic,
        veteran_status,
        household_id: "HH-1".into(),
        active_status: true,
    }
}

pub(crate) fn record(id: i64, first_name: &str, last_name: &str, veteran: bool) -> RecipientRecord {
    RecipientRecord::new(RecipientId(id), fields(first_name, last_name, veteran))
}

/// `[{1, "Alam", inactive, non-veteran}, {2, "Chen", active, veteran}]`
pub(crate) fn alam_and_chen() -> Vec<RecipientRecord> {
    let mut alam = record(1, "Rana", "Alam", false);
    alam.fields.active_status = false;
    vec![alam, record(2, "Wei", "Chen", true)]
}

struct StoreState {
    records: Vec<RecipientRecord>,
    next_id: i64,
    revision: RevisionMarker,
}

#[derive(Default)]
pub(crate) struct FakeRemoteStore {
    state: Mutex<Option<StoreState>>,
    fetch_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    pub fail_fetch: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_revision: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
}

impl FakeRemoteStore {
    /// Seeds the store at revision `r1`.
    pub(crate) fn with_records(records: Vec<RecipientRecord>) -> Self {
        let next_id = records
            .iter()
            .map(|record| record.recipient_id.0)
            .max()
            .unwrap_or(0)
            + 1;
        let store = Self::default();
        *store.state.lock().expect("state") = Some(StoreState {
            records,
            next_id,
            revision: RevisionMarker(1),
        });
        store
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut guard = self.state.lock().expect("state");
        let state = guard.get_or_insert_with(|| StoreState {
            records: Vec::new(),
            next_id: 1,
            revision: RevisionMarker(1),
        });
        f(state)
    }

    pub(crate) fn revision(&self) -> RevisionMarker {
        self.with_state(|state| state.revision)
    }

    pub(crate) fn records(&self) -> Vec<RecipientRecord> {
        self.with_state(|state| state.records.clone())
    }

    /// Simulates a change made by another client.
    pub(crate) fn external_update(&self, record: RecipientRecord) -> RevisionMarker {
        self.with_state(|state| {
            match state
                .records
                .iter_mut()
                .find(|existing| existing.recipient_id == record.recipient_id)
            {
                Some(existing) => *existing = record,
                None => state.records.push(record),
            }
            state.revision = RevisionMarker(state.revision.0 + 1);
            state.revision
        })
    }

    /// Holds the next `fetch_all` until the returned sender fires or is dropped.
    pub(crate) fn gate_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.fetch_gates.lock().expect("gates").push_back(rx);
        tx
    }

    pub(crate) async fn wait_for_fetches(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.fetch_calls.load(Ordering::SeqCst) < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetches started");
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn fetch_all(&self) -> Result<Vec<RecipientRecord>> {
        let gate = self.fetch_gates.lock().expect("gates").pop_front();
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        Ok(self.records())
    }

    async fn create(&self, fields: &RecipientFields) -> Result<RecipientId> {
        Ok(self.with_state(|state| {
            let recipient_id = RecipientId(state.next_id);
            state.next_id += 1;
            state
                .records
                .push(RecipientRecord::new(recipient_id, fields.clone()));
            state.revision = RevisionMarker(state.revision.0 + 1);
            recipient_id
        }))
    }

    async fn update(&self, recipient_id: RecipientId, fields: &RecipientFields) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        self.with_state(|state| -> Result<()> {
            let record = state
                .records
                .iter_mut()
                .find(|record| record.recipient_id == recipient_id)
                .ok_or_else(|| anyhow!("recipient {recipient_id} not found"))?;
            record.fields = fields.clone();
            state.revision = RevisionMarker(state.revision.0 + 1);
            Ok(())
        })
    }

    async fn delete(&self, recipient_id: RecipientId) -> Result<()> {
        self.with_state(|state| -> Result<()> {
            let before = state.records.len();
            state
                .records
                .retain(|record| record.recipient_id != recipient_id);
            if state.records.len() == before {
                bail!("recipient {recipient_id} not found");
            }
            state.revision = RevisionMarker(state.revision.0 + 1);
            Ok(())
        })
    }

    async fn current_revision(&self) -> Result<RevisionMarker> {
        if self.fail_revision.load(Ordering::SeqCst) {
            bail!("revision endpoint unavailable");
        }
        Ok(self.revision())
    }
}
