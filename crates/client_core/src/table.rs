//! Command surface for the recipient table.
//!
//! Sort and filter state live here and change only through these commands.
//! Mutations go to the store first; the table never shows a change until the
//! refresh that follows it lands.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::domain::{FieldKey, RecipientId};
use tracing::{info, warn};

use crate::{
    edit_session::{EditSession, EditSessionController, FieldValue, RecipientDraft},
    error::{SessionError, SyncError, ViewError},
    remote::RemoteStore,
    sync::{SyncOutcome, ViewSynchronizer},
    view_model::{build_view, FieldFilter, FilterSpec, SortDirection, SortSpec, TableView},
};

/// Answer to a row's edit request: the opened session, or why it was refused.
pub type EditIntent = Result<EditSession, SessionError>;

/// A store mutation that succeeded, with the result of the refresh issued after
/// it. An `Ok` refresh means the snapshot already includes the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub recipient_id: RecipientId,
    pub refresh: Result<SyncOutcome, SyncError>,
}

#[derive(Default)]
struct ViewState {
    sort: Option<SortSpec>,
    filters: FilterSpec,
}

pub struct RecipientTable {
    store: Arc<dyn RemoteStore>,
    sync: Arc<ViewSynchronizer>,
    sessions: EditSessionController,
    view_state: Mutex<ViewState>,
}

impl RecipientTable {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let sync = Arc::new(ViewSynchronizer::new(Arc::clone(&store)));
        Self {
            store,
            sync,
            sessions: EditSessionController::new(),
            view_state: Mutex::new(ViewState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.view_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn synchronizer(&self) -> &Arc<ViewSynchronizer> {
        &self.sync
    }

    pub fn sort(&self) -> Option<SortSpec> {
        self.state().sort
    }

    pub fn filters(&self) -> FilterSpec {
        self.state().filters.clone()
    }

    pub fn set_sort(&self, field: FieldKey, direction: SortDirection) {
        self.state().sort = Some(SortSpec::new(field, direction));
    }

    pub fn clear_sort(&self) {
        self.state().sort = None;
    }

    pub fn sort_by_first_name(&self) {
        self.set_sort(FieldKey::FirstName, SortDirection::Descending);
    }

    /// Oldest first.
    pub fn sort_by_age(&self) {
        self.set_sort(FieldKey::DateOfBirth, SortDirection::Ascending);
    }

    pub fn set_filter(&self, field: FieldKey, filter: FieldFilter) -> Result<(), ViewError> {
        self.state().filters.insert(field, filter)
    }

    pub fn clear_filter(&self, field: FieldKey) {
        self.state().filters.remove(field);
    }

    pub fn clear_filters(&self) {
        self.state().filters.clear();
    }

    pub fn clear_all(&self) {
        let mut state = self.state();
        state.sort = None;
        state.filters.clear();
    }

    pub fn session(&self) -> Option<EditSession> {
        self.sessions.session()
    }

    /// Opens a session on the record as it appears in the latest snapshot.
    pub fn request_edit(&self, recipient_id: RecipientId) -> EditIntent {
        let snapshot = self.sync.snapshot();
        let record = snapshot
            .find(recipient_id)
            .ok_or(SessionError::RecordNotFound(recipient_id))?;
        self.sessions.open(record)
    }

    pub fn edit_field(&self, field: FieldKey, value: FieldValue) -> Result<(), SessionError> {
        self.sessions.edit(field, value)
    }

    /// Commits the open draft, then refreshes so the view reflects the commit.
    /// A refresh that lands on another caller's outstanding fetch waits for it.
    pub async fn commit_edit(&self) -> Result<MutationOutcome, SessionError> {
        let outcome = self.sessions.commit(self.store.as_ref()).await?;
        let refresh = self.sync.refresh_settled().await;
        Ok(MutationOutcome {
            recipient_id: outcome.recipient_id,
            refresh,
        })
    }

    pub fn cancel_edit(&self) -> Result<EditSession, SessionError> {
        self.sessions.cancel()
    }

    pub async fn create_recipient(
        &self,
        draft: &RecipientDraft,
    ) -> Result<MutationOutcome, SessionError> {
        let fields = draft.parse().map_err(SessionError::Validation)?;
        let recipient_id = self.store.create(&fields).await.map_err(|err| {
            warn!(error = %err, "store rejected new recipient");
            SessionError::RemoteCommit {
                recipient_id: None,
                reason: format!("{err:#}"),
            }
        })?;
        info!(%recipient_id, "recipient created");
        let refresh = self.sync.refresh_settled().await;
        Ok(MutationOutcome {
            recipient_id,
            refresh,
        })
    }

    /// Refused while the record is the target of the edit session.
    pub async fn delete_recipient(
        &self,
        recipient_id: RecipientId,
    ) -> Result<MutationOutcome, SessionError> {
        if let Some(session) = self
            .sessions
            .session()
            .filter(|session| session.target_id == recipient_id)
        {
            return Err(SessionError::SessionConflict {
                active: session.target_id,
            });
        }
        self.store.delete(recipient_id).await.map_err(|err| {
            warn!(%recipient_id, error = %err, "store rejected delete");
            SessionError::RemoteCommit {
                recipient_id: Some(recipient_id),
                reason: format!("{err:#}"),
            }
        })?;
        info!(%recipient_id, "recipient deleted");
        let refresh = self.sync.refresh_settled().await;
        Ok(MutationOutcome {
            recipient_id,
            refresh,
        })
    }

    pub async fn refresh(&self) -> Result<SyncOutcome, SyncError> {
        self.sync.refresh().await
    }

    pub fn view(&self) -> TableView {
        let snapshot = self.sync.snapshot();
        let session = self.sessions.session();
        let state = self.state();
        build_view(
            &snapshot,
            state.sort.as_ref(),
            &state.filters,
            session.as_ref(),
            self.sync.last_error().is_some(),
        )
    }
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
