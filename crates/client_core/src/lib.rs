//! Client-side reconciliation of the recipient table with the canonical store.

pub mod config;
pub mod edit_session;
pub mod error;
pub mod remote;
pub mod sync;
pub mod table;
pub mod view_model;

pub use config::{load_client_settings, ClientSettings};
pub use edit_session::{EditSession, EditSessionController, FieldValue, RecipientDraft, SessionStatus};
pub use error::{SessionError, SyncError, ViewError};
pub use remote::{HttpRemoteStore, RemoteStore};
pub use sync::{Snapshot, SyncOutcome, ViewSynchronizer};
pub use table::{EditIntent, MutationOutcome, RecipientTable};
pub use view_model::{FieldFilter, FilterSpec, SortDirection, SortSpec, TableView};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
