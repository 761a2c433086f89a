use serde::{Deserialize, Serialize};

use crate::domain::{RecipientId, RecipientRecord, RevisionMarker};

pub fn recipients_route() -> &'static str {
    "/recipients"
}

pub fn recipient_route() -> &'static str {
    "/recipients/:recipient_id"
}

pub fn revision_route() -> &'static str {
    "/revision"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionResponse {
    pub revision: RevisionMarker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientListResponse {
    pub revision: RevisionMarker,
    pub recipients: Vec<RecipientRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipientResponse {
    pub recipient_id: RecipientId,
    pub revision: RevisionMarker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub revision: RevisionMarker,
}
