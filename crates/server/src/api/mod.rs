use shared::{
    domain::{RecipientFields, RecipientId, RecipientRecord, RevisionMarker},
    error::{ApiError, ErrorCode},
    protocol::{CreateRecipientResponse, MutationResponse, RecipientListResponse},
    validation::{summarize, validate_fields},
};
use storage::Storage;
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn current_revision(ctx: &ApiContext) -> Result<RevisionMarker, ApiError> {
    ctx.storage.current_revision().await.map_err(internal)
}

pub async fn list_recipients(ctx: &ApiContext) -> Result<RecipientListResponse, ApiError> {
    let (revision, recipients) = ctx.storage.list_recipients().await.map_err(internal)?;
    Ok(RecipientListResponse {
        revision,
        recipients,
    })
}

pub async fn get_recipient(
    ctx: &ApiContext,
    recipient_id: RecipientId,
) -> Result<RecipientRecord, ApiError> {
    ctx.storage
        .recipient(recipient_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(recipient_id))
}

pub async fn create_recipient(
    ctx: &ApiContext,
    fields: RecipientFields,
) -> Result<CreateRecipientResponse, ApiError> {
    ensure_valid(&fields)?;
    let (recipient_id, revision) = ctx
        .storage
        .create_recipient(&fields)
        .await
        .map_err(internal)?;
    info!(%recipient_id, %revision, "recipient created");
    Ok(CreateRecipientResponse {
        recipient_id,
        revision,
    })
}

pub async fn update_recipient(
    ctx: &ApiContext,
    recipient_id: RecipientId,
    fields: RecipientFields,
) -> Result<MutationResponse, ApiError> {
    ensure_valid(&fields)?;
    let revision = ctx
        .storage
        .update_recipient(recipient_id, &fields)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(recipient_id))?;
    info!(%recipient_id, %revision, "recipient updated");
    Ok(MutationResponse { revision })
}

pub async fn delete_recipient(
    ctx: &ApiContext,
    recipient_id: RecipientId,
) -> Result<MutationResponse, ApiError> {
    let revision = ctx
        .storage
        .delete_recipient(recipient_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(recipient_id))?;
    info!(%recipient_id, %revision, "recipient deleted");
    Ok(MutationResponse { revision })
}

fn ensure_valid(fields: &RecipientFields) -> Result<(), ApiError> {
    let violations = validate_fields(fields);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ApiError::new(ErrorCode::Validation, summarize(&violations)))
    }
}

fn not_found(recipient_id: RecipientId) -> ApiError {
    ApiError::new(
        ErrorCode::NotFound,
        format!("recipient {recipient_id} not found"),
    )
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
