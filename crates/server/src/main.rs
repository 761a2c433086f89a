use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use shared::{
    domain::{RecipientFields, RecipientId, RecipientRecord},
    error::{ApiError, ErrorCode},
    protocol::{
        recipient_route, recipients_route, revision_route, CreateRecipientResponse,
        MutationResponse, RecipientListResponse, RevisionResponse,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::ApiContext;
use app_state::AppState;
use config::{load_settings, prepare_database_url};

const MAX_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "recipient store listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(revision_route(), get(http_current_revision))
        .route(
            recipients_route(),
            get(http_list_recipients).post(http_create_recipient),
        )
        .route(
            recipient_route(),
            get(http_get_recipient)
                .put(http_update_recipient)
                .delete(http_delete_recipient),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    if matches!(err.code, ErrorCode::Internal) {
        error!(message = %err.message, "recipient store request failed");
    }
    (status_for(err.code), Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok("ok")
}

async fn http_current_revision(State(state): State<Arc<AppState>>) -> ApiResult<RevisionResponse> {
    let revision = api::current_revision(&state.api).await.map_err(reject)?;
    Ok(Json(RevisionResponse { revision }))
}

async fn http_list_recipients(
    State(state): State<Arc<AppState>>,
) -> ApiResult<RecipientListResponse> {
    api::list_recipients(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_get_recipient(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<i64>,
) -> ApiResult<RecipientRecord> {
    api::get_recipient(&state.api, RecipientId(recipient_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_recipient(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<RecipientFields>,
) -> ApiResult<CreateRecipientResponse> {
    api::create_recipient(&state.api, fields)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_update_recipient(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<i64>,
    Json(fields): Json<RecipientFields>,
) -> ApiResult<MutationResponse> {
    api::update_recipient(&state.api, RecipientId(recipient_id), fields)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_recipient(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<i64>,
) -> ApiResult<MutationResponse> {
    api::delete_recipient(&state.api, RecipientId(recipient_id))
        .await
        .map(Json)
        .map_err(reject)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
