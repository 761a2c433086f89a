use super::*;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use shared::error::ErrorCode;
use tokio::net::TcpListener;

use crate::test_support::{alam_and_chen, fields};

#[derive(Clone, Default)]
struct StubState {
    revision: Arc<Mutex<u64>>,
    updates: Arc<Mutex<Vec<(i64, RecipientFields)>>>,
}

impl StubState {
    fn bump(&self) -> RevisionMarker {
        let mut revision = self.revision.lock().expect("revision");
        *revision += 1;
        RevisionMarker(*revision)
    }

    fn current(&self) -> RevisionMarker {
        RevisionMarker(*self.revision.lock().expect("revision"))
    }
}

async fn list(State(state): State<StubState>) -> Json<RecipientListResponse> {
    Json(RecipientListResponse {
        revision: state.current(),
        recipients: alam_and_chen(),
    })
}

async fn create(
    State(state): State<StubState>,
    Json(_fields): Json<RecipientFields>,
) -> Json<CreateRecipientResponse> {
    Json(CreateRecipientResponse {
        recipient_id: RecipientId(3),
        revision: state.bump(),
    })
}

async fn update(
    State(state): State<StubState>,
    Path(recipient_id): Path<i64>,
    Json(fields): Json<RecipientFields>,
) -> Result<Json<MutationResponse>, (StatusCode, Json<ApiError>)> {
    if fields.first_name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                "First Name is required",
            )),
        ));
    }
    state
        .updates
        .lock()
        .expect("updates")
        .push((recipient_id, fields));
    Ok(Json(MutationResponse {
        revision: state.bump(),
    }))
}

async fn delete(
    State(state): State<StubState>,
    Path(recipient_id): Path<i64>,
) -> Result<Json<MutationResponse>, (StatusCode, Json<ApiError>)> {
    if recipient_id != 1 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("recipient {recipient_id} not found"),
            )),
        ));
    }
    Ok(Json(MutationResponse {
        revision: state.bump(),
    }))
}

async fn revision(State(state): State<StubState>) -> Json<RevisionResponse> {
    Json(RevisionResponse {
        revision: state.current(),
    })
}

async fn spawn_store_server(state: StubState) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/recipients", get(list).post(create))
        .route("/recipients/:recipient_id", axum::routing::put(update).delete(delete))
        .route("/revision", get(revision))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn client_for(state: StubState) -> HttpRemoteStore {
    let server_url = spawn_store_server(state).await.expect("spawn server");
    let settings = ClientSettings::default()
        .with_server_url(format!("{server_url}/"))
        .expect("settings");
    HttpRemoteStore::new(&settings).expect("client")
}

#[tokio::test]
async fn fetches_records_and_revision() {
    let state = StubState::default();
    *state.revision.lock().expect("revision") = 4;
    let client = client_for(state).await;

    assert_eq!(client.fetch_all().await.expect("list"), alam_and_chen());
    assert_eq!(
        client.current_revision().await.expect("revision"),
        RevisionMarker(4)
    );
    assert!(!client.server_url().ends_with('/'));
}

#[tokio::test]
async fn mutations_advance_revision() {
    let state = StubState::default();
    let client = client_for(state.clone()).await;

    let created = client
        .create(&fields("Ida", "Nakamura", false))
        .await
        .expect("create");
    assert_eq!(created, RecipientId(3));

    client
        .update(RecipientId(2), &fields("Wei", "Chen", true))
        .await
        .expect("update");
    client.delete(RecipientId(1)).await.expect("delete");

    assert_eq!(state.current(), RevisionMarker(3));
    let updates = state.updates.lock().expect("updates").clone();
    assert_eq!(updates, vec![(2, fields("Wei", "Chen", true))]);
}

#[tokio::test]
async fn server_error_message_is_surfaced() {
    let client = client_for(StubState::default()).await;

    let err = client
        .update(RecipientId(2), &fields(" ", "Chen", true))
        .await
        .expect_err("validation");
    let api_error = err.downcast_ref::<ApiError>().expect("api error");
    assert_eq!(api_error.code, ErrorCode::Validation);
    assert!(format!("{err:#}").contains("First Name is required"));

    let err = client.delete(RecipientId(7)).await.expect_err("missing");
    let text = format!("{err:#}");
    assert!(text.contains("404"), "unexpected error: {text}");
    assert!(text.contains("recipient 7 not found"), "unexpected error: {text}");
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let settings = ClientSettings::default()
        .with_server_url(format!("http://{addr}"))
        .expect("settings");
    let client = HttpRemoteStore::new(&settings).expect("client");

    let err = client.fetch_all().await.expect_err("refused");
    assert!(format!("{err:#}").contains("recipient list request failed"));
}
