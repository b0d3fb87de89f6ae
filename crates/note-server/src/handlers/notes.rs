//! Note handlers

use crate::error::ApiError;
use crate::extractors::ValidJson;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use note_core::{new_note_id, CreateNoteRequest, Note, NoteError, NoteStore};
use tracing::{info, warn};

pub async fn root() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/notes")])
}

#[tracing::instrument(skip_all, fields(note.total_count = tracing::field::Empty))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Note>>, ApiError> {
    let store = state.selector.backend().await?;
    let keys = store.keys().await?;
    let notes = fetch_listed(store.as_ref(), keys).await?;

    tracing::Span::current().record("note.total_count", notes.len() as u64);
    Ok(Json(notes))
}

/// Fetch every listed key, skipping keys that disappeared since the listing
async fn fetch_listed(store: &dyn NoteStore, keys: Vec<String>) -> Result<Vec<Note>, NoteError> {
    let mut notes = Vec::with_capacity(keys.len());
    for key in keys {
        match store.get(&key).await {
            Ok(note) => notes.push(note),
            // Raced with an expiry between listing and fetching
            Err(NoteError::NotFound(_)) => warn!("Note {} vanished during listing", key),
            Err(e) => return Err(e),
        }
    }
    Ok(notes)
}

#[tracing::instrument(skip_all, fields(note.identifier = %id))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let store = state.selector.backend().await?;
    Ok(Json(store.get(&id).await?))
}

#[tracing::instrument(skip_all, fields(note.identifier = %id))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<CreateNoteRequest>,
) -> Result<StatusCode, ApiError> {
    let store = state.selector.backend().await?;
    store.set(&id, &Note::from(req)).await?;
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip_all, fields(note.identifier = tracing::field::Empty))]
pub async fn create(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateNoteRequest>,
) -> Result<Json<String>, ApiError> {
    let store = state.selector.backend().await?;

    let id = new_note_id();
    store.set(&id, &Note::from(req)).await?;

    tracing::Span::current().record("note.identifier", id.as_str());
    info!(note_id = %id, "Created a new note");
    Ok(Json(id))
}
