use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::run_blocking;
use crate::certification::documents::{
    self, CreateDocumentRequest, DocumentQuery, DocumentStatusRequest, UpdateDocumentRequest,
};
use crate::certification::error::CertificationError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<DocumentQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| documents::list_documents(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| documents::get_document(conn, id)).await?;
    Ok(Json(row))
}

pub async fn create_document(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| documents::create_document(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_document(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| documents::update_document(conn, &actor, id, req)).await?;
    Ok(Json(row))
}

pub async fn change_document_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DocumentStatusRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        documents::change_document_status(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| documents::delete_document(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
