use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use super::run_blocking;
use crate::certification::cycles::{
    self, AuditCycleQuery, CreateAuditCycleRequest, PasswordConfirmation, UpdateAuditCycleRequest,
};
use crate::certification::error::CertificationError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_audit_cycles(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<AuditCycleQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| cycles::list_audit_cycles(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_audit_cycle(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| cycles::get_audit_cycle(conn, id)).await?;
    Ok(Json(row))
}

pub async fn create_audit_cycle(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateAuditCycleRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| cycles::create_audit_cycle(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_audit_cycle(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAuditCycleRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| cycles::update_audit_cycle(conn, &actor, id, req)).await?;
    Ok(Json(row))
}

/// Deleting a cycle removes everything recorded under it, so the caller
/// re-enters their password.
pub async fn delete_audit_cycle(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(confirmation): Json<PasswordConfirmation>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| {
        cycles::delete_audit_cycle(conn, &actor, id, confirmation)
    })
    .await?;
    info!("Audit cycle {} deleted by {}", id, user.email);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn generate_evaluations(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let generated =
        run_blocking(&state, move |conn| cycles::generate_evaluations(conn, &actor, id)).await?;
    Ok(Json(generated))
}
