use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::run_blocking;
use crate::certification::actions::{
    self, CorrectiveActionQuery, CreateCorrectiveActionRequest, UpdateCorrectiveActionRequest,
};
use crate::certification::error::CertificationError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_corrective_actions(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<CorrectiveActionQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let rows = run_blocking(&state, move |conn| {
        actions::list_corrective_actions(conn, &actor, &query)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn get_corrective_action(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| actions::get_corrective_action(conn, &actor, id)).await?;
    Ok(Json(row))
}

pub async fn create_corrective_action(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCorrectiveActionRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        actions::create_corrective_action(conn, &actor, req)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn replace_corrective_action(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCorrectiveActionRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        actions::replace_corrective_action(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

/// Responsibles reach this route to move their own actions' status.
pub async fn patch_corrective_action(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCorrectiveActionRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        actions::patch_corrective_action(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn delete_corrective_action(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| actions::delete_corrective_action(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
