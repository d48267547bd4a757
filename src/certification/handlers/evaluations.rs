use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::run_blocking;
use crate::certification::error::CertificationError;
use crate::certification::evaluations::{
    self, CreateEvaluationRequest, EvaluationQuery, UpdateEvaluationRequest,
};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_evaluations(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<EvaluationQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| evaluations::list_evaluations(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_evaluation(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| evaluations::get_evaluation(conn, id)).await?;
    Ok(Json(row))
}

pub async fn get_evaluation_detail(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let detail =
        run_blocking(&state, move |conn| evaluations::get_evaluation_detail(conn, &actor, id))
            .await?;
    Ok(Json(detail))
}

pub async fn create_evaluation(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateEvaluationRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| evaluations::create_evaluation(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Serves both PUT and PATCH.
pub async fn update_evaluation(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEvaluationRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        evaluations::update_evaluation(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn delete_evaluation(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| evaluations::delete_evaluation(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
