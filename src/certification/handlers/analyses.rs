use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::run_blocking;
use crate::certification::analyses::{
    self, AnalysisQuery, AnalysisStatusRequest, CreateAnalysisRequest, UpdateAnalysisRequest,
};
use crate::certification::error::CertificationError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_analyses(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<AnalysisQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| analyses::list_analyses(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| analyses::get_analysis(conn, id)).await?;
    Ok(Json(row))
}

pub async fn analysis_history(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| analyses::analysis_history(conn, id)).await?;
    Ok(Json(rows))
}

pub async fn create_analysis(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateAnalysisRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| analyses::create_analysis(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_analysis(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAnalysisRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| analyses::update_analysis(conn, &actor, id, req)).await?;
    Ok(Json(row))
}

pub async fn change_analysis_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AnalysisStatusRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        analyses::change_analysis_status(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| analyses::delete_analysis(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
