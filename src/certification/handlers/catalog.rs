use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::run_blocking;
use crate::certification::catalog::{
    self, CreateCriterionRequest, CreateIndicatorRequest, CreatePrincipleRequest,
    CreateProgramRequest, HierarchyQuery, UpdateCriterionRequest, UpdateIndicatorRequest,
    UpdatePrincipleRequest, UpdateProgramRequest,
};
use crate::certification::error::CertificationError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_programs(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, CertificationError> {
    let programs = run_blocking(&state, catalog::list_programs).await?;
    Ok(Json(programs))
}

pub async fn get_program(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let program = run_blocking(&state, move |conn| catalog::get_program(conn, id)).await?;
    Ok(Json(program))
}

pub async fn create_program(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateProgramRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let program = run_blocking(&state, move |conn| catalog::create_program(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

pub async fn update_program(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProgramRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let program =
        run_blocking(&state, move |conn| catalog::update_program(conn, &actor, id, req)).await?;
    Ok(Json(program))
}

pub async fn delete_program(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| catalog::delete_program(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_principles(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<HierarchyQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let principles = run_blocking(&state, move |conn| catalog::list_principles(conn, &query)).await?;
    Ok(Json(principles))
}

pub async fn get_principle(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let principle = run_blocking(&state, move |conn| catalog::get_principle(conn, id)).await?;
    Ok(Json(principle))
}

pub async fn create_principle(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreatePrincipleRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let principle =
        run_blocking(&state, move |conn| catalog::create_principle(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(principle)))
}

pub async fn update_principle(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePrincipleRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let principle =
        run_blocking(&state, move |conn| catalog::update_principle(conn, &actor, id, req)).await?;
    Ok(Json(principle))
}

pub async fn delete_principle(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| catalog::delete_principle(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_criteria(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<HierarchyQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let criteria = run_blocking(&state, move |conn| catalog::list_criteria(conn, &query)).await?;
    Ok(Json(criteria))
}

pub async fn get_criterion(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let criterion = run_blocking(&state, move |conn| catalog::get_criterion(conn, id)).await?;
    Ok(Json(criterion))
}

pub async fn create_criterion(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCriterionRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let criterion =
        run_blocking(&state, move |conn| catalog::create_criterion(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(criterion)))
}

pub async fn update_criterion(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCriterionRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let criterion =
        run_blocking(&state, move |conn| catalog::update_criterion(conn, &actor, id, req)).await?;
    Ok(Json(criterion))
}

pub async fn delete_criterion(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| catalog::delete_criterion(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_indicators(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<HierarchyQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let indicators = run_blocking(&state, move |conn| catalog::list_indicators(conn, &query)).await?;
    Ok(Json(indicators))
}

pub async fn get_indicator(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let indicator = run_blocking(&state, move |conn| catalog::get_indicator(conn, id)).await?;
    Ok(Json(indicator))
}

pub async fn create_indicator(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateIndicatorRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let indicator =
        run_blocking(&state, move |conn| catalog::create_indicator(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(indicator)))
}

pub async fn update_indicator(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateIndicatorRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let indicator =
        run_blocking(&state, move |conn| catalog::update_indicator(conn, &actor, id, req)).await?;
    Ok(Json(indicator))
}

pub async fn delete_indicator(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| catalog::delete_indicator(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
