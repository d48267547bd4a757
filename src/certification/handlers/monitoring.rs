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
use crate::certification::monitoring::{
    self, CreateMonitoringRequest, CreateNotificationRequest, CreateResolutionRequest,
    MonitoringQuery, NotificationQuery, NotificationStatusRequest, ResolutionQuery,
    UpdateMonitoringRequest, UpdateNotificationRequest,
};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_monitorings(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<MonitoringQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| monitoring::list_monitorings(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_monitoring(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| monitoring::get_monitoring(conn, id)).await?;
    Ok(Json(row))
}

pub async fn create_monitoring(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateMonitoringRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| monitoring::create_monitoring(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_monitoring(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMonitoringRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        monitoring::update_monitoring(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn delete_monitoring(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| monitoring::delete_monitoring(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows =
        run_blocking(&state, move |conn| monitoring::list_notifications(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_notification(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| monitoring::get_notification(conn, id)).await?;
    Ok(Json(row))
}

pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        monitoring::create_notification(conn, &actor, req)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_notification(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNotificationRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        monitoring::update_notification(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn change_notification_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<NotificationStatusRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        monitoring::change_notification_status(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn list_resolutions(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ResolutionQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| monitoring::list_resolutions(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn create_resolution(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateResolutionRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| monitoring::create_resolution(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn delete_resolution(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| monitoring::delete_resolution(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
