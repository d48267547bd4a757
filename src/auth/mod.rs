//! Login, token issuing and user management endpoints.

pub mod users;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use log::{info, warn};
use std::sync::Arc;

use crate::certification::error::CertificationError;
use crate::certification::handlers::run_blocking;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;
use crate::security::issue_token;
use users::{
    ChangePasswordRequest, CreateResponsibleRequest, LoginRequest, RegisterUserRequest,
    TokenResponse, UserQuery,
};

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let email = req.email.clone();
    let user = run_blocking(&state, move |conn| {
        users::authenticate(conn, &req.email, &req.password)
    })
    .await
    .map_err(|e| {
        warn!("Failed login for {email}");
        e
    })?;

    let access_token = issue_token(
        user.id,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_minutes,
    )
    .map_err(|e| CertificationError::Internal(e.to_string()))?;
    info!("User {} logged in", user.email);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user,
    }))
}

pub async fn current_user(user: AuthenticatedUser) -> impl IntoResponse {
    Json(user)
}

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let created = run_blocking(&state, move |conn| users::register_user(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| users::change_password(conn, &actor, req)).await?;
    Ok(Json(serde_json::json!({ "message": "Password updated" })))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let rows = run_blocking(&state, move |conn| users::list_users(conn, &actor, &query)).await?;
    Ok(Json(rows))
}

pub async fn list_responsibles(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, users::list_responsibles).await?;
    Ok(Json(rows))
}

pub async fn create_responsible(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateResponsibleRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let created =
        run_blocking(&state, move |conn| users::create_responsible(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Routes reachable without a token.
pub fn configure_public_auth_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/login", post(login))
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/me", get(current_user))
        .route("/api/auth/register", post(register_user))
        .route("/api/auth/password", put(change_password))
        .route("/api/users", get(list_users))
        .route(
            "/api/users/responsibles",
            get(list_responsibles).post(create_responsible),
        )
}
