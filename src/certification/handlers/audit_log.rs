use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use super::run_blocking;
use crate::certification::audit::{self, AuditFilter};
use crate::certification::error::CertificationError;
use crate::certification::permissions::MANAGEMENT;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(filter): Query<AuditFilter>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| audit::list_entries(conn, &filter)).await?;
    Ok(Json(rows))
}

pub async fn export_audit_logs(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(filter): Query<AuditFilter>,
) -> Result<impl IntoResponse, CertificationError> {
    user.actor().require_any(MANAGEMENT)?;
    let rows = run_blocking(&state, move |conn| audit::list_entries(conn, &filter)).await?;
    let body = audit::export_csv(&rows).map_err(|e| CertificationError::Internal(e.to_string()))?;

    let file_name = format!("audit_log_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}
