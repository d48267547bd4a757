//! System-wide settings: company name and logo.

use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::certification::audit::{self, AuditAction, AuditRecord, EntityKind};
use crate::certification::error::CertificationError;
use crate::certification::handlers::{read_file_field, run_blocking};
use crate::certification::permissions::{Actor, MANAGEMENT};
use crate::certification::types::deserialize_some;
use crate::certification::validation::require_text;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::schema::system_settings;
use crate::core::shared::state::AppState;
use crate::drive::{file_suffix, parse_locator};

pub const DEFAULT_COMPANY_NAME: &str = "Empresa";
pub const LOGO_KEY_PREFIX: &str = "configuracoes/";

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = system_settings)]
#[diesel(treat_none_as_null = true)]
pub struct DbSystemSettings {
    pub id: Uuid,
    pub company_name: String,
    pub logo_url: Option<String>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub logo_url: Option<Option<String>>,
}

/// Object key for an uploaded company logo.
pub fn logo_key(file_name: &str) -> String {
    format!(
        "{LOGO_KEY_PREFIX}logo_empresa_{}{}",
        Uuid::new_v4().simple(),
        file_suffix(file_name)
    )
}

/// The logo is served without authentication, so it may only point at the
/// settings area of our own bucket.
pub fn validate_logo_locator(locator: &str, bucket: &str) -> Result<(), CertificationError> {
    let (locator_bucket, key) = parse_locator(locator).map_err(|_| {
        CertificationError::Validation("The logo must be held in internal storage".to_string())
    })?;
    if locator_bucket != bucket || !key.starts_with(LOGO_KEY_PREFIX) {
        return Err(CertificationError::Validation(
            "The logo must be held in the settings area of internal storage".to_string(),
        ));
    }
    Ok(())
}

pub fn is_image(content_type: &str) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// The single settings row, created with defaults on first access.
pub fn get_or_create_settings(
    conn: &mut PgConnection,
) -> Result<DbSystemSettings, CertificationError> {
    if let Some(row) = system_settings::table
        .order(system_settings::created_at.asc())
        .first::<DbSystemSettings>(conn)
        .optional()?
    {
        return Ok(row);
    }

    let now = Utc::now();
    let row = DbSystemSettings {
        id: Uuid::new_v4(),
        company_name: DEFAULT_COMPANY_NAME.to_string(),
        logo_url: None,
        updated_by: None,
        created_at: now,
        updated_at: now,
    };
    let saved: DbSystemSettings = diesel::insert_into(system_settings::table)
        .values(&row)
        .get_result(conn)?;
    info!("Created default system settings {}", saved.id);
    Ok(saved)
}

fn save_settings(
    conn: &mut PgConnection,
    actor: &Actor,
    before: &DbSystemSettings,
    mut row: DbSystemSettings,
) -> Result<DbSystemSettings, CertificationError> {
    row.updated_by = Some(actor.user_id);
    row.updated_at = Utc::now();
    let saved: DbSystemSettings = diesel::update(system_settings::table.find(row.id))
        .set(&row)
        .get_result(conn)?;
    audit::record(
        conn,
        AuditRecord::new(EntityKind::SystemSettings, saved.id, AuditAction::Update)
            .by(actor.user_id)
            .before(before)?
            .after(&saved)?,
    )?;
    Ok(saved)
}

pub fn update_settings(
    conn: &mut PgConnection,
    actor: &Actor,
    bucket: &str,
    req: UpdateSettingsRequest,
) -> Result<DbSystemSettings, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    if req.company_name.is_none() && req.logo_url.is_none() {
        return Err(CertificationError::Validation(
            "No settings field was provided".to_string(),
        ));
    }
    if let Some(Some(locator)) = &req.logo_url {
        validate_logo_locator(locator, bucket)?;
    }

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = get_or_create_settings(conn)?;
        let mut row = before.clone();
        if let Some(company_name) = &req.company_name {
            row.company_name = require_text(company_name, "company_name")?;
        }
        if let Some(logo_url) = req.logo_url {
            row.logo_url = logo_url;
        }
        save_settings(conn, actor, &before, row)
    })
}

pub fn set_logo(
    conn: &mut PgConnection,
    actor: &Actor,
    locator: String,
) -> Result<DbSystemSettings, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = get_or_create_settings(conn)?;
        let mut row = before.clone();
        row.logo_url = Some(locator);
        save_settings(conn, actor, &before, row)
    })
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, get_or_create_settings).await?;
    Ok(Json(row))
}

pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let bucket = state.drive.bucket().to_string();
    let row = run_blocking(&state, move |conn| update_settings(conn, &actor, &bucket, req)).await?;
    Ok(Json(row))
}

pub async fn upload_logo(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    actor.require_any(MANAGEMENT)?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CertificationError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            file = Some(read_file_field(field).await?);
        }
    }
    let file = file.ok_or_else(|| CertificationError::Validation("file is required".to_string()))?;
    if !is_image(&file.content_type) {
        return Err(CertificationError::Validation(
            "The logo must be an image file".to_string(),
        ));
    }

    let key = logo_key(&file.file_name);
    let locator = state.drive.upload(file.bytes, &key, &file.content_type).await?;
    let row = run_blocking(&state, move |conn| set_logo(conn, &actor, locator)).await?;
    Ok(Json(row))
}

/// Served without a token so the login screen can show it.
pub async fn download_logo(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, get_or_create_settings).await?;
    let locator = row
        .logo_url
        .ok_or_else(|| CertificationError::not_found("Company logo"))?;
    validate_logo_locator(&locator, state.drive.bucket())?;
    let (bytes, content_type) = state.drive.download(&locator).await?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    ))
}

pub fn configure_public_settings_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/settings/logo", get(download_logo))
}

pub fn configure_settings_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/settings/logo-upload", post(upload_logo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logo_locator_must_stay_in_own_settings_area() {
        let key = logo_key("marca.png");
        assert!(validate_logo_locator(&format!("s3://evidencias/{key}"), "evidencias").is_ok());

        let rejected = [
            format!("s3://outro-bucket/{key}"),
            "s3://evidencias/auditoria_1/avaliacao_2/laudo.pdf".to_string(),
            "https://cdn.example.com/logo.png".to_string(),
            "s3://evidencias/".to_string(),
        ];
        for locator in rejected {
            assert!(
                matches!(
                    validate_logo_locator(&locator, "evidencias"),
                    Err(CertificationError::Validation(_))
                ),
                "{locator}"
            );
        }
    }

    #[test]
    fn test_logo_key_layout() {
        let key = logo_key("Marca.PNG");
        assert!(key.starts_with("configuracoes/logo_empresa_"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_only_images_are_logos() {
        assert!(is_image("image/png"));
        assert!(is_image("Image/SVG+xml"));
        assert!(!is_image("application/pdf"));
    }
}
