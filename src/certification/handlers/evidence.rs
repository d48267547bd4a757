use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::{read_file_field, read_text_field, run_blocking, UploadedFile};
use crate::certification::error::CertificationError;
use crate::certification::evidence::{
    self, upload_key, CreateEvidenceRequest, CreateEvidenceTypeRequest, EvidenceQuery,
    EvidenceTypeQuery, UpdateEvidenceTypeRequest, UploadedEvidence,
};
use crate::certification::types::EvidenceKind;
use crate::core::config::parse_bool;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;

pub async fn list_evidence_types(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<EvidenceTypeQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| evidence::list_evidence_types(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_evidence_type(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| evidence::get_evidence_type(conn, id)).await?;
    Ok(Json(row))
}

pub async fn create_evidence_type(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateEvidenceTypeRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row =
        run_blocking(&state, move |conn| evidence::create_evidence_type(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_evidence_type(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEvidenceTypeRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| {
        evidence::update_evidence_type(conn, &actor, id, req)
    })
    .await?;
    Ok(Json(row))
}

pub async fn delete_evidence_type(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| evidence::delete_evidence_type(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_evidences(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<EvidenceQuery>,
) -> Result<impl IntoResponse, CertificationError> {
    let rows = run_blocking(&state, move |conn| evidence::list_evidences(conn, &query)).await?;
    Ok(Json(rows))
}

pub async fn get_evidence(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| evidence::get_evidence(conn, id)).await?;
    Ok(Json(row))
}

/// Registers a link or note evidence. Files go through the upload endpoint.
pub async fn create_evidence(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateEvidenceRequest>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    let row = run_blocking(&state, move |conn| evidence::create_evidence(conn, &actor, req)).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Default)]
struct UploadForm {
    evaluation_id: Option<Uuid>,
    evidence_type_id: Option<Uuid>,
    notes: Option<String>,
    non_conforming: bool,
    file: Option<UploadedFile>,
}

fn parse_uuid_field(name: &str, value: &str) -> Result<Option<Uuid>, CertificationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| CertificationError::Validation(format!("Invalid {name}: {value}")))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, CertificationError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CertificationError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => form.file = Some(read_file_field(field).await?),
            "evaluation_id" => {
                form.evaluation_id = parse_uuid_field(&name, &read_text_field(field).await?)?
            }
            "evidence_type_id" => {
                form.evidence_type_id = parse_uuid_field(&name, &read_text_field(field).await?)?
            }
            "notes" => form.notes = Some(read_text_field(field).await?),
            "non_conforming" => form.non_conforming = parse_bool(&read_text_field(field).await?),
            other => warn!("Ignoring unknown upload field '{other}'"),
        }
    }
    Ok(form)
}

/// Stores the file under the evaluation's folder, then records the evidence.
pub async fn upload_evidence(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, CertificationError> {
    let form = read_upload_form(multipart).await?;
    let evaluation_id = form
        .evaluation_id
        .ok_or_else(|| CertificationError::Validation("evaluation_id is required".to_string()))?;
    let file = form
        .file
        .ok_or_else(|| CertificationError::Validation("file is required".to_string()))?;
    if file.bytes.is_empty() {
        return Err(CertificationError::Validation("Uploaded file is empty".to_string()));
    }

    let actor = user.actor();
    let evidence_type_id = form.evidence_type_id;
    let evaluation = run_blocking(&state, move |conn| {
        evidence::prepare_upload(conn, &actor, evaluation_id, evidence_type_id)
    })
    .await?;

    let key = upload_key(&evaluation, &file.file_name);
    let location = state.drive.upload(file.bytes, &key, &file.content_type).await?;
    info!("Evidence file {} stored for evaluation {}", file.file_name, evaluation.id);

    let upload = UploadedEvidence {
        evaluation_id,
        evidence_type_id,
        location,
        non_conforming: form.non_conforming,
        notes: form.notes,
    };
    let row = run_blocking(&state, move |conn| {
        evidence::create_uploaded_evidence(conn, &actor, upload)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn download_evidence(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let row = run_blocking(&state, move |conn| evidence::get_evidence(conn, id)).await?;
    if row.kind != EvidenceKind::Arquivo.as_str() {
        return Err(CertificationError::Validation(
            "Only file evidences can be downloaded".to_string(),
        ));
    }
    let (bytes, content_type) = state.drive.download(&row.location).await?;
    let file_name = row
        .location
        .rsplit('/')
        .next()
        .unwrap_or("evidence")
        .to_string();
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}

pub async fn delete_evidence(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CertificationError> {
    let actor = user.actor();
    run_blocking(&state, move |conn| evidence::delete_evidence(conn, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_field() {
        let id = Uuid::new_v4();
        assert_eq!(
            parse_uuid_field("evaluation_id", &id.to_string()).expect("uuid"),
            Some(id)
        );
        assert_eq!(parse_uuid_field("evidence_type_id", "  ").expect("empty"), None);
        assert!(matches!(
            parse_uuid_field("evaluation_id", "abc"),
            Err(CertificationError::Validation(_))
        ));
    }
}
