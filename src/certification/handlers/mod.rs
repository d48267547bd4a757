//! HTTP handlers. Each one authenticates the caller, then runs the matching
//! workflow function on a pooled connection off the async runtime.

pub mod actions;
pub mod analyses;
pub mod audit_log;
pub mod catalog;
pub mod cycles;
pub mod documents;
pub mod evaluations;
pub mod evidence;
pub mod monitoring;

use axum::extract::multipart::Field;
use bytes::Bytes;
use diesel::PgConnection;

use crate::certification::error::CertificationError;
use crate::core::shared::state::AppState;

/// Runs `f` with a pooled connection on the blocking thread pool.
pub async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, CertificationError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, CertificationError> + Send + 'static,
    T: Send + 'static,
{
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| CertificationError::Database(e.to_string()))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| CertificationError::Internal(format!("Blocking task failed: {e}")))?
}

/// A file part read fully into memory.
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

pub async fn read_file_field(field: Field<'_>) -> Result<UploadedFile, CertificationError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| CertificationError::Validation("Uploaded file has no name".to_string()))?;
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| crate::drive::guess_content_type(&file_name));
    let bytes = field
        .bytes()
        .await
        .map_err(|e| CertificationError::Validation(format!("Failed to read upload: {e}")))?;
    Ok(UploadedFile {
        file_name,
        content_type,
        bytes,
    })
}

pub async fn read_text_field(field: Field<'_>) -> Result<String, CertificationError> {
    field
        .text()
        .await
        .map_err(|e| CertificationError::Validation(format!("Invalid form field: {e}")))
}
