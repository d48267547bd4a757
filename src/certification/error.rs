use axum::{response::IntoResponse, Json};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{error, warn};

use crate::drive::DriveError;

#[derive(Debug, thiserror::Error)]
pub enum CertificationError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    InconsistentProgram(String),
    #[error("{0}")]
    InvalidDateRange(String),
    #[error("Corrective actions for status {0} require both start and due dates")]
    MissingSchedule(String),
    #[error("{0}")]
    EvidenceTypeMismatch(String),
    #[error("{0}")]
    UnsupportedNonConformity(String),
    #[error("Review notes are required to approve or reject a document")]
    MissingReviewNotes,
    #[error("Root cause and corrective action are required to conclude an analysis")]
    IncompleteAnalysis,
    #[error("Already exists: {0}")]
    Duplicate(String),
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CertificationError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

impl From<DieselError> for CertificationError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                warn!("Unique violation: {}", info.message());
                Self::Duplicate("A record with these values already exists".to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                warn!("Foreign key violation: {}", info.message());
                Self::Validation("Referenced record is missing or still in use".to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<DriveError> for CertificationError {
    fn from(err: DriveError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl CertificationError {
    /// Message safe to return to clients. Server-side failures are replaced
    /// by a generic text; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Storage(_) => "File storage is unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for CertificationError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InconsistentProgram(_)
            | Self::InvalidDateRange(_)
            | Self::MissingSchedule(_)
            | Self::EvidenceTypeMismatch(_)
            | Self::UnsupportedNonConformity(_)
            | Self::MissingReviewNotes
            | Self::IncompleteAnalysis
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Duplicate(_) => StatusCode::CONFLICT,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) => {
                error!("{self}");
                StatusCode::BAD_GATEWAY
            }
            Self::Database(_) | Self::Internal(_) => {
                error!("{self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (CertificationError::not_found("Evaluation"), StatusCode::NOT_FOUND),
            (
                CertificationError::InconsistentProgram("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (CertificationError::MissingReviewNotes, StatusCode::BAD_REQUEST),
            (CertificationError::Duplicate("x".into()), StatusCode::CONFLICT),
            (CertificationError::Permission("x".into()), StatusCode::FORBIDDEN),
            (CertificationError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (CertificationError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_diesel_not_found_maps_to_not_found() {
        let err: CertificationError = DieselError::NotFound.into();
        assert!(matches!(err, CertificationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_server_failures_hide_details_from_clients() {
        let cases = vec![
            CertificationError::Database(
                "could not connect to server: postgres://certserver:s3cret@db:5432/cert".into(),
            ),
            CertificationError::Internal("Blocking task failed: s3cret".into()),
            CertificationError::Storage("endpoint http://minio:9000 s3cret refused".into()),
        ];
        for err in cases {
            let response = err.into_response();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body");
            let text = String::from_utf8(body.to_vec()).expect("utf8");
            assert!(!text.contains("s3cret"), "{text}");
        }

        let validation = CertificationError::Validation("Year out of range".into());
        assert_eq!(
            validation.public_message(),
            "Validation error: Year out of range"
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            CertificationError::not_found("Indicator").to_string(),
            "Not found: Indicator not found"
        );
        assert_eq!(
            CertificationError::MissingSchedule("nc_menor".into()).to_string(),
            "Corrective actions for status nc_menor require both start and due dates"
        );
    }
}
