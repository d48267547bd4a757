use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::shared::schema::evidence_documents;
use crate::core::shared::utils::trimmed;

use super::audit::{self, AuditAction, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, COMPLIANCE_WRITERS};
use super::rules::{review_state_for, validate_document_review_requirement};
use super::storage::{find_document, find_evaluation, find_evidence, DbEvidenceDocument};
use super::types::{deserialize_some, DocumentStatus};
use super::validation::require_text;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub evidence_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    pub review_notes: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub responsible_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub review_notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub deadline: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub responsible_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentStatusRequest {
    pub status: DocumentStatus,
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentQuery {
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub evidence_id: Option<Uuid>,
    pub status: Option<DocumentStatus>,
}

/// Applies the review rule for `status` and stamps or clears the reviewer.
fn apply_status(
    row: &mut DbEvidenceDocument,
    status: DocumentStatus,
    reviewer: Uuid,
) -> Result<(), CertificationError> {
    validate_document_review_requirement(status, row.review_notes.as_deref())?;
    let review = review_state_for(status, reviewer, Utc::now());
    row.status = status.to_string();
    row.reviewed_by_id = review.reviewed_by_id;
    row.reviewed_at = review.reviewed_at;
    Ok(())
}

pub fn list_documents(
    conn: &mut PgConnection,
    query: &DocumentQuery,
) -> Result<Vec<DbEvidenceDocument>, CertificationError> {
    let mut db_query = evidence_documents::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(evidence_documents::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = query.audit_cycle_id {
        db_query = db_query.filter(evidence_documents::audit_cycle_id.eq(audit_cycle_id));
    }
    if let Some(evidence_id) = query.evidence_id {
        db_query = db_query.filter(evidence_documents::evidence_id.eq(evidence_id));
    }
    if let Some(status) = query.status {
        db_query = db_query.filter(evidence_documents::status.eq(status.as_str()));
    }
    let rows = db_query
        .order(evidence_documents::updated_at.desc())
        .load::<DbEvidenceDocument>(conn)?;
    Ok(rows)
}

pub fn get_document(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbEvidenceDocument, CertificationError> {
    find_document(conn, id)
}

pub fn create_document(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateDocumentRequest,
) -> Result<DbEvidenceDocument, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    let title = require_text(&req.title, "title")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let evidence = find_evidence(conn, req.evidence_id)?;
        let evaluation = find_evaluation(conn, evidence.evaluation_id)?;

        let now = Utc::now();
        let mut row = DbEvidenceDocument {
            id: Uuid::new_v4(),
            program_id: evaluation.program_id,
            audit_cycle_id: evaluation.audit_cycle_id,
            evidence_id: evidence.id,
            title,
            content: req.content,
            version: 1,
            status: DocumentStatus::default().to_string(),
            review_notes: trimmed(req.review_notes),
            deadline: req.deadline,
            responsible_id: req.responsible_id,
            reviewed_by_id: None,
            reviewed_at: None,
            created_by: Some(actor.user_id),
            created_at: now,
            updated_at: now,
        };
        apply_status(&mut row, req.status, actor.user_id)?;

        let saved: DbEvidenceDocument = diesel::insert_into(evidence_documents::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::EvidenceDocument, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

fn save_document(
    conn: &mut PgConnection,
    actor: &Actor,
    before: &DbEvidenceDocument,
    mut row: DbEvidenceDocument,
) -> Result<DbEvidenceDocument, CertificationError> {
    row.updated_at = Utc::now();
    let saved: DbEvidenceDocument = diesel::update(evidence_documents::table.find(row.id))
        .set(&row)
        .get_result(conn)?;
    let action = AuditAction::for_update(&before.status, &saved.status);
    audit::record(
        conn,
        AuditRecord::new(EntityKind::EvidenceDocument, saved.id, action)
            .by(actor.user_id)
            .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
            .before(before)?
            .after(&saved)?,
    )?;
    Ok(saved)
}

/// Edits document fields. A content change starts a new version.
pub fn update_document(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateDocumentRequest,
) -> Result<DbEvidenceDocument, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_document(conn, id)?;
        let mut row = before.clone();
        if let Some(title) = &req.title {
            row.title = require_text(title, "title")?;
        }
        if let Some(content) = req.content {
            if content != row.content {
                row.version += 1;
                row.content = content;
            }
        }
        if let Some(review_notes) = req.review_notes {
            row.review_notes = trimmed(review_notes);
        }
        if let Some(deadline) = req.deadline {
            row.deadline = deadline;
        }
        if let Some(responsible_id) = req.responsible_id {
            row.responsible_id = responsible_id;
        }
        // Notes cannot be emptied under a standing decision.
        validate_document_review_requirement(row.document_status()?, row.review_notes.as_deref())?;

        save_document(conn, actor, &before, row)
    })
}

pub fn change_document_status(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: DocumentStatusRequest,
) -> Result<DbEvidenceDocument, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_document(conn, id)?;
        let mut row = before.clone();
        if req.review_notes.is_some() {
            row.review_notes = trimmed(req.review_notes);
        }
        apply_status(&mut row, req.status, actor.user_id)?;
        save_document(conn, actor, &before, row)
    })
}

pub fn delete_document(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_document(conn, id)?;
        diesel::delete(evidence_documents::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::EvidenceDocument, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), Some(before.audit_cycle_id))
                .before(&before)?,
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(review_notes: Option<&str>) -> DbEvidenceDocument {
        let now = Utc::now();
        DbEvidenceDocument {
            id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            audit_cycle_id: Uuid::new_v4(),
            evidence_id: Uuid::new_v4(),
            title: "Procedimento de monitoramento".to_string(),
            content: Some("v1".to_string()),
            version: 1,
            status: "em_revisao".to_string(),
            review_notes: review_notes.map(str::to_string),
            deadline: None,
            responsible_id: None,
            reviewed_by_id: None,
            reviewed_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_approval_without_notes_is_rejected() {
        let mut row = document(Some("  "));
        let result = apply_status(&mut row, DocumentStatus::Aprovado, Uuid::new_v4());
        assert!(matches!(result, Err(CertificationError::MissingReviewNotes)));
        assert_eq!(row.status, "em_revisao");
    }

    #[test]
    fn test_decision_stamps_and_reopening_clears_reviewer() {
        let reviewer = Uuid::new_v4();
        let mut row = document(Some("Faltam assinaturas"));
        apply_status(&mut row, DocumentStatus::Reprovado, reviewer).expect("rejected");
        assert_eq!(row.status, "reprovado");
        assert_eq!(row.reviewed_by_id, Some(reviewer));
        assert!(row.reviewed_at.is_some());

        apply_status(&mut row, DocumentStatus::EmConstrucao, reviewer).expect("reopened");
        assert_eq!(row.reviewed_by_id, None);
        assert_eq!(row.reviewed_at, None);
    }
}
