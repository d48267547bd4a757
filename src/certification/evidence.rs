use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::shared::schema::{evaluations, evidence_types, evidences};
use crate::core::shared::utils::trimmed;
use crate::drive::file_suffix;

use super::audit::{self, AuditAction, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, ALL_ROLES, MANAGEMENT};
use super::storage::{
    find_criterion, find_evaluation, find_evidence, find_evidence_type, find_indicator,
    find_program, DbEvaluation, DbEvidence, DbEvidenceType,
};
use super::types::{deserialize_some, ConformityStatus, EvidenceKind};
use super::validation::{
    require_text, validate_evidence_type_scope, validate_same_program, EvidenceTypeScope,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvidenceTypeRequest {
    pub program_id: Uuid,
    pub criterion_id: Uuid,
    pub indicator_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub conformity_status: ConformityStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEvidenceTypeRequest {
    pub program_id: Option<Uuid>,
    pub criterion_id: Option<Uuid>,
    pub indicator_id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    pub conformity_status: Option<ConformityStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvidenceTypeQuery {
    pub program_id: Option<Uuid>,
    pub criterion_id: Option<Uuid>,
    pub indicator_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvidenceRequest {
    pub evaluation_id: Uuid,
    pub evidence_type_id: Option<Uuid>,
    pub kind: EvidenceKind,
    pub location: String,
    #[serde(default)]
    pub non_conforming: bool,
    pub notes: Option<String>,
}

/// Metadata of a file evidence whose bytes are already in the object store.
#[derive(Debug, Clone)]
pub struct UploadedEvidence {
    pub evaluation_id: Uuid,
    pub evidence_type_id: Option<Uuid>,
    pub location: String,
    pub non_conforming: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvidenceQuery {
    pub evaluation_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
}

/// Object key for an uploaded evidence file.
pub fn upload_key(evaluation: &DbEvaluation, file_name: &str) -> String {
    format!(
        "auditoria_{}/avaliacao_{}/{}{}",
        evaluation.audit_cycle_id,
        evaluation.id,
        Uuid::new_v4().simple(),
        file_suffix(file_name)
    )
}

/// The three scope ids must point at one consistent branch of the hierarchy.
fn validate_type_binding(
    conn: &mut PgConnection,
    program_id: Uuid,
    criterion_id: Uuid,
    indicator_id: Uuid,
) -> Result<(), CertificationError> {
    find_program(conn, program_id)?;
    let criterion = find_criterion(conn, criterion_id)?;
    let indicator = find_indicator(conn, indicator_id)?;
    validate_same_program(criterion.program_id, program_id, "evidence type/criterion")?;
    validate_same_program(indicator.program_id, program_id, "evidence type/indicator")?;
    if indicator.criterion_id != criterion.id {
        return Err(CertificationError::EvidenceTypeMismatch(
            "Indicator does not belong to the evidence type's criterion".to_string(),
        ));
    }
    Ok(())
}

fn ensure_type_name_free(
    conn: &mut PgConnection,
    row: &DbEvidenceType,
) -> Result<(), CertificationError> {
    let taken: i64 = evidence_types::table
        .filter(evidence_types::indicator_id.eq(row.indicator_id))
        .filter(evidence_types::name.ilike(&row.name))
        .filter(evidence_types::id.ne(row.id))
        .count()
        .get_result(conn)?;
    if taken > 0 {
        return Err(CertificationError::Duplicate(format!(
            "Evidence type '{}' already exists for this indicator",
            row.name
        )));
    }
    Ok(())
}

pub fn list_evidence_types(
    conn: &mut PgConnection,
    query: &EvidenceTypeQuery,
) -> Result<Vec<DbEvidenceType>, CertificationError> {
    let mut db_query = evidence_types::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(evidence_types::program_id.eq(program_id));
    }
    if let Some(criterion_id) = query.criterion_id {
        db_query = db_query.filter(evidence_types::criterion_id.eq(criterion_id));
    }
    if let Some(indicator_id) = query.indicator_id {
        db_query = db_query.filter(evidence_types::indicator_id.eq(indicator_id));
    }
    let rows = db_query
        .order(evidence_types::name.asc())
        .load::<DbEvidenceType>(conn)?;
    Ok(rows)
}

pub fn get_evidence_type(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbEvidenceType, CertificationError> {
    find_evidence_type(conn, id)
}

pub fn create_evidence_type(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateEvidenceTypeRequest,
) -> Result<DbEvidenceType, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    let name = require_text(&req.name, "name")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        validate_type_binding(conn, req.program_id, req.criterion_id, req.indicator_id)?;
        let row = DbEvidenceType {
            id: Uuid::new_v4(),
            program_id: Some(req.program_id),
            criterion_id: Some(req.criterion_id),
            indicator_id: Some(req.indicator_id),
            name,
            description: trimmed(req.description),
            conformity_status: req.conformity_status.to_string(),
            created_at: Utc::now(),
        };
        ensure_type_name_free(conn, &row)?;

        let saved: DbEvidenceType = diesel::insert_into(evidence_types::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::EvidenceType, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(saved.program_id, None)
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn update_evidence_type(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateEvidenceTypeRequest,
) -> Result<DbEvidenceType, CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_evidence_type(conn, id)?;
        let mut row = before.clone();
        if req.program_id.is_some() {
            row.program_id = req.program_id;
        }
        if req.criterion_id.is_some() {
            row.criterion_id = req.criterion_id;
        }
        if req.indicator_id.is_some() {
            row.indicator_id = req.indicator_id;
        }
        if let Some(name) = &req.name {
            row.name = require_text(name, "name")?;
        }
        if let Some(description) = req.description {
            row.description = trimmed(description);
        }
        if let Some(status) = req.conformity_status {
            row.conformity_status = status.to_string();
        }

        let (Some(program_id), Some(criterion_id), Some(indicator_id)) =
            (row.program_id, row.criterion_id, row.indicator_id)
        else {
            return Err(CertificationError::EvidenceTypeMismatch(
                "Evidence type must be scoped to a program, criterion and indicator".to_string(),
            ));
        };
        validate_type_binding(conn, program_id, criterion_id, indicator_id)?;
        ensure_type_name_free(conn, &row)?;

        let saved: DbEvidenceType = diesel::update(evidence_types::table.find(id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::EvidenceType, id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(saved.program_id, None)
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn delete_evidence_type(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_evidence_type(conn, id)?;
        diesel::delete(evidence_types::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::EvidenceType, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(before.program_id, None)
                .before(&before)?,
        )?;
        Ok(())
    })
}

/// Checks that an optional evidence type fits the evaluation's indicator.
fn check_evidence_type(
    conn: &mut PgConnection,
    evaluation: &DbEvaluation,
    evidence_type_id: Option<Uuid>,
) -> Result<(), CertificationError> {
    let Some(type_id) = evidence_type_id else {
        return Ok(());
    };
    let evidence_type = find_evidence_type(conn, type_id)?;
    let indicator = find_indicator(conn, evaluation.indicator_id)?;
    validate_evidence_type_scope(
        &EvidenceTypeScope {
            program_id: evidence_type.program_id,
            criterion_id: evidence_type.criterion_id,
            indicator_id: evidence_type.indicator_id,
        },
        &indicator.scope(),
    )
}

fn insert_evidence(
    conn: &mut PgConnection,
    actor: &Actor,
    evaluation: &DbEvaluation,
    row: DbEvidence,
) -> Result<DbEvidence, CertificationError> {
    let saved: DbEvidence = diesel::insert_into(evidences::table)
        .values(&row)
        .get_result(conn)?;
    audit::record(
        conn,
        AuditRecord::new(EntityKind::Evidence, saved.id, AuditAction::Create)
            .by(actor.user_id)
            .in_context(Some(evaluation.program_id), Some(evaluation.audit_cycle_id))
            .after(&saved)?,
    )?;
    Ok(saved)
}

pub fn list_evidences(
    conn: &mut PgConnection,
    query: &EvidenceQuery,
) -> Result<Vec<DbEvidence>, CertificationError> {
    let mut db_query = evidences::table.into_boxed();
    if let Some(evaluation_id) = query.evaluation_id {
        db_query = db_query.filter(evidences::evaluation_id.eq(evaluation_id));
    }
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(evidences::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = query.audit_cycle_id {
        let in_cycle = evaluations::table
            .filter(evaluations::audit_cycle_id.eq(audit_cycle_id))
            .select(evaluations::id);
        db_query = db_query.filter(evidences::evaluation_id.eq_any(in_cycle));
    }
    let rows = db_query
        .order(evidences::created_at.desc())
        .load::<DbEvidence>(conn)?;
    Ok(rows)
}

pub fn get_evidence(conn: &mut PgConnection, id: Uuid) -> Result<DbEvidence, CertificationError> {
    find_evidence(conn, id)
}

pub fn create_evidence(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateEvidenceRequest,
) -> Result<DbEvidence, CertificationError> {
    actor.require_any(ALL_ROLES)?;
    if req.kind == EvidenceKind::Arquivo {
        return Err(CertificationError::Validation(
            "File evidence must be sent through the upload endpoint".to_string(),
        ));
    }
    let location = require_text(&req.location, "location")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let evaluation = find_evaluation(conn, req.evaluation_id)?;
        check_evidence_type(conn, &evaluation, req.evidence_type_id)?;
        let row = DbEvidence {
            id: Uuid::new_v4(),
            program_id: evaluation.program_id,
            evaluation_id: evaluation.id,
            evidence_type_id: req.evidence_type_id,
            kind: req.kind.to_string(),
            location,
            non_conforming: req.non_conforming,
            notes: trimmed(req.notes),
            created_by: Some(actor.user_id),
            created_at: Utc::now(),
        };
        insert_evidence(conn, actor, &evaluation, row)
    })
}

/// Loads the evaluation an upload targets and checks the optional type
/// before any bytes are sent to storage.
pub fn prepare_upload(
    conn: &mut PgConnection,
    actor: &Actor,
    evaluation_id: Uuid,
    evidence_type_id: Option<Uuid>,
) -> Result<DbEvaluation, CertificationError> {
    actor.require_any(ALL_ROLES)?;
    let evaluation = find_evaluation(conn, evaluation_id)?;
    check_evidence_type(conn, &evaluation, evidence_type_id)?;
    Ok(evaluation)
}

pub fn create_uploaded_evidence(
    conn: &mut PgConnection,
    actor: &Actor,
    upload: UploadedEvidence,
) -> Result<DbEvidence, CertificationError> {
    actor.require_any(ALL_ROLES)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let evaluation = find_evaluation(conn, upload.evaluation_id)?;
        check_evidence_type(conn, &evaluation, upload.evidence_type_id)?;
        let row = DbEvidence {
            id: Uuid::new_v4(),
            program_id: evaluation.program_id,
            evaluation_id: evaluation.id,
            evidence_type_id: upload.evidence_type_id,
            kind: EvidenceKind::Arquivo.to_string(),
            location: upload.location,
            non_conforming: upload.non_conforming,
            notes: trimmed(upload.notes),
            created_by: Some(actor.user_id),
            created_at: Utc::now(),
        };
        insert_evidence(conn, actor, &evaluation, row)
    })
}

/// Evidence removal does not re-check the evaluation's support rule; only
/// justification text and active corrective actions feed it.
pub fn delete_evidence(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(ALL_ROLES)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_evidence(conn, id)?;
        if actor.is_responsible() && before.created_by != Some(actor.user_id) {
            return Err(CertificationError::Permission(
                "Only your own evidence can be removed".to_string(),
            ));
        }
        let evaluation = find_evaluation(conn, before.evaluation_id)?;
        diesel::delete(evidences::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Evidence, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(evaluation.program_id), Some(evaluation.audit_cycle_id))
                .before(&before)?,
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_key_layout() {
        let now = Utc::now();
        let evaluation = DbEvaluation {
            id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            indicator_id: Uuid::new_v4(),
            audit_cycle_id: Uuid::new_v4(),
            conformity_status: "conforme".to_string(),
            justification: None,
            assessed_at: now,
            updated_at: now,
        };
        let key = upload_key(&evaluation, "Relatorio Final.PDF");
        let prefix = format!(
            "auditoria_{}/avaliacao_{}/",
            evaluation.audit_cycle_id, evaluation.id
        );
        assert!(key.starts_with(&prefix));
        assert!(key.ends_with(".pdf"));
        assert_eq!(key.len(), prefix.len() + 32 + 4);
    }
}
