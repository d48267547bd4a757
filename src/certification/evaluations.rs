use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::schema::{
    corrective_actions, evaluations, evidence_documents, evidences, root_cause_analyses,
};
use crate::core::shared::utils::trimmed;

use super::audit::{self, AuditAction, AuditFilter, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, COMPLIANCE_WRITERS};
use super::rules::validate_nonconformity_support;
use super::storage::{
    count_active_actions, find_audit_cycle, find_criterion, find_evaluation, find_indicator,
    find_principle, DbAuditLog, DbCorrectiveAction, DbCriterion, DbEvaluation, DbEvidence,
    DbEvidenceDocument, DbIndicator, DbPrinciple, DbRootCauseAnalysis,
};
use super::types::{deserialize_some, ConformityStatus};
use super::validation::validate_same_program;

pub const DETAIL_LOG_LIMIT: i64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvaluationRequest {
    pub indicator_id: Uuid,
    pub audit_cycle_id: Uuid,
    #[serde(default)]
    pub conformity_status: ConformityStatus,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEvaluationRequest {
    pub indicator_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub conformity_status: Option<ConformityStatus>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub justification: Option<Option<String>>,
}

impl UpdateEvaluationRequest {
    pub fn is_empty(&self) -> bool {
        self.indicator_id.is_none()
            && self.audit_cycle_id.is_none()
            && self.conformity_status.is_none()
            && self.justification.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationQuery {
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub indicator_id: Option<Uuid>,
    pub conformity_status: Option<ConformityStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationDetail {
    pub evaluation: DbEvaluation,
    pub indicator: DbIndicator,
    pub criterion: DbCriterion,
    pub principle: DbPrinciple,
    pub evidences: Vec<DbEvidence>,
    pub corrective_actions: Vec<DbCorrectiveAction>,
    pub logs: Vec<DbAuditLog>,
}

fn ensure_pair_free(
    conn: &mut PgConnection,
    indicator_id: Uuid,
    audit_cycle_id: Uuid,
    except: Option<Uuid>,
) -> Result<(), CertificationError> {
    let mut query = evaluations::table
        .filter(evaluations::indicator_id.eq(indicator_id))
        .filter(evaluations::audit_cycle_id.eq(audit_cycle_id))
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(evaluations::id.ne(id));
    }
    let taken: i64 = query.count().get_result(conn)?;
    if taken > 0 {
        return Err(CertificationError::Duplicate(
            "This indicator is already evaluated in this audit cycle".to_string(),
        ));
    }
    Ok(())
}

/// Resolves the program an (indicator, audit cycle) pair belongs to, rejecting
/// pairs that straddle programs.
fn resolve_program(
    conn: &mut PgConnection,
    indicator_id: Uuid,
    audit_cycle_id: Uuid,
) -> Result<Uuid, CertificationError> {
    let indicator = find_indicator(conn, indicator_id)?;
    let cycle = find_audit_cycle(conn, audit_cycle_id)?;
    validate_same_program(indicator.program_id, cycle.program_id, "evaluation/audit cycle")?;
    Ok(indicator.program_id)
}

pub fn list_evaluations(
    conn: &mut PgConnection,
    query: &EvaluationQuery,
) -> Result<Vec<DbEvaluation>, CertificationError> {
    let mut db_query = evaluations::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(evaluations::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = query.audit_cycle_id {
        db_query = db_query.filter(evaluations::audit_cycle_id.eq(audit_cycle_id));
    }
    if let Some(indicator_id) = query.indicator_id {
        db_query = db_query.filter(evaluations::indicator_id.eq(indicator_id));
    }
    if let Some(status) = query.conformity_status {
        db_query = db_query.filter(evaluations::conformity_status.eq(status.as_str()));
    }
    let rows = db_query
        .order(evaluations::updated_at.desc())
        .load::<DbEvaluation>(conn)?;
    Ok(rows)
}

pub fn get_evaluation(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbEvaluation, CertificationError> {
    find_evaluation(conn, id)
}

pub fn create_evaluation(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateEvaluationRequest,
) -> Result<DbEvaluation, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    let justification = trimmed(req.justification);
    // A new evaluation cannot have corrective actions yet.
    validate_nonconformity_support(req.conformity_status, justification.as_deref(), 0)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let program_id = resolve_program(conn, req.indicator_id, req.audit_cycle_id)?;
        ensure_pair_free(conn, req.indicator_id, req.audit_cycle_id, None)?;

        let now = Utc::now();
        let row = DbEvaluation {
            id: Uuid::new_v4(),
            program_id,
            indicator_id: req.indicator_id,
            audit_cycle_id: req.audit_cycle_id,
            conformity_status: req.conformity_status.to_string(),
            justification,
            assessed_at: now,
            updated_at: now,
        };
        let saved: DbEvaluation = diesel::insert_into(evaluations::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Evaluation, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

/// Carries the cycle of analyses and documents hanging off an evaluation
/// along when the evaluation moves to another audit cycle.
fn move_dependents_to_cycle(
    conn: &mut PgConnection,
    actor: &Actor,
    evaluation: &DbEvaluation,
) -> Result<(), CertificationError> {
    let now = Utc::now();

    let analyses = root_cause_analyses::table
        .filter(root_cause_analyses::evaluation_id.eq(evaluation.id))
        .filter(root_cause_analyses::audit_cycle_id.ne(evaluation.audit_cycle_id))
        .load::<DbRootCauseAnalysis>(conn)?;
    for before in analyses {
        let mut row = before.clone();
        row.audit_cycle_id = evaluation.audit_cycle_id;
        row.updated_at = now;
        let saved: DbRootCauseAnalysis = diesel::update(root_cause_analyses::table.find(row.id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::RootCauseAnalysis, saved.id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .before(&before)?
                .after(&saved)?,
        )?;
    }

    let evidence_ids = evidences::table
        .filter(evidences::evaluation_id.eq(evaluation.id))
        .select(evidences::id);
    let documents = evidence_documents::table
        .filter(evidence_documents::evidence_id.eq_any(evidence_ids))
        .filter(evidence_documents::audit_cycle_id.ne(evaluation.audit_cycle_id))
        .load::<DbEvidenceDocument>(conn)?;
    for before in documents {
        let mut row = before.clone();
        row.audit_cycle_id = evaluation.audit_cycle_id;
        row.updated_at = now;
        let saved: DbEvidenceDocument = diesel::update(evidence_documents::table.find(row.id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::EvidenceDocument, saved.id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .before(&before)?
                .after(&saved)?,
        )?;
    }
    Ok(())
}

/// Serves both full (PUT) and partial (PATCH) updates; absent fields keep
/// their stored value.
pub fn update_evaluation(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateEvaluationRequest,
) -> Result<DbEvaluation, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    if req.is_empty() {
        return Err(CertificationError::Validation(
            "No field was provided for update".to_string(),
        ));
    }

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_evaluation(conn, id)?;
        let mut row = before.clone();

        if req.indicator_id.is_some() || req.audit_cycle_id.is_some() {
            let indicator_id = req.indicator_id.unwrap_or(row.indicator_id);
            let audit_cycle_id = req.audit_cycle_id.unwrap_or(row.audit_cycle_id);
            row.program_id = resolve_program(conn, indicator_id, audit_cycle_id)?;
            validate_same_program(before.program_id, row.program_id, "evaluation")?;
            ensure_pair_free(conn, indicator_id, audit_cycle_id, Some(id))?;
            row.indicator_id = indicator_id;
            row.audit_cycle_id = audit_cycle_id;
        }
        if let Some(status) = req.conformity_status {
            row.conformity_status = status.to_string();
        }
        if let Some(justification) = req.justification {
            row.justification = trimmed(justification);
        }

        let status = row.status()?;
        let active = count_active_actions(conn, id)?;
        validate_nonconformity_support(status, row.justification.as_deref(), active)?;

        row.updated_at = Utc::now();
        let saved: DbEvaluation = diesel::update(evaluations::table.find(id))
            .set(&row)
            .get_result(conn)?;
        if saved.audit_cycle_id != before.audit_cycle_id {
            move_dependents_to_cycle(conn, actor, &saved)?;
        }
        let action = AuditAction::for_update(&before.conformity_status, &saved.conformity_status);
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Evaluation, id, action)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn delete_evaluation(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_evaluation(conn, id)?;
        diesel::delete(evaluations::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Evaluation, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), Some(before.audit_cycle_id))
                .before(&before)?,
        )?;
        Ok(())
    })
}

pub fn get_evaluation_detail(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<EvaluationDetail, CertificationError> {
    let evaluation = find_evaluation(conn, id)?;
    let indicator = find_indicator(conn, evaluation.indicator_id)?;
    let criterion = find_criterion(conn, indicator.criterion_id)?;
    let principle = find_principle(conn, criterion.principle_id)?;

    let evidences = evidences::table
        .filter(evidences::evaluation_id.eq(id))
        .order(evidences::created_at.desc())
        .load::<DbEvidence>(conn)?;

    let mut actions_query = corrective_actions::table
        .filter(corrective_actions::evaluation_id.eq(id))
        .into_boxed();
    if actor.is_responsible() {
        actions_query =
            actions_query.filter(corrective_actions::responsible_id.eq(actor.user_id));
    }
    let corrective_actions = actions_query
        .order(corrective_actions::created_at.desc())
        .load::<DbCorrectiveAction>(conn)?;

    let logs = audit::list_entries(
        conn,
        &AuditFilter {
            program_id: Some(evaluation.program_id),
            audit_cycle_id: Some(evaluation.audit_cycle_id),
            limit: Some(DETAIL_LOG_LIMIT),
            ..Default::default()
        },
    )?;

    Ok(EvaluationDetail {
        evaluation,
        indicator,
        criterion,
        principle,
        evidences,
        corrective_actions,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_without_fields_is_empty() {
        assert!(UpdateEvaluationRequest::default().is_empty());

        let explicit_null: UpdateEvaluationRequest =
            serde_json::from_str(r#"{"justification": null}"#).expect("json");
        assert!(!explicit_null.is_empty());

        let status_only = UpdateEvaluationRequest {
            conformity_status: Some(ConformityStatus::NcMenor),
            ..Default::default()
        };
        assert!(!status_only.is_empty());
    }
}
