use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::shared::schema::root_cause_analyses;
use crate::core::shared::utils::trimmed;

use super::audit::{self, AuditAction, AuditFilter, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, COMPLIANCE_WRITERS};
use super::rules::validate_analysis_completion;
use super::storage::{
    find_analysis, find_corrective_action, find_evaluation, DbAuditLog, DbEvaluation,
    DbRootCauseAnalysis,
};
use super::types::{deserialize_some, AnalysisStatus};
use super::validation::{require_text, validate_same_program};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnalysisRequest {
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Uuid,
    pub evaluation_id: Uuid,
    pub corrective_action_id: Option<Uuid>,
    pub problem_title: String,
    pub context: Option<String>,
    pub why_1: Option<String>,
    pub why_2: Option<String>,
    pub why_3: Option<String>,
    pub why_4: Option<String>,
    pub why_5: Option<String>,
    pub root_cause: Option<String>,
    pub corrective_action_plan: Option<String>,
    pub swot_strengths: Option<String>,
    pub swot_weaknesses: Option<String>,
    pub swot_opportunities: Option<String>,
    pub swot_threats: Option<String>,
    #[serde(default)]
    pub status: AnalysisStatus,
    pub responsible_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnalysisRequest {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub corrective_action_id: Option<Option<Uuid>>,
    pub problem_title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub context: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub why_1: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub why_2: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub why_3: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub why_4: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub why_5: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub root_cause: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub corrective_action_plan: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub swot_strengths: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub swot_weaknesses: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub swot_opportunities: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub swot_threats: Option<Option<String>>,
    pub status: Option<AnalysisStatus>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub responsible_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisStatusRequest {
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisQuery {
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub evaluation_id: Option<Uuid>,
    pub status: Option<AnalysisStatus>,
}

fn validate_evaluation_context(
    evaluation: &DbEvaluation,
    program_id: Option<Uuid>,
    audit_cycle_id: Uuid,
) -> Result<(), CertificationError> {
    if let Some(program_id) = program_id {
        validate_same_program(program_id, evaluation.program_id, "analysis/evaluation")?;
    }
    if evaluation.audit_cycle_id != audit_cycle_id {
        return Err(CertificationError::Validation(
            "Evaluation does not belong to the given audit cycle".to_string(),
        ));
    }
    Ok(())
}

fn validate_linked_action(
    conn: &mut PgConnection,
    evaluation_id: Uuid,
    corrective_action_id: Option<Uuid>,
) -> Result<(), CertificationError> {
    let Some(action_id) = corrective_action_id else {
        return Ok(());
    };
    let action = find_corrective_action(conn, action_id)?;
    if action.evaluation_id != evaluation_id {
        return Err(CertificationError::Validation(
            "Corrective action belongs to another evaluation".to_string(),
        ));
    }
    Ok(())
}

fn check_completion(row: &DbRootCauseAnalysis) -> Result<(), CertificationError> {
    validate_analysis_completion(
        row.analysis_status()?,
        row.root_cause.as_deref(),
        row.corrective_action_plan.as_deref(),
    )
}

pub fn list_analyses(
    conn: &mut PgConnection,
    query: &AnalysisQuery,
) -> Result<Vec<DbRootCauseAnalysis>, CertificationError> {
    let mut db_query = root_cause_analyses::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(root_cause_analyses::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = query.audit_cycle_id {
        db_query = db_query.filter(root_cause_analyses::audit_cycle_id.eq(audit_cycle_id));
    }
    if let Some(evaluation_id) = query.evaluation_id {
        db_query = db_query.filter(root_cause_analyses::evaluation_id.eq(evaluation_id));
    }
    if let Some(status) = query.status {
        db_query = db_query.filter(root_cause_analyses::status.eq(status.as_str()));
    }
    let rows = db_query
        .order(root_cause_analyses::updated_at.desc())
        .load::<DbRootCauseAnalysis>(conn)?;
    Ok(rows)
}

pub fn get_analysis(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbRootCauseAnalysis, CertificationError> {
    find_analysis(conn, id)
}

pub fn analysis_history(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Vec<DbAuditLog>, CertificationError> {
    find_analysis(conn, id)?;
    audit::list_entries(
        conn,
        &AuditFilter {
            entity_kind: Some(EntityKind::RootCauseAnalysis),
            entity_id: Some(id),
            ..Default::default()
        },
    )
}

pub fn create_analysis(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateAnalysisRequest,
) -> Result<DbRootCauseAnalysis, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    let problem_title = require_text(&req.problem_title, "problem_title")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let evaluation = find_evaluation(conn, req.evaluation_id)?;
        validate_evaluation_context(&evaluation, req.program_id, req.audit_cycle_id)?;
        validate_linked_action(conn, evaluation.id, req.corrective_action_id)?;

        let now = Utc::now();
        let row = DbRootCauseAnalysis {
            id: Uuid::new_v4(),
            program_id: evaluation.program_id,
            audit_cycle_id: evaluation.audit_cycle_id,
            evaluation_id: evaluation.id,
            corrective_action_id: req.corrective_action_id,
            problem_title,
            context: trimmed(req.context),
            why_1: trimmed(req.why_1),
            why_2: trimmed(req.why_2),
            why_3: trimmed(req.why_3),
            why_4: trimmed(req.why_4),
            why_5: trimmed(req.why_5),
            root_cause: trimmed(req.root_cause),
            corrective_action_plan: trimmed(req.corrective_action_plan),
            swot_strengths: trimmed(req.swot_strengths),
            swot_weaknesses: trimmed(req.swot_weaknesses),
            swot_opportunities: trimmed(req.swot_opportunities),
            swot_threats: trimmed(req.swot_threats),
            status: req.status.to_string(),
            responsible_id: req.responsible_id,
            created_by: Some(actor.user_id),
            created_at: now,
            updated_at: now,
        };
        check_completion(&row)?;

        let saved: DbRootCauseAnalysis = diesel::insert_into(root_cause_analyses::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::RootCauseAnalysis, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

fn save_analysis(
    conn: &mut PgConnection,
    actor: &Actor,
    before: &DbRootCauseAnalysis,
    mut row: DbRootCauseAnalysis,
) -> Result<DbRootCauseAnalysis, CertificationError> {
    check_completion(&row)?;
    row.updated_at = Utc::now();
    let saved: DbRootCauseAnalysis = diesel::update(root_cause_analyses::table.find(row.id))
        .set(&row)
        .get_result(conn)?;
    let action = AuditAction::for_update(&before.status, &saved.status);
    audit::record(
        conn,
        AuditRecord::new(EntityKind::RootCauseAnalysis, saved.id, action)
            .by(actor.user_id)
            .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
            .before(before)?
            .after(&saved)?,
    )?;
    Ok(saved)
}

pub fn update_analysis(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateAnalysisRequest,
) -> Result<DbRootCauseAnalysis, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_analysis(conn, id)?;
        let mut row = before.clone();

        if let Some(corrective_action_id) = req.corrective_action_id {
            validate_linked_action(conn, row.evaluation_id, corrective_action_id)?;
            row.corrective_action_id = corrective_action_id;
        }
        if let Some(title) = &req.problem_title {
            row.problem_title = require_text(title, "problem_title")?;
        }
        let text_fields = [
            (req.context, &mut row.context),
            (req.why_1, &mut row.why_1),
            (req.why_2, &mut row.why_2),
            (req.why_3, &mut row.why_3),
            (req.why_4, &mut row.why_4),
            (req.why_5, &mut row.why_5),
            (req.root_cause, &mut row.root_cause),
            (req.corrective_action_plan, &mut row.corrective_action_plan),
            (req.swot_strengths, &mut row.swot_strengths),
            (req.swot_weaknesses, &mut row.swot_weaknesses),
            (req.swot_opportunities, &mut row.swot_opportunities),
            (req.swot_threats, &mut row.swot_threats),
        ];
        for (incoming, slot) in text_fields {
            if let Some(value) = incoming {
                *slot = trimmed(value);
            }
        }
        if let Some(status) = req.status {
            row.status = status.to_string();
        }
        if let Some(responsible_id) = req.responsible_id {
            row.responsible_id = responsible_id;
        }

        save_analysis(conn, actor, &before, row)
    })
}

pub fn change_analysis_status(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: AnalysisStatusRequest,
) -> Result<DbRootCauseAnalysis, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_analysis(conn, id)?;
        let mut row = before.clone();
        row.status = req.status.to_string();
        save_analysis(conn, actor, &before, row)
    })
}

pub fn delete_analysis(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_analysis(conn, id)?;
        diesel::delete(root_cause_analyses::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::RootCauseAnalysis, id, AuditAction::Delete)
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

    fn evaluation(program_id: Uuid, audit_cycle_id: Uuid) -> DbEvaluation {
        let now = Utc::now();
        DbEvaluation {
            id: Uuid::new_v4(),
            program_id,
            indicator_id: Uuid::new_v4(),
            audit_cycle_id,
            conformity_status: "nc_menor".to_string(),
            justification: None,
            assessed_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_evaluation_context_must_match_cycle() {
        let program = Uuid::new_v4();
        let cycle = Uuid::new_v4();
        let eval = evaluation(program, cycle);
        assert!(validate_evaluation_context(&eval, Some(program), cycle).is_ok());
        assert!(validate_evaluation_context(&eval, None, cycle).is_ok());
        assert!(matches!(
            validate_evaluation_context(&eval, None, Uuid::new_v4()),
            Err(CertificationError::Validation(_))
        ));
        assert!(matches!(
            validate_evaluation_context(&eval, Some(Uuid::new_v4()), cycle),
            Err(CertificationError::InconsistentProgram(_))
        ));
    }

    #[test]
    fn test_update_request_distinguishes_cleared_fields() {
        let req: UpdateAnalysisRequest =
            serde_json::from_str(r#"{"root_cause": null, "why_2": "Supplier late"}"#)
                .expect("request");
        assert_eq!(req.root_cause, Some(None));
        assert_eq!(req.why_2, Some(Some("Supplier late".to_string())));
        assert_eq!(req.why_1, None);
    }
}
