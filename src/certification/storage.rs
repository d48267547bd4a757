use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::schema::{
    audit_cycles, audit_logs, certification_programs, corrective_actions, criteria,
    criterion_monitorings, evaluations, evidence_documents, evidence_types, evidences,
    indicators, monitoring_notifications, notification_resolutions, principles,
    root_cause_analyses,
};

use super::error::CertificationError;
use super::types::{
    ActionStatus, AnalysisStatus, ConformityStatus, DocumentStatus, MonitoringStatus,
    NotificationStatus,
};
use super::validation::IndicatorScope;

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = certification_programs, treat_none_as_null = true)]
pub struct DbProgram {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = principles, treat_none_as_null = true)]
pub struct DbPrinciple {
    pub id: Uuid,
    pub program_id: Uuid,
    pub code: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = criteria, treat_none_as_null = true)]
pub struct DbCriterion {
    pub id: Uuid,
    pub program_id: Uuid,
    pub principle_id: Uuid,
    pub code: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = indicators, treat_none_as_null = true)]
pub struct DbIndicator {
    pub id: Uuid,
    pub program_id: Uuid,
    pub criterion_id: Uuid,
    pub code: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbIndicator {
    pub fn scope(&self) -> IndicatorScope {
        IndicatorScope {
            program_id: self.program_id,
            criterion_id: self.criterion_id,
            indicator_id: self.id,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = audit_cycles, treat_none_as_null = true)]
pub struct DbAuditCycle {
    pub id: Uuid,
    pub program_id: Uuid,
    pub year: i32,
    pub audit_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub certifying_body: Option<String>,
    pub scope: Option<String>,
    pub standard_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = evaluations, treat_none_as_null = true)]
pub struct DbEvaluation {
    pub id: Uuid,
    pub program_id: Uuid,
    pub indicator_id: Uuid,
    pub audit_cycle_id: Uuid,
    pub conformity_status: String,
    pub justification: Option<String>,
    pub assessed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbEvaluation {
    pub fn status(&self) -> Result<ConformityStatus, CertificationError> {
        self.conformity_status
            .parse()
            .map_err(CertificationError::Internal)
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = evidence_types, treat_none_as_null = true)]
pub struct DbEvidenceType {
    pub id: Uuid,
    pub program_id: Option<Uuid>,
    pub criterion_id: Option<Uuid>,
    pub indicator_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub conformity_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = evidences, treat_none_as_null = true)]
pub struct DbEvidence {
    pub id: Uuid,
    pub program_id: Uuid,
    pub evaluation_id: Uuid,
    pub evidence_type_id: Option<Uuid>,
    pub kind: String,
    pub location: String,
    pub non_conforming: bool,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = corrective_actions, treat_none_as_null = true)]
pub struct DbCorrectiveAction {
    pub id: Uuid,
    pub program_id: Uuid,
    pub evaluation_id: Uuid,
    pub title: String,
    pub standard: Option<String>,
    pub description: Option<String>,
    pub responsible_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCorrectiveAction {
    pub fn action_status(&self) -> Result<ActionStatus, CertificationError> {
        self.status.parse().map_err(CertificationError::Internal)
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = root_cause_analyses, treat_none_as_null = true)]
pub struct DbRootCauseAnalysis {
    pub id: Uuid,
    pub program_id: Uuid,
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
    pub status: String,
    pub responsible_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbRootCauseAnalysis {
    pub fn analysis_status(&self) -> Result<AnalysisStatus, CertificationError> {
        self.status.parse().map_err(CertificationError::Internal)
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = evidence_documents, treat_none_as_null = true)]
pub struct DbEvidenceDocument {
    pub id: Uuid,
    pub program_id: Uuid,
    pub audit_cycle_id: Uuid,
    pub evidence_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub version: i32,
    pub status: String,
    pub review_notes: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub responsible_id: Option<Uuid>,
    pub reviewed_by_id: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbEvidenceDocument {
    pub fn document_status(&self) -> Result<DocumentStatus, CertificationError> {
        self.status.parse().map_err(CertificationError::Internal)
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = criterion_monitorings, treat_none_as_null = true)]
pub struct DbCriterionMonitoring {
    pub id: Uuid,
    pub program_id: Uuid,
    pub audit_cycle_id: Uuid,
    pub criterion_id: Uuid,
    pub reference_month: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCriterionMonitoring {
    pub fn monitoring_status(&self) -> Result<MonitoringStatus, CertificationError> {
        self.status.parse().map_err(CertificationError::Internal)
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = monitoring_notifications, treat_none_as_null = true)]
pub struct DbMonitoringNotification {
    pub id: Uuid,
    pub program_id: Uuid,
    pub audit_cycle_id: Uuid,
    pub criterion_id: Uuid,
    pub monitoring_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub status: String,
    pub responsible_id: Option<Uuid>,
    pub deadline: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbMonitoringNotification {
    pub fn notification_status(&self) -> Result<NotificationStatus, CertificationError> {
        self.status.parse().map_err(CertificationError::Internal)
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = notification_resolutions, treat_none_as_null = true)]
pub struct DbNotificationResolution {
    pub id: Uuid,
    pub program_id: Uuid,
    pub notification_id: Uuid,
    pub description: String,
    pub outcome: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = audit_logs)]
pub struct DbAuditLog {
    pub id: Uuid,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub action: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub actor_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub fn find_program(conn: &mut PgConnection, id: Uuid) -> Result<DbProgram, CertificationError> {
    certification_programs::table
        .find(id)
        .first::<DbProgram>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Certification program"))
}

pub fn find_principle(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbPrinciple, CertificationError> {
    principles::table
        .find(id)
        .first::<DbPrinciple>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Principle"))
}

pub fn find_criterion(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbCriterion, CertificationError> {
    criteria::table
        .find(id)
        .first::<DbCriterion>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Criterion"))
}

pub fn find_indicator(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbIndicator, CertificationError> {
    indicators::table
        .find(id)
        .first::<DbIndicator>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Indicator"))
}

pub fn find_audit_cycle(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbAuditCycle, CertificationError> {
    audit_cycles::table
        .find(id)
        .first::<DbAuditCycle>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Audit cycle"))
}

pub fn find_evaluation(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbEvaluation, CertificationError> {
    evaluations::table
        .find(id)
        .first::<DbEvaluation>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Evaluation"))
}

pub fn find_evidence_type(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbEvidenceType, CertificationError> {
    evidence_types::table
        .find(id)
        .first::<DbEvidenceType>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Evidence type"))
}

pub fn find_evidence(conn: &mut PgConnection, id: Uuid) -> Result<DbEvidence, CertificationError> {
    evidences::table
        .find(id)
        .first::<DbEvidence>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Evidence"))
}

pub fn find_corrective_action(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbCorrectiveAction, CertificationError> {
    corrective_actions::table
        .find(id)
        .first::<DbCorrectiveAction>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Corrective action"))
}

pub fn find_analysis(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbRootCauseAnalysis, CertificationError> {
    root_cause_analyses::table
        .find(id)
        .first::<DbRootCauseAnalysis>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Root cause analysis"))
}

pub fn find_document(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbEvidenceDocument, CertificationError> {
    evidence_documents::table
        .find(id)
        .first::<DbEvidenceDocument>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Evidence document"))
}

pub fn find_monitoring(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbCriterionMonitoring, CertificationError> {
    criterion_monitorings::table
        .find(id)
        .first::<DbCriterionMonitoring>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Criterion monitoring"))
}

pub fn find_notification(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbMonitoringNotification, CertificationError> {
    monitoring_notifications::table
        .find(id)
        .first::<DbMonitoringNotification>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Monitoring notification"))
}

pub fn find_resolution(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbNotificationResolution, CertificationError> {
    notification_resolutions::table
        .find(id)
        .first::<DbNotificationResolution>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("Notification resolution"))
}

/// Active corrective actions linked to an evaluation, as seen by the current
/// transaction.
pub fn count_active_actions(
    conn: &mut PgConnection,
    evaluation_id: Uuid,
) -> Result<i64, CertificationError> {
    let count = corrective_actions::table
        .filter(corrective_actions::evaluation_id.eq(evaluation_id))
        .filter(corrective_actions::status.eq_any(ActionStatus::active_values()))
        .count()
        .get_result(conn)?;
    Ok(count)
}
