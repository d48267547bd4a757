//! Append-only audit trail. Rows are written through the caller's connection so
//! they commit or roll back together with the mutation they describe.

use anyhow::Result as AnyResult;
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::schema::audit_logs;

use super::error::CertificationError;
use super::storage::DbAuditLog;
use super::types::text_enum;

pub const DEFAULT_LOG_LIMIT: i64 = 200;
pub const MAX_LOG_LIMIT: i64 = 1000;

text_enum! {
    AuditAction {
        Create => "CREATE",
        Update => "UPDATE",
        Delete => "DELETE",
        StatusChange => "STATUS_CHANGE",
    }
}

impl AuditAction {
    /// STATUS_CHANGE iff the status value differs, otherwise UPDATE.
    pub fn for_update<S: PartialEq>(before: &S, after: &S) -> Self {
        if before != after {
            Self::StatusChange
        } else {
            Self::Update
        }
    }
}

text_enum! {
    EntityKind {
        CertificationProgram => "certification_program",
        Principle => "principle",
        Criterion => "criterion",
        Indicator => "indicator",
        AuditCycle => "audit_cycle",
        Evaluation => "evaluation",
        EvidenceType => "evidence_type",
        Evidence => "evidence",
        CorrectiveAction => "corrective_action",
        RootCauseAnalysis => "root_cause_analysis",
        EvidenceDocument => "evidence_document",
        CriterionMonitoring => "criterion_monitoring",
        MonitoringNotification => "monitoring_notification",
        NotificationResolution => "notification_resolution",
        SystemSettings => "system_settings",
    }
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub actor_id: Option<Uuid>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
}

impl AuditRecord {
    pub fn new(entity_kind: EntityKind, entity_id: Uuid, action: AuditAction) -> Self {
        Self {
            entity_kind,
            entity_id,
            action,
            actor_id: None,
            before: None,
            after: None,
            program_id: None,
            audit_cycle_id: None,
        }
    }

    pub fn by(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn before<T: Serialize>(mut self, row: &T) -> Result<Self, CertificationError> {
        self.before = Some(snapshot(row)?);
        Ok(self)
    }

    pub fn after<T: Serialize>(mut self, row: &T) -> Result<Self, CertificationError> {
        self.after = Some(snapshot(row)?);
        Ok(self)
    }

    pub fn in_context(mut self, program_id: Option<Uuid>, audit_cycle_id: Option<Uuid>) -> Self {
        self.program_id = program_id;
        self.audit_cycle_id = audit_cycle_id;
        self
    }
}

/// Full-row projection of a persisted entity.
pub fn snapshot<T: Serialize>(row: &T) -> Result<serde_json::Value, CertificationError> {
    serde_json::to_value(row)
        .map_err(|e| CertificationError::Internal(format!("Failed to snapshot row: {e}")))
}

pub fn record(
    conn: &mut PgConnection,
    entry: AuditRecord,
) -> Result<DbAuditLog, CertificationError> {
    let row = DbAuditLog {
        id: Uuid::new_v4(),
        entity_kind: entry.entity_kind.to_string(),
        entity_id: entry.entity_id,
        action: entry.action.to_string(),
        old_value: entry.before,
        new_value: entry.after,
        actor_id: entry.actor_id,
        program_id: entry.program_id,
        audit_cycle_id: entry.audit_cycle_id,
        created_at: Utc::now(),
    };

    let saved: DbAuditLog = diesel::insert_into(audit_logs::table)
        .values(&row)
        .get_result(conn)?;

    info!(
        "{} {} {} by {}",
        saved.action,
        saved.entity_kind,
        saved.entity_id,
        saved
            .actor_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "system".to_string())
    );
    Ok(saved)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub entity_kind: Option<EntityKind>,
    pub entity_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub limit: Option<i64>,
}

impl AuditFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT)
    }
}

/// Newest first.
pub fn list_entries(
    conn: &mut PgConnection,
    filter: &AuditFilter,
) -> Result<Vec<DbAuditLog>, CertificationError> {
    let mut query = audit_logs::table.into_boxed();

    if let Some(kind) = filter.entity_kind {
        query = query.filter(audit_logs::entity_kind.eq(kind.as_str()));
    }
    if let Some(entity_id) = filter.entity_id {
        query = query.filter(audit_logs::entity_id.eq(entity_id));
    }
    if let Some(program_id) = filter.program_id {
        query = query.filter(audit_logs::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = filter.audit_cycle_id {
        query = query.filter(audit_logs::audit_cycle_id.eq(audit_cycle_id));
    }

    let rows = query
        .order((audit_logs::created_at.desc(), audit_logs::id.desc()))
        .limit(filter.effective_limit())
        .load::<DbAuditLog>(conn)?;
    Ok(rows)
}

pub fn export_csv(entries: &[DbAuditLog]) -> AnyResult<Vec<u8>> {
    let mut csv_writer = csv::Writer::from_writer(vec![]);

    csv_writer.write_record([
        "ID",
        "Timestamp",
        "Entity",
        "Entity ID",
        "Action",
        "Actor",
        "Program",
        "Audit cycle",
        "Old value",
        "New value",
    ])?;

    for entry in entries {
        csv_writer.write_record([
            entry.id.to_string(),
            entry.created_at.to_rfc3339(),
            entry.entity_kind.clone(),
            entry.entity_id.to_string(),
            entry.action.clone(),
            entry.actor_id.map(|u| u.to_string()).unwrap_or_default(),
            entry.program_id.map(|u| u.to_string()).unwrap_or_default(),
            entry.audit_cycle_id.map(|u| u.to_string()).unwrap_or_default(),
            entry
                .old_value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            entry
                .new_value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        ])?;
    }

    Ok(csv_writer.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[derive(Serialize)]
    struct Row {
        id: u32,
        status: &'static str,
        note: Option<String>,
    }

    #[test]
    fn test_action_classification() {
        assert_eq!(
            AuditAction::for_update(&"nc_menor", &"nc_maior"),
            AuditAction::StatusChange
        );
        assert_eq!(
            AuditAction::for_update(&"conforme", &"conforme"),
            AuditAction::Update
        );
        assert_eq!(AuditAction::StatusChange.to_string(), "STATUS_CHANGE");
        assert_eq!(AuditAction::from_str("DELETE"), Ok(AuditAction::Delete));
    }

    #[test]
    fn test_snapshot_keeps_every_column() {
        let value = snapshot(&Row {
            id: 7,
            status: "aberta",
            note: None,
        })
        .expect("snapshot");
        let object = value.as_object().expect("object");
        assert_eq!(object.len(), 3);
        assert_eq!(object["id"], 7);
        assert_eq!(object["status"], "aberta");
        assert!(object["note"].is_null());
    }

    #[test]
    fn test_record_builder() {
        let entity_id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let program = Uuid::new_v4();
        let entry = AuditRecord::new(EntityKind::Evaluation, entity_id, AuditAction::Create)
            .by(actor)
            .in_context(Some(program), None)
            .after(&Row {
                id: 1,
                status: "conforme",
                note: None,
            })
            .expect("after");
        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.program_id, Some(program));
        assert!(entry.before.is_none());
        assert!(entry.after.is_some());
    }

    #[test]
    fn test_filter_limit_is_clamped() {
        assert_eq!(AuditFilter::default().effective_limit(), DEFAULT_LOG_LIMIT);
        let huge = AuditFilter {
            limit: Some(50_000),
            ..Default::default()
        };
        assert_eq!(huge.effective_limit(), MAX_LOG_LIMIT);
        let zero = AuditFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.effective_limit(), 1);
    }

    #[test]
    fn test_export_csv_header_and_rows() {
        let entry = DbAuditLog {
            id: Uuid::new_v4(),
            entity_kind: "evaluation".to_string(),
            entity_id: Uuid::new_v4(),
            action: "CREATE".to_string(),
            old_value: None,
            new_value: Some(serde_json::json!({"conformity_status": "conforme"})),
            actor_id: None,
            program_id: None,
            audit_cycle_id: None,
            created_at: Utc::now(),
        };
        let bytes = export_csv(&[entry]).expect("csv");
        let text = String::from_utf8(bytes).expect("utf8");
        let mut lines = text.lines();
        assert!(lines.next().expect("header").starts_with("ID,Timestamp,Entity"));
        let row = lines.next().expect("row");
        assert!(row.contains("evaluation"));
        assert!(row.contains("CREATE"));
    }
}
