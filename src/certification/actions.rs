use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::shared::schema::{corrective_actions, evaluations, users};
use crate::core::shared::utils::trimmed;

use super::audit::{self, AuditAction, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, CorrectiveActionField, ALL_ROLES, COMPLIANCE_WRITERS};
use super::rules::validate_post_mutation_invariant;
use super::storage::{find_corrective_action, find_evaluation, DbCorrectiveAction};
use super::types::{deserialize_some, ActionStatus, Priority};
use super::validation::{
    normalize_optional_date_pair, require_text, validate_date_order,
    validate_schedule_requirement,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCorrectiveActionRequest {
    pub evaluation_id: Uuid,
    pub title: String,
    pub standard: Option<String>,
    pub description: Option<String>,
    pub responsible_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCorrectiveActionRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub standard: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub responsible_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<NaiveDate>>,
    pub status: Option<ActionStatus>,
    pub priority: Option<Priority>,
}

impl UpdateCorrectiveActionRequest {
    pub fn touched_fields(&self) -> Vec<CorrectiveActionField> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push(CorrectiveActionField::Title);
        }
        if self.standard.is_some() {
            fields.push(CorrectiveActionField::Standard);
        }
        if self.description.is_some() {
            fields.push(CorrectiveActionField::Description);
        }
        if self.responsible_id.is_some() {
            fields.push(CorrectiveActionField::ResponsibleId);
        }
        if self.start_date.is_some() {
            fields.push(CorrectiveActionField::StartDate);
        }
        if self.due_date.is_some() {
            fields.push(CorrectiveActionField::DueDate);
        }
        if self.status.is_some() {
            fields.push(CorrectiveActionField::Status);
        }
        if self.priority.is_some() {
            fields.push(CorrectiveActionField::Priority);
        }
        fields
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorrectiveActionQuery {
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub evaluation_id: Option<Uuid>,
    pub status: Option<ActionStatus>,
    pub responsible_id: Option<Uuid>,
    #[serde(default)]
    pub overdue: bool,
}

fn ensure_user_exists(conn: &mut PgConnection, user_id: Uuid) -> Result<(), CertificationError> {
    let found: i64 = users::table
        .filter(users::id.eq(user_id))
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(CertificationError::not_found("Responsible user"));
    }
    Ok(())
}

fn ensure_visible(actor: &Actor, action: &DbCorrectiveAction) -> Result<(), CertificationError> {
    if actor.is_responsible() && action.responsible_id != Some(actor.user_id) {
        return Err(CertificationError::Permission(
            "Corrective action is not assigned to you".to_string(),
        ));
    }
    Ok(())
}

pub fn list_corrective_actions(
    conn: &mut PgConnection,
    actor: &Actor,
    query: &CorrectiveActionQuery,
) -> Result<Vec<DbCorrectiveAction>, CertificationError> {
    list_corrective_actions_on(conn, actor, query, Utc::now().date_naive())
}

/// Listing with an explicit "today" for the overdue filter.
pub fn list_corrective_actions_on(
    conn: &mut PgConnection,
    actor: &Actor,
    query: &CorrectiveActionQuery,
    today: NaiveDate,
) -> Result<Vec<DbCorrectiveAction>, CertificationError> {
    let mut db_query = corrective_actions::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(corrective_actions::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = query.audit_cycle_id {
        let in_cycle = evaluations::table
            .filter(evaluations::audit_cycle_id.eq(audit_cycle_id))
            .select(evaluations::id);
        db_query = db_query.filter(corrective_actions::evaluation_id.eq_any(in_cycle));
    }
    if let Some(evaluation_id) = query.evaluation_id {
        db_query = db_query.filter(corrective_actions::evaluation_id.eq(evaluation_id));
    }
    if let Some(status) = query.status {
        db_query = db_query.filter(corrective_actions::status.eq(status.as_str()));
    }
    if let Some(responsible_id) = query.responsible_id {
        db_query = db_query.filter(corrective_actions::responsible_id.eq(responsible_id));
    }
    if actor.is_responsible() {
        db_query = db_query.filter(corrective_actions::responsible_id.eq(actor.user_id));
    }
    if query.overdue {
        db_query = db_query
            .filter(corrective_actions::due_date.lt(today))
            .filter(corrective_actions::status.ne(ActionStatus::Concluida.as_str()));
    }
    let rows = db_query
        .order((
            corrective_actions::start_date.asc().nulls_last(),
            corrective_actions::due_date.asc().nulls_last(),
            corrective_actions::created_at.desc(),
        ))
        .load::<DbCorrectiveAction>(conn)?;
    Ok(rows)
}

pub fn get_corrective_action(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<DbCorrectiveAction, CertificationError> {
    let action = find_corrective_action(conn, id)?;
    ensure_visible(actor, &action)?;
    Ok(action)
}

pub fn create_corrective_action(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateCorrectiveActionRequest,
) -> Result<DbCorrectiveAction, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    let title = require_text(&req.title, "title")?;
    let (start_date, due_date) = normalize_optional_date_pair(req.start_date, req.due_date);
    validate_date_order(start_date, due_date, "corrective action")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let evaluation = find_evaluation(conn, req.evaluation_id)?;
        if let Some(responsible_id) = req.responsible_id {
            ensure_user_exists(conn, responsible_id)?;
        }
        validate_schedule_requirement(evaluation.status()?, start_date, due_date)?;

        let now = Utc::now();
        let row = DbCorrectiveAction {
            id: Uuid::new_v4(),
            program_id: evaluation.program_id,
            evaluation_id: evaluation.id,
            title,
            standard: trimmed(req.standard),
            description: trimmed(req.description),
            responsible_id: req.responsible_id,
            start_date,
            due_date,
            status: req.status.to_string(),
            priority: req.priority.to_string(),
            created_at: now,
            updated_at: now,
        };
        let saved: DbCorrectiveAction = diesel::insert_into(corrective_actions::table)
            .values(&row)
            .get_result(conn)?;
        validate_post_mutation_invariant(conn, &evaluation)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CorrectiveAction, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(evaluation.audit_cycle_id))
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

/// Full update. Only compliance writers may use it.
pub fn replace_corrective_action(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateCorrectiveActionRequest,
) -> Result<DbCorrectiveAction, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    patch_corrective_action(conn, actor, id, req)
}

/// Partial update. Each role is limited to its allowlisted fields, and a
/// RESPONSIBLE caller only to actions assigned to them.
pub fn patch_corrective_action(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateCorrectiveActionRequest,
) -> Result<DbCorrectiveAction, CertificationError> {
    actor.require_any(ALL_ROLES)?;
    let touched = req.touched_fields();
    if touched.is_empty() {
        return Err(CertificationError::Validation(
            "No field was supplied for update".to_string(),
        ));
    }
    actor.ensure_action_fields(&touched)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_corrective_action(conn, id)?;
        ensure_visible(actor, &before)?;
        let evaluation = find_evaluation(conn, before.evaluation_id)?;
        let mut row = before.clone();

        if let Some(title) = &req.title {
            row.title = require_text(title, "title")?;
        }
        if let Some(standard) = req.standard {
            row.standard = trimmed(standard);
        }
        if let Some(description) = req.description {
            row.description = trimmed(description);
        }
        if let Some(responsible_id) = req.responsible_id {
            if let Some(user_id) = responsible_id {
                ensure_user_exists(conn, user_id)?;
            }
            row.responsible_id = responsible_id;
        }
        let start_date = req.start_date.unwrap_or(row.start_date);
        let due_date = req.due_date.unwrap_or(row.due_date);
        let (start_date, due_date) = normalize_optional_date_pair(start_date, due_date);
        validate_date_order(start_date, due_date, "corrective action")?;
        validate_schedule_requirement(evaluation.status()?, start_date, due_date)?;
        row.start_date = start_date;
        row.due_date = due_date;
        if let Some(status) = req.status {
            row.status = status.to_string();
        }
        if let Some(priority) = req.priority {
            row.priority = priority.to_string();
        }
        row.updated_at = Utc::now();

        let saved: DbCorrectiveAction = diesel::update(corrective_actions::table.find(id))
            .set(&row)
            .get_result(conn)?;
        validate_post_mutation_invariant(conn, &evaluation)?;
        let action = AuditAction::for_update(&before.status, &saved.status);
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CorrectiveAction, id, action)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(evaluation.audit_cycle_id))
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn delete_corrective_action(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_corrective_action(conn, id)?;
        let evaluation = find_evaluation(conn, before.evaluation_id)?;
        diesel::delete(corrective_actions::table.find(id)).execute(conn)?;
        validate_post_mutation_invariant(conn, &evaluation)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CorrectiveAction, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), Some(evaluation.audit_cycle_id))
                .before(&before)?,
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certification::permissions::Role;

    #[test]
    fn test_touched_fields_follow_payload() {
        let patch: UpdateCorrectiveActionRequest =
            serde_json::from_str(r#"{"status": "em_andamento", "due_date": null}"#)
                .expect("patch");
        assert_eq!(
            patch.touched_fields(),
            vec![CorrectiveActionField::DueDate, CorrectiveActionField::Status]
        );
        assert!(UpdateCorrectiveActionRequest::default()
            .touched_fields()
            .is_empty());
    }

    #[test]
    fn test_responsible_patch_outside_allowlist_is_denied() {
        let patch: UpdateCorrectiveActionRequest =
            serde_json::from_str(r#"{"start_date": "2026-03-01"}"#).expect("patch");
        let actor = Actor::new(Uuid::new_v4(), Role::Responsible);
        assert!(matches!(
            actor.ensure_action_fields(&patch.touched_fields()),
            Err(CertificationError::Permission(_))
        ));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateCorrectiveActionRequest = serde_json::from_str(&format!(
            r#"{{"evaluation_id": "{}", "title": "Fix", "start_date": "2026-03-01"}}"#,
            Uuid::new_v4()
        ))
        .expect("request");
        assert_eq!(req.status, ActionStatus::Aberta);
        assert_eq!(req.priority, Priority::Media);
        let (start, due) = normalize_optional_date_pair(req.start_date, req.due_date);
        assert_eq!(start, due);
    }
}
