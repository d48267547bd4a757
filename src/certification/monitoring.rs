//! Monthly criterion health tracking and the notifications it raises.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::shared::schema::{
    criterion_monitorings, monitoring_notifications, notification_resolutions,
};
use crate::core::shared::utils::trimmed;

use super::audit::{self, AuditAction, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, COMPLIANCE_WRITERS};
use super::storage::{
    find_audit_cycle, find_criterion, find_monitoring, find_notification, find_resolution,
    DbCriterionMonitoring, DbMonitoringNotification, DbNotificationResolution,
};
use super::types::{deserialize_some, MonitoringStatus, NotificationStatus, Priority};
use super::validation::{first_day_of_month, require_text, validate_same_program};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMonitoringRequest {
    pub audit_cycle_id: Uuid,
    pub criterion_id: Uuid,
    pub reference_month: NaiveDate,
    #[serde(default)]
    pub status: MonitoringStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMonitoringRequest {
    pub reference_month: Option<NaiveDate>,
    pub status: Option<MonitoringStatus>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitoringQuery {
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub criterion_id: Option<Uuid>,
    pub status: Option<MonitoringStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotificationRequest {
    pub monitoring_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Priority,
    pub responsible_id: Option<Uuid>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNotificationRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    pub severity: Option<Priority>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub responsible_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub deadline: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationStatusRequest {
    pub status: NotificationStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub program_id: Option<Uuid>,
    pub audit_cycle_id: Option<Uuid>,
    pub monitoring_id: Option<Uuid>,
    pub status: Option<NotificationStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResolutionRequest {
    pub notification_id: Uuid,
    pub description: String,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolutionQuery {
    pub notification_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
}

pub fn validate_deadline(
    deadline: Option<NaiveDate>,
    created_on: NaiveDate,
) -> Result<(), CertificationError> {
    if let Some(deadline) = deadline {
        if deadline < created_on {
            return Err(CertificationError::InvalidDateRange(format!(
                "Notification deadline {deadline} is before its creation day {created_on}"
            )));
        }
    }
    Ok(())
}

fn ensure_month_free(
    conn: &mut PgConnection,
    row: &DbCriterionMonitoring,
) -> Result<(), CertificationError> {
    let taken: i64 = criterion_monitorings::table
        .filter(criterion_monitorings::audit_cycle_id.eq(row.audit_cycle_id))
        .filter(criterion_monitorings::criterion_id.eq(row.criterion_id))
        .filter(criterion_monitorings::reference_month.eq(row.reference_month))
        .filter(criterion_monitorings::id.ne(row.id))
        .count()
        .get_result(conn)?;
    if taken > 0 {
        return Err(CertificationError::Duplicate(format!(
            "Criterion already monitored for {}",
            row.reference_month.format("%Y-%m")
        )));
    }
    Ok(())
}

pub fn list_monitorings(
    conn: &mut PgConnection,
    query: &MonitoringQuery,
) -> Result<Vec<DbCriterionMonitoring>, CertificationError> {
    let mut db_query = criterion_monitorings::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(criterion_monitorings::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = query.audit_cycle_id {
        db_query = db_query.filter(criterion_monitorings::audit_cycle_id.eq(audit_cycle_id));
    }
    if let Some(criterion_id) = query.criterion_id {
        db_query = db_query.filter(criterion_monitorings::criterion_id.eq(criterion_id));
    }
    if let Some(status) = query.status {
        db_query = db_query.filter(criterion_monitorings::status.eq(status.as_str()));
    }
    let rows = db_query
        .order((
            criterion_monitorings::reference_month.desc(),
            criterion_monitorings::created_at.desc(),
        ))
        .load::<DbCriterionMonitoring>(conn)?;
    Ok(rows)
}

pub fn get_monitoring(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbCriterionMonitoring, CertificationError> {
    find_monitoring(conn, id)
}

pub fn create_monitoring(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateMonitoringRequest,
) -> Result<DbCriterionMonitoring, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let cycle = find_audit_cycle(conn, req.audit_cycle_id)?;
        let criterion = find_criterion(conn, req.criterion_id)?;
        validate_same_program(criterion.program_id, cycle.program_id, "monitoring/audit cycle")?;

        let now = Utc::now();
        let row = DbCriterionMonitoring {
            id: Uuid::new_v4(),
            program_id: cycle.program_id,
            audit_cycle_id: cycle.id,
            criterion_id: criterion.id,
            reference_month: first_day_of_month(req.reference_month),
            status: req.status.to_string(),
            notes: trimmed(req.notes),
            created_by: Some(actor.user_id),
            created_at: now,
            updated_at: now,
        };
        ensure_month_free(conn, &row)?;

        let saved: DbCriterionMonitoring = diesel::insert_into(criterion_monitorings::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CriterionMonitoring, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn update_monitoring(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateMonitoringRequest,
) -> Result<DbCriterionMonitoring, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_monitoring(conn, id)?;
        let mut row = before.clone();
        if let Some(month) = req.reference_month {
            row.reference_month = first_day_of_month(month);
            ensure_month_free(conn, &row)?;
        }
        if let Some(status) = req.status {
            row.status = status.to_string();
        }
        if let Some(notes) = req.notes {
            row.notes = trimmed(notes);
        }
        row.updated_at = Utc::now();

        let saved: DbCriterionMonitoring = diesel::update(criterion_monitorings::table.find(id))
            .set(&row)
            .get_result(conn)?;
        let action = AuditAction::for_update(&before.status, &saved.status);
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CriterionMonitoring, id, action)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn delete_monitoring(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_monitoring(conn, id)?;
        diesel::delete(criterion_monitorings::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CriterionMonitoring, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), Some(before.audit_cycle_id))
                .before(&before)?,
        )?;
        Ok(())
    })
}

pub fn list_notifications(
    conn: &mut PgConnection,
    query: &NotificationQuery,
) -> Result<Vec<DbMonitoringNotification>, CertificationError> {
    let mut db_query = monitoring_notifications::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(monitoring_notifications::program_id.eq(program_id));
    }
    if let Some(audit_cycle_id) = query.audit_cycle_id {
        db_query = db_query.filter(monitoring_notifications::audit_cycle_id.eq(audit_cycle_id));
    }
    if let Some(monitoring_id) = query.monitoring_id {
        db_query = db_query.filter(monitoring_notifications::monitoring_id.eq(monitoring_id));
    }
    if let Some(status) = query.status {
        db_query = db_query.filter(monitoring_notifications::status.eq(status.as_str()));
    }
    let rows = db_query
        .order((
            monitoring_notifications::deadline.asc().nulls_last(),
            monitoring_notifications::created_at.desc(),
        ))
        .load::<DbMonitoringNotification>(conn)?;
    Ok(rows)
}

pub fn get_notification(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbMonitoringNotification, CertificationError> {
    find_notification(conn, id)
}

pub fn create_notification(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateNotificationRequest,
) -> Result<DbMonitoringNotification, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    let title = require_text(&req.title, "title")?;
    let now = Utc::now();
    validate_deadline(req.deadline, now.date_naive())?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let monitoring = find_monitoring(conn, req.monitoring_id)?;
        let row = DbMonitoringNotification {
            id: Uuid::new_v4(),
            program_id: monitoring.program_id,
            audit_cycle_id: monitoring.audit_cycle_id,
            criterion_id: monitoring.criterion_id,
            monitoring_id: monitoring.id,
            title,
            description: trimmed(req.description),
            severity: req.severity.to_string(),
            status: NotificationStatus::default().to_string(),
            responsible_id: req.responsible_id,
            deadline: req.deadline,
            created_by: Some(actor.user_id),
            created_at: now,
            updated_at: now,
        };
        let saved: DbMonitoringNotification =
            diesel::insert_into(monitoring_notifications::table)
                .values(&row)
                .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(
                EntityKind::MonitoringNotification,
                saved.id,
                AuditAction::Create,
            )
            .by(actor.user_id)
            .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
            .after(&saved)?,
        )?;
        Ok(saved)
    })
}

fn save_notification(
    conn: &mut PgConnection,
    actor: &Actor,
    before: &DbMonitoringNotification,
    mut row: DbMonitoringNotification,
) -> Result<DbMonitoringNotification, CertificationError> {
    row.updated_at = Utc::now();
    let saved: DbMonitoringNotification =
        diesel::update(monitoring_notifications::table.find(row.id))
            .set(&row)
            .get_result(conn)?;
    let action = AuditAction::for_update(&before.status, &saved.status);
    audit::record(
        conn,
        AuditRecord::new(EntityKind::MonitoringNotification, saved.id, action)
            .by(actor.user_id)
            .in_context(Some(saved.program_id), Some(saved.audit_cycle_id))
            .before(before)?
            .after(&saved)?,
    )?;
    Ok(saved)
}

pub fn update_notification(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateNotificationRequest,
) -> Result<DbMonitoringNotification, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_notification(conn, id)?;
        let mut row = before.clone();
        if let Some(title) = &req.title {
            row.title = require_text(title, "title")?;
        }
        if let Some(description) = req.description {
            row.description = trimmed(description);
        }
        if let Some(severity) = req.severity {
            row.severity = severity.to_string();
        }
        if let Some(responsible_id) = req.responsible_id {
            row.responsible_id = responsible_id;
        }
        if let Some(deadline) = req.deadline {
            validate_deadline(deadline, row.created_at.date_naive())?;
            row.deadline = deadline;
        }
        save_notification(conn, actor, &before, row)
    })
}

pub fn change_notification_status(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: NotificationStatusRequest,
) -> Result<DbMonitoringNotification, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_notification(conn, id)?;
        let mut row = before.clone();
        row.status = req.status.to_string();
        save_notification(conn, actor, &before, row)
    })
}

pub fn list_resolutions(
    conn: &mut PgConnection,
    query: &ResolutionQuery,
) -> Result<Vec<DbNotificationResolution>, CertificationError> {
    let mut db_query = notification_resolutions::table.into_boxed();
    if let Some(notification_id) = query.notification_id {
        db_query = db_query.filter(notification_resolutions::notification_id.eq(notification_id));
    }
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(notification_resolutions::program_id.eq(program_id));
    }
    let rows = db_query
        .order(notification_resolutions::created_at.desc())
        .load::<DbNotificationResolution>(conn)?;
    Ok(rows)
}

/// Records how a notification was handled. An open notification moves to
/// `resolvida` in the same transaction.
pub fn create_resolution(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateResolutionRequest,
) -> Result<DbNotificationResolution, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    let description = require_text(&req.description, "description")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let notification = find_notification(conn, req.notification_id)?;
        let row = DbNotificationResolution {
            id: Uuid::new_v4(),
            program_id: notification.program_id,
            notification_id: notification.id,
            description,
            outcome: trimmed(req.outcome),
            created_by: Some(actor.user_id),
            created_at: Utc::now(),
        };
        let saved: DbNotificationResolution =
            diesel::insert_into(notification_resolutions::table)
                .values(&row)
                .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(
                EntityKind::NotificationResolution,
                saved.id,
                AuditAction::Create,
            )
            .by(actor.user_id)
            .in_context(Some(saved.program_id), Some(notification.audit_cycle_id))
            .after(&saved)?,
        )?;

        if notification.notification_status()?.is_open() {
            let mut resolved = notification.clone();
            resolved.status = NotificationStatus::Resolvida.to_string();
            save_notification(conn, actor, &notification, resolved)?;
        }
        Ok(saved)
    })
}

pub fn delete_resolution(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_resolution(conn, id)?;
        let notification = find_notification(conn, before.notification_id)?;
        diesel::delete(notification_resolutions::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::NotificationResolution, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), Some(notification.audit_cycle_id))
                .before(&before)?,
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_deadline_may_not_precede_creation_day() {
        let created = date(2026, 5, 10);
        assert!(validate_deadline(None, created).is_ok());
        assert!(validate_deadline(Some(created), created).is_ok());
        assert!(validate_deadline(Some(date(2026, 6, 1)), created).is_ok());
        assert!(matches!(
            validate_deadline(Some(date(2026, 5, 9)), created),
            Err(CertificationError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn test_monitoring_request_defaults_to_no_data() {
        let req: CreateMonitoringRequest = serde_json::from_str(&format!(
            r#"{{"audit_cycle_id": "{}", "criterion_id": "{}", "reference_month": "2026-04-17"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        ))
        .expect("request");
        assert_eq!(req.status, MonitoringStatus::SemDados);
        assert_eq!(first_day_of_month(req.reference_month), date(2026, 4, 1));
    }
}
