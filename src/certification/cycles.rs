use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::schema::{audit_cycles, evaluations, indicators, users};
use crate::core::shared::utils::trimmed;
use crate::security::verify_password;

use super::audit::{self, AuditAction, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, MANAGEMENT};
use super::storage::{find_audit_cycle, find_program, DbAuditCycle, DbEvaluation};
use super::types::{deserialize_some, ConformityStatus};
use super::validation::{validate_cycle_year, validate_date_order};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAuditCycleRequest {
    pub program_id: Uuid,
    pub year: i32,
    pub audit_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub certifying_body: Option<String>,
    pub scope: Option<String>,
    pub standard_used: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAuditCycleRequest {
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub audit_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub certifying_body: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub scope: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub standard_used: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfirmation {
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditCycleQuery {
    pub program_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedEvaluations {
    pub audit_cycle_id: Uuid,
    pub created: usize,
}

fn ensure_year_free(
    conn: &mut PgConnection,
    program_id: Uuid,
    year: i32,
    except: Option<Uuid>,
) -> Result<(), CertificationError> {
    let mut query = audit_cycles::table
        .filter(audit_cycles::program_id.eq(program_id))
        .filter(audit_cycles::year.eq(year))
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(audit_cycles::id.ne(id));
    }
    let taken: i64 = query.count().get_result(conn)?;
    if taken > 0 {
        return Err(CertificationError::Duplicate(format!(
            "An audit cycle for {year} already exists in this program"
        )));
    }
    Ok(())
}

pub fn list_audit_cycles(
    conn: &mut PgConnection,
    query: &AuditCycleQuery,
) -> Result<Vec<DbAuditCycle>, CertificationError> {
    let mut db_query = audit_cycles::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(audit_cycles::program_id.eq(program_id));
    }
    let rows = db_query
        .order(audit_cycles::year.desc())
        .load::<DbAuditCycle>(conn)?;
    Ok(rows)
}

pub fn get_audit_cycle(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbAuditCycle, CertificationError> {
    find_audit_cycle(conn, id)
}

pub fn create_audit_cycle(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateAuditCycleRequest,
) -> Result<DbAuditCycle, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    validate_cycle_year(req.year)?;
    validate_date_order(req.start_date, req.end_date, "audit cycle")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        find_program(conn, req.program_id)?;
        ensure_year_free(conn, req.program_id, req.year, None)?;

        let row = DbAuditCycle {
            id: Uuid::new_v4(),
            program_id: req.program_id,
            year: req.year,
            audit_type: trimmed(req.audit_type),
            start_date: req.start_date,
            end_date: req.end_date,
            certifying_body: trimmed(req.certifying_body),
            scope: trimmed(req.scope),
            standard_used: trimmed(req.standard_used),
            created_at: Utc::now(),
        };
        let saved: DbAuditCycle = diesel::insert_into(audit_cycles::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::AuditCycle, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(saved.id))
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn update_audit_cycle(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateAuditCycleRequest,
) -> Result<DbAuditCycle, CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_audit_cycle(conn, id)?;
        let mut row = before.clone();
        if let Some(year) = req.year {
            validate_cycle_year(year)?;
            ensure_year_free(conn, row.program_id, year, Some(id))?;
            row.year = year;
        }
        if let Some(audit_type) = req.audit_type {
            row.audit_type = trimmed(audit_type);
        }
        if let Some(start_date) = req.start_date {
            row.start_date = start_date;
        }
        if let Some(end_date) = req.end_date {
            row.end_date = end_date;
        }
        if let Some(certifying_body) = req.certifying_body {
            row.certifying_body = trimmed(certifying_body);
        }
        if let Some(scope) = req.scope {
            row.scope = trimmed(scope);
        }
        if let Some(standard_used) = req.standard_used {
            row.standard_used = trimmed(standard_used);
        }
        validate_date_order(row.start_date, row.end_date, "audit cycle")?;

        let saved: DbAuditCycle = diesel::update(audit_cycles::table.find(id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::AuditCycle, id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), Some(id))
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

/// Deleting a cycle drops every evaluation under it, so the caller must
/// re-enter their password.
pub fn delete_audit_cycle(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    confirmation: PasswordConfirmation,
) -> Result<(), CertificationError> {
    actor.require_any(MANAGEMENT)?;

    let password_hash: String = users::table
        .find(actor.user_id)
        .select(users::password_hash)
        .first(conn)
        .optional()?
        .ok_or_else(|| CertificationError::Unauthorized("Unknown user".to_string()))?;
    let confirmed = verify_password(&confirmation.password, &password_hash)
        .map_err(|e| CertificationError::Internal(e.to_string()))?;
    if !confirmed {
        return Err(CertificationError::Permission(
            "Password confirmation failed".to_string(),
        ));
    }

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_audit_cycle(conn, id)?;
        diesel::delete(audit_cycles::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::AuditCycle, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), None)
                .before(&before)?,
        )?;
        Ok(())
    })
}

/// Creates a `conforme` evaluation for every indicator of the cycle's program
/// that has none in the cycle yet.
pub fn generate_evaluations(
    conn: &mut PgConnection,
    actor: &Actor,
    audit_cycle_id: Uuid,
) -> Result<GeneratedEvaluations, CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let cycle = find_audit_cycle(conn, audit_cycle_id)?;
        let evaluated: Vec<Uuid> = evaluations::table
            .filter(evaluations::audit_cycle_id.eq(cycle.id))
            .select(evaluations::indicator_id)
            .load(conn)?;
        let pending: Vec<Uuid> = indicators::table
            .filter(indicators::program_id.eq(cycle.program_id))
            .filter(indicators::id.ne_all(evaluated))
            .select(indicators::id)
            .order(indicators::code.asc())
            .load(conn)?;

        let now = Utc::now();
        for indicator_id in &pending {
            let row = DbEvaluation {
                id: Uuid::new_v4(),
                program_id: cycle.program_id,
                indicator_id: *indicator_id,
                audit_cycle_id: cycle.id,
                conformity_status: ConformityStatus::Conforme.to_string(),
                justification: None,
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
        }

        Ok(GeneratedEvaluations {
            audit_cycle_id: cycle.id,
            created: pending.len(),
        })
    })
}
