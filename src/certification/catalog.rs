//! Programs and the principle → criterion → indicator hierarchy.

use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::shared::schema::{
    audit_cycles, certification_programs, criteria, indicators, principles,
};
use crate::core::shared::utils::trimmed;

use super::audit::{self, AuditAction, AuditRecord, EntityKind};
use super::error::CertificationError;
use super::permissions::{Actor, MANAGEMENT};
use super::storage::{
    find_criterion, find_indicator, find_principle, find_program, DbCriterion, DbIndicator,
    DbPrinciple, DbProgram,
};
use super::types::deserialize_some;
use super::validation::{require_text, validate_same_program};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProgramRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProgramRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrincipleRequest {
    pub program_id: Uuid,
    pub code: Option<String>,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePrincipleRequest {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub code: Option<Option<String>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCriterionRequest {
    pub program_id: Uuid,
    pub principle_id: Uuid,
    pub code: Option<String>,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCriterionRequest {
    pub principle_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub code: Option<Option<String>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIndicatorRequest {
    pub program_id: Uuid,
    pub criterion_id: Uuid,
    pub code: Option<String>,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIndicatorRequest {
    pub criterion_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub code: Option<Option<String>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyQuery {
    pub program_id: Option<Uuid>,
    pub principle_id: Option<Uuid>,
    pub criterion_id: Option<Uuid>,
}

fn normalize_code(raw: &str) -> Result<String, CertificationError> {
    Ok(require_text(raw, "code")?.to_uppercase())
}

fn ensure_program_unique(
    conn: &mut PgConnection,
    code: &str,
    name: &str,
    except: Option<Uuid>,
) -> Result<(), CertificationError> {
    let mut by_code = certification_programs::table
        .filter(certification_programs::code.eq(code))
        .into_boxed();
    let mut by_name = certification_programs::table
        .filter(certification_programs::name.eq(name))
        .into_boxed();
    if let Some(id) = except {
        by_code = by_code.filter(certification_programs::id.ne(id));
        by_name = by_name.filter(certification_programs::id.ne(id));
    }

    let code_taken: i64 = by_code.count().get_result(conn)?;
    if code_taken > 0 {
        return Err(CertificationError::Duplicate(format!(
            "Program code {code} already exists"
        )));
    }
    let name_taken: i64 = by_name.count().get_result(conn)?;
    if name_taken > 0 {
        return Err(CertificationError::Duplicate(format!(
            "Program name {name} already exists"
        )));
    }
    Ok(())
}

pub fn list_programs(conn: &mut PgConnection) -> Result<Vec<DbProgram>, CertificationError> {
    let rows = certification_programs::table
        .order(certification_programs::code.asc())
        .load::<DbProgram>(conn)?;
    Ok(rows)
}

pub fn get_program(conn: &mut PgConnection, id: Uuid) -> Result<DbProgram, CertificationError> {
    find_program(conn, id)
}

pub fn create_program(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateProgramRequest,
) -> Result<DbProgram, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    let code = normalize_code(&req.code)?;
    let name = require_text(&req.name, "name")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        ensure_program_unique(conn, &code, &name, None)?;
        let row = DbProgram {
            id: Uuid::new_v4(),
            code,
            name,
            description: trimmed(req.description),
            created_at: Utc::now(),
        };
        let saved: DbProgram = diesel::insert_into(certification_programs::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CertificationProgram, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.id), None)
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn update_program(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateProgramRequest,
) -> Result<DbProgram, CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_program(conn, id)?;
        let mut row = before.clone();
        if let Some(code) = req.code {
            row.code = normalize_code(&code)?;
        }
        if let Some(name) = req.name {
            row.name = require_text(&name, "name")?;
        }
        if let Some(description) = req.description {
            row.description = trimmed(description);
        }
        ensure_program_unique(conn, &row.code, &row.name, Some(id))?;

        let saved: DbProgram = diesel::update(certification_programs::table.find(id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CertificationProgram, id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(Some(id), None)
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

/// Programs with audit cycles are kept; everything below a program goes with it.
pub fn delete_program(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_program(conn, id)?;
        let cycles: i64 = audit_cycles::table
            .filter(audit_cycles::program_id.eq(id))
            .count()
            .get_result(conn)?;
        if cycles > 0 {
            return Err(CertificationError::Validation(format!(
                "Program {} has {cycles} audit cycle(s) and cannot be deleted",
                before.code
            )));
        }
        diesel::delete(certification_programs::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::CertificationProgram, id, AuditAction::Delete)
                .by(actor.user_id)
                .before(&before)?,
        )?;
        Ok(())
    })
}

pub fn list_principles(
    conn: &mut PgConnection,
    query: &HierarchyQuery,
) -> Result<Vec<DbPrinciple>, CertificationError> {
    let mut db_query = principles::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(principles::program_id.eq(program_id));
    }
    let rows = db_query
        .order((principles::code.asc(), principles::created_at.asc()))
        .load::<DbPrinciple>(conn)?;
    Ok(rows)
}

pub fn get_principle(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbPrinciple, CertificationError> {
    find_principle(conn, id)
}

pub fn create_principle(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreatePrincipleRequest,
) -> Result<DbPrinciple, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    let title = require_text(&req.title, "title")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        find_program(conn, req.program_id)?;
        let row = DbPrinciple {
            id: Uuid::new_v4(),
            program_id: req.program_id,
            code: trimmed(req.code),
            title,
            description: trimmed(req.description),
            created_at: Utc::now(),
        };
        let saved: DbPrinciple = diesel::insert_into(principles::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Principle, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), None)
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn update_principle(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdatePrincipleRequest,
) -> Result<DbPrinciple, CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_principle(conn, id)?;
        let mut row = before.clone();
        if let Some(code) = req.code {
            row.code = trimmed(code);
        }
        if let Some(title) = req.title {
            row.title = require_text(&title, "title")?;
        }
        if let Some(description) = req.description {
            row.description = trimmed(description);
        }
        let saved: DbPrinciple = diesel::update(principles::table.find(id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Principle, id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), None)
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn delete_principle(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_principle(conn, id)?;
        diesel::delete(principles::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Principle, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), None)
                .before(&before)?,
        )?;
        Ok(())
    })
}

pub fn list_criteria(
    conn: &mut PgConnection,
    query: &HierarchyQuery,
) -> Result<Vec<DbCriterion>, CertificationError> {
    let mut db_query = criteria::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(criteria::program_id.eq(program_id));
    }
    if let Some(principle_id) = query.principle_id {
        db_query = db_query.filter(criteria::principle_id.eq(principle_id));
    }
    let rows = db_query
        .order((criteria::code.asc(), criteria::created_at.asc()))
        .load::<DbCriterion>(conn)?;
    Ok(rows)
}

pub fn get_criterion(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbCriterion, CertificationError> {
    find_criterion(conn, id)
}

pub fn create_criterion(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateCriterionRequest,
) -> Result<DbCriterion, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    let title = require_text(&req.title, "title")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        find_program(conn, req.program_id)?;
        let principle = find_principle(conn, req.principle_id)?;
        validate_same_program(req.program_id, principle.program_id, "criterion/principle")?;

        let row = DbCriterion {
            id: Uuid::new_v4(),
            program_id: req.program_id,
            principle_id: principle.id,
            code: trimmed(req.code),
            title,
            description: trimmed(req.description),
            created_at: Utc::now(),
        };
        let saved: DbCriterion = diesel::insert_into(criteria::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Criterion, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), None)
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn update_criterion(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateCriterionRequest,
) -> Result<DbCriterion, CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_criterion(conn, id)?;
        let mut row = before.clone();
        if let Some(principle_id) = req.principle_id {
            let principle = find_principle(conn, principle_id)?;
            validate_same_program(row.program_id, principle.program_id, "criterion/principle")?;
            row.principle_id = principle.id;
        }
        if let Some(code) = req.code {
            row.code = trimmed(code);
        }
        if let Some(title) = req.title {
            row.title = require_text(&title, "title")?;
        }
        if let Some(description) = req.description {
            row.description = trimmed(description);
        }
        let saved: DbCriterion = diesel::update(criteria::table.find(id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Criterion, id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), None)
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn delete_criterion(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_criterion(conn, id)?;
        diesel::delete(criteria::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Criterion, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), None)
                .before(&before)?,
        )?;
        Ok(())
    })
}

pub fn list_indicators(
    conn: &mut PgConnection,
    query: &HierarchyQuery,
) -> Result<Vec<DbIndicator>, CertificationError> {
    let mut db_query = indicators::table.into_boxed();
    if let Some(program_id) = query.program_id {
        db_query = db_query.filter(indicators::program_id.eq(program_id));
    }
    if let Some(criterion_id) = query.criterion_id {
        db_query = db_query.filter(indicators::criterion_id.eq(criterion_id));
    }
    let rows = db_query
        .order((indicators::code.asc(), indicators::created_at.asc()))
        .load::<DbIndicator>(conn)?;
    Ok(rows)
}

pub fn get_indicator(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DbIndicator, CertificationError> {
    find_indicator(conn, id)
}

pub fn create_indicator(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateIndicatorRequest,
) -> Result<DbIndicator, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    let title = require_text(&req.title, "title")?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        find_program(conn, req.program_id)?;
        let criterion = find_criterion(conn, req.criterion_id)?;
        validate_same_program(req.program_id, criterion.program_id, "indicator/criterion")?;

        let row = DbIndicator {
            id: Uuid::new_v4(),
            program_id: req.program_id,
            criterion_id: criterion.id,
            code: trimmed(req.code),
            title,
            description: trimmed(req.description),
            created_at: Utc::now(),
        };
        let saved: DbIndicator = diesel::insert_into(indicators::table)
            .values(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Indicator, saved.id, AuditAction::Create)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), None)
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn update_indicator(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
    req: UpdateIndicatorRequest,
) -> Result<DbIndicator, CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_indicator(conn, id)?;
        let mut row = before.clone();
        if let Some(criterion_id) = req.criterion_id {
            let criterion = find_criterion(conn, criterion_id)?;
            validate_same_program(row.program_id, criterion.program_id, "indicator/criterion")?;
            row.criterion_id = criterion.id;
        }
        if let Some(code) = req.code {
            row.code = trimmed(code);
        }
        if let Some(title) = req.title {
            row.title = require_text(&title, "title")?;
        }
        if let Some(description) = req.description {
            row.description = trimmed(description);
        }
        let saved: DbIndicator = diesel::update(indicators::table.find(id))
            .set(&row)
            .get_result(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Indicator, id, AuditAction::Update)
                .by(actor.user_id)
                .in_context(Some(saved.program_id), None)
                .before(&before)?
                .after(&saved)?,
        )?;
        Ok(saved)
    })
}

pub fn delete_indicator(
    conn: &mut PgConnection,
    actor: &Actor,
    id: Uuid,
) -> Result<(), CertificationError> {
    actor.require_any(MANAGEMENT)?;

    conn.transaction::<_, CertificationError, _>(|conn| {
        let before = find_indicator(conn, id)?;
        diesel::delete(indicators::table.find(id)).execute(conn)?;
        audit::record(
            conn,
            AuditRecord::new(EntityKind::Indicator, id, AuditAction::Delete)
                .by(actor.user_id)
                .in_context(Some(before.program_id), None)
                .before(&before)?,
        )?;
        Ok(())
    })
}
