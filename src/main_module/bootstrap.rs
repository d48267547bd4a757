//! Idempotent startup seeding

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use diesel::prelude::*;
use log::{info, trace};
use uuid::Uuid;

use crate::auth::users::{find_user_by_email, insert_user};
use crate::certification::permissions::Role;
use crate::certification::storage::{DbAuditCycle, DbProgram};
use crate::core::config::SeedConfig;
use crate::core::shared::schema::{audit_cycles, certification_programs};
use crate::settings::get_or_create_settings;

/// (code, name, description)
pub const DEFAULT_PROGRAMS: &[(&str, &str, &str)] = &[
    ("FSC", "FSC", "Forest Stewardship Council"),
    ("PFC", "PFC", "Programa de Certificação Florestal"),
    (
        "ONCA_PINTADA",
        "Onça Pintada",
        "Certificação e monitoramento para onça pintada",
    ),
    (
        "CARBONO",
        "Carbono",
        "Programas e auditorias para carbono florestal",
    ),
];

pub const INITIAL_AUDIT_TYPE: &str = "Certificação";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub programs: usize,
    pub audit_cycles: usize,
    pub admin_created: bool,
}

fn seed_programs(conn: &mut PgConnection) -> Result<usize> {
    let existing: Vec<String> = certification_programs::table
        .select(certification_programs::code)
        .load(conn)
        .context("Failed to load certification programs")?;

    let mut created = 0;
    for (code, name, description) in DEFAULT_PROGRAMS {
        if existing.iter().any(|c| c.eq_ignore_ascii_case(code)) {
            trace!("Program {code} already present");
            continue;
        }
        let row = DbProgram {
            id: Uuid::new_v4(),
            code: (*code).to_string(),
            name: (*name).to_string(),
            description: Some((*description).to_string()),
            created_at: Utc::now(),
        };
        diesel::insert_into(certification_programs::table)
            .values(&row)
            .execute(conn)
            .with_context(|| format!("Failed to seed program {code}"))?;
        created += 1;
    }
    Ok(created)
}

/// Gives every program without any audit cycle one for `year`.
fn seed_audit_cycles(conn: &mut PgConnection, year: i32) -> Result<usize> {
    let programs: Vec<Uuid> = certification_programs::table
        .select(certification_programs::id)
        .load(conn)
        .context("Failed to load program ids")?;

    let mut created = 0;
    for program_id in programs {
        let cycles: i64 = audit_cycles::table
            .filter(audit_cycles::program_id.eq(program_id))
            .count()
            .get_result(conn)?;
        if cycles > 0 {
            continue;
        }
        let row = DbAuditCycle {
            id: Uuid::new_v4(),
            program_id,
            year,
            audit_type: Some(INITIAL_AUDIT_TYPE.to_string()),
            start_date: None,
            end_date: None,
            certifying_body: None,
            scope: None,
            standard_used: None,
            created_at: Utc::now(),
        };
        diesel::insert_into(audit_cycles::table)
            .values(&row)
            .execute(conn)
            .with_context(|| format!("Failed to seed audit cycle for program {program_id}"))?;
        created += 1;
    }
    Ok(created)
}

fn seed_admin(conn: &mut PgConnection, seed: &SeedConfig) -> Result<bool> {
    if find_user_by_email(conn, &seed.admin_email)?.is_some() {
        return Ok(false);
    }
    insert_user(
        conn,
        &seed.admin_name,
        &seed.admin_email,
        &seed.admin_password,
        Role::Admin,
    )
    .context("Failed to seed admin user")?;
    Ok(true)
}

/// Safe to run on every start.
pub fn seed_defaults(conn: &mut PgConnection, seed: &SeedConfig) -> Result<SeedSummary> {
    let summary = conn.transaction::<_, anyhow::Error, _>(|conn| {
        let programs = seed_programs(conn)?;
        let audit_cycles = seed_audit_cycles(conn, Utc::now().year())?;
        let admin_created = seed_admin(conn, seed)?;
        get_or_create_settings(conn).context("Failed to seed system settings")?;
        Ok(SeedSummary {
            programs,
            audit_cycles,
            admin_created,
        })
    })?;

    info!(
        "Seed complete: {} programs, {} audit cycles, admin created: {}",
        summary.programs, summary.audit_cycles, summary.admin_created
    );
    Ok(summary)
}
