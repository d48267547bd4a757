//! User accounts: credential checks, registration and password changes.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::certification::error::CertificationError;
use crate::certification::permissions::{Actor, Role, ADMIN_ONLY, COMPLIANCE_WRITERS, MANAGEMENT};
use crate::certification::validation::require_text;
use crate::core::shared::schema::users;
use crate::security::password::MIN_PASSWORD_LENGTH;
use crate::security::{hash_password, verify_password};

#[derive(Debug, Clone, Queryable, Insertable, Serialize)]
#[diesel(table_name = users)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl DbUser {
    pub fn user_role(&self) -> Result<Role, CertificationError> {
        self.role.parse().map_err(CertificationError::Internal)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: DbUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponsibleRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_new_password(password: &str) -> Result<(), CertificationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CertificationError::Validation(format!(
            "Password must have at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn find_user(conn: &mut PgConnection, id: Uuid) -> Result<DbUser, CertificationError> {
    users::table
        .find(id)
        .first::<DbUser>(conn)
        .optional()?
        .ok_or_else(|| CertificationError::not_found("User"))
}

pub fn find_user_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<DbUser>, CertificationError> {
    let user = users::table
        .filter(users::email.eq(normalize_email(email)))
        .first::<DbUser>(conn)
        .optional()?;
    Ok(user)
}

/// Returns the user only when the password matches its stored hash.
pub fn authenticate(
    conn: &mut PgConnection,
    email: &str,
    password: &str,
) -> Result<DbUser, CertificationError> {
    let rejected = || CertificationError::Unauthorized("Invalid email or password".to_string());
    let user = find_user_by_email(conn, email)?.ok_or_else(rejected)?;
    let matches = verify_password(password, &user.password_hash)
        .map_err(|e| CertificationError::Internal(e.to_string()))?;
    if !matches {
        return Err(rejected());
    }
    Ok(user)
}

/// Inserts a user unless the email is taken. No permission check.
pub fn insert_user(
    conn: &mut PgConnection,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<DbUser, CertificationError> {
    let name = require_text(name, "name")?;
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(CertificationError::Validation("email is required".to_string()));
    }
    validate_new_password(password)?;
    if find_user_by_email(conn, &email)?.is_some() {
        return Err(CertificationError::Duplicate(format!(
            "A user with email {email} already exists"
        )));
    }

    let password_hash =
        hash_password(password).map_err(|e| CertificationError::Internal(e.to_string()))?;
    let row = DbUser {
        id: Uuid::new_v4(),
        name,
        email,
        role: role.to_string(),
        password_hash,
        created_at: Utc::now(),
    };
    let saved: DbUser = diesel::insert_into(users::table)
        .values(&row)
        .get_result(conn)?;
    info!("Created user {} with role {}", saved.email, saved.role);
    Ok(saved)
}

pub fn register_user(
    conn: &mut PgConnection,
    actor: &Actor,
    req: RegisterUserRequest,
) -> Result<DbUser, CertificationError> {
    actor.require_any(ADMIN_ONLY)?;
    insert_user(conn, &req.name, &req.email, &req.password, req.role)
}

pub fn create_responsible(
    conn: &mut PgConnection,
    actor: &Actor,
    req: CreateResponsibleRequest,
) -> Result<DbUser, CertificationError> {
    actor.require_any(MANAGEMENT)?;
    insert_user(conn, &req.name, &req.email, &req.password, Role::Responsible)
}

pub fn list_users(
    conn: &mut PgConnection,
    actor: &Actor,
    query: &UserQuery,
) -> Result<Vec<DbUser>, CertificationError> {
    actor.require_any(COMPLIANCE_WRITERS)?;
    let mut db_query = users::table.into_boxed();
    if let Some(role) = query.role {
        db_query = db_query.filter(users::role.eq(role.as_str()));
    }
    let rows = db_query.order(users::name.asc()).load::<DbUser>(conn)?;
    Ok(rows)
}

/// Users that corrective actions can be assigned to.
pub fn list_responsibles(conn: &mut PgConnection) -> Result<Vec<DbUser>, CertificationError> {
    let rows = users::table
        .filter(users::role.eq(Role::Responsible.as_str()))
        .order(users::name.asc())
        .load::<DbUser>(conn)?;
    Ok(rows)
}

pub fn change_password(
    conn: &mut PgConnection,
    actor: &Actor,
    req: ChangePasswordRequest,
) -> Result<(), CertificationError> {
    let user = find_user(conn, actor.user_id)?;
    let matches = verify_password(&req.current_password, &user.password_hash)
        .map_err(|e| CertificationError::Internal(e.to_string()))?;
    if !matches {
        return Err(CertificationError::Permission(
            "Current password is incorrect".to_string(),
        ));
    }
    validate_new_password(&req.new_password)?;
    let password_hash = hash_password(&req.new_password)
        .map_err(|e| CertificationError::Internal(e.to_string()))?;
    diesel::update(users::table.find(user.id))
        .set(users::password_hash.eq(password_hash))
        .execute(conn)?;
    info!("Password changed for user {}", user.email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Gestor@Empresa.COM "), "gestor@empresa.com");
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_new_password("abc"),
            Err(CertificationError::Validation(_))
        ));
        assert!(validate_new_password("abcdef").is_ok());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = DbUser {
            id: Uuid::new_v4(),
            name: "Auditora".to_string(),
            email: "auditora@local".to_string(),
            role: "AUDITOR".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).expect("json");
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "AUDITOR");
        assert_eq!(user.user_role().expect("role"), Role::Auditor);
    }
}
