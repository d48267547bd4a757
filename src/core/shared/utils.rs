use anyhow::{Context, Result};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .build(manager)
        .with_context(|| "Failed to build database connection pool".to_string())
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Migration error: {}", e),
            ))
        },
    )?;
    Ok(())
}

/// Treats `None`, empty and whitespace-only strings alike.
pub fn has_text(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_text() {
        assert!(has_text(Some("motivo")));
        assert!(!has_text(Some("   ")));
        assert!(!has_text(Some("")));
        assert!(!has_text(None));
    }

    #[test]
    fn test_trimmed() {
        assert_eq!(trimmed(Some("  FSC ".to_string())), Some("FSC".to_string()));
        assert_eq!(trimmed(Some("  ".to_string())), None);
        assert_eq!(trimmed(None), None);
    }
}
