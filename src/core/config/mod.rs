use anyhow::{Context, Result};
use log::warn;

const DEFAULT_JWT_SECRET: &str = "dev-secret-key-change-in-production-minimum-32-chars";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub drive: DriveConfig,
    pub seed: SeedConfig,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

#[derive(Clone, Debug)]
pub struct DriveConfig {
    pub server: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub strict_startup: bool,
}

#[derive(Clone, Debug)]
pub struct SeedConfig {
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using default development secret - DO NOT USE IN PRODUCTION");
            DEFAULT_JWT_SECRET.to_string()
        });

        Ok(Self {
            database_url,
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: parse_env("SERVER_PORT", 8000)?,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_minutes: parse_env("JWT_EXPIRE_MINUTES", 480)?,
            },
            drive: DriveConfig {
                server: env_or("S3_ENDPOINT", "http://localhost:9000"),
                access_key: env_or("S3_ACCESS_KEY", "minioadmin"),
                secret_key: env_or("S3_SECRET_KEY", "minioadmin"),
                bucket: env_or("S3_BUCKET", "evidencias"),
                region: env_or("S3_REGION", "us-east-1"),
                strict_startup: parse_bool(&env_or("S3_STRICT_STARTUP", "false")),
            },
            seed: SeedConfig {
                admin_name: env_or("ADMIN_NAME", "Administrador"),
                admin_email: env_or("ADMIN_EMAIL", "admin@local"),
                admin_password: env_or("ADMIN_PASSWORD", "admin123"),
            },
            cors_origins: split_origins(&env_or("CORS_ORIGINS", "")),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_split_origins() {
        let origins = split_origins("http://localhost:5173, https://app.example.com,,");
        assert_eq!(
            origins,
            vec![
                "http://localhost:5173".to_string(),
                "https://app.example.com".to_string()
            ]
        );
        assert!(split_origins("").is_empty());
    }
}
