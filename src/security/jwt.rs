use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| anyhow!("Invalid user ID in token"))
    }
}

pub fn issue_token(user_id: Uuid, secret: &str, ttl_minutes: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
        iat: now.timestamp(),
    };
    let header = Header::new(Algorithm::HS256);
    encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| anyhow!("Failed to encode access token: {e}"))
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_nbf = false;
    validation.set_required_spec_claims(&["sub", "exp"]);

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected bearer token: {e}");
            anyhow!("Invalid token: {e}")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-with-enough-length-000";

    #[test]
    fn test_issue_and_validate() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, SECRET, 30).expect("token");
        let claims = validate_token(&token, SECRET).expect("claims");
        assert_eq!(claims.user_id().expect("uuid"), user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET, 30).expect("token");
        assert!(validate_token(&token, "another-secret-key-entirely-000000").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET, -10).expect("token");
        assert!(validate_token(&token, SECRET).is_err());
    }
}
