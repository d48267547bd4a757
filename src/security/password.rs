use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::warn;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            warn!("Password verification failed: {e}");
            Err(anyhow!("Password verification failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("segredo123").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("segredo123", &hash).expect("verify"));
        assert!(!verify_password("errada", &hash).expect("verify"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("mesma").expect("hash");
        let b = hash_password("mesma").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
