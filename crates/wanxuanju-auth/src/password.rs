use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::AuthError;

/// Hash a password with Argon2id and a fresh salt.
pub fn hash(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Backend(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC hash. A malformed stored hash
/// counts as a failed verification, not a panic.
pub fn verify(stored_hash: &str, password: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash("hunter2-but-longer").unwrap();
        assert!(verify(&hash, "hunter2-but-longer"));
        assert!(!verify(&hash, "wrong"));
        assert!(!verify("not-a-phc-string", "hunter2-but-longer"));
    }
}
