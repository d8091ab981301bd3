//! Argon2id password hashing.
//!
//! Digests are PHC strings (`$argon2id$v=19$...`) carrying their own salt and
//! parameters. Verification goes through `argon2`, which compares the derived
//! output in constant time.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use std::sync::OnceLock;

use crate::error::Error;

// Digest used when the username is unknown so both failure paths cost one verification.
static DUMMY_DIGEST: OnceLock<Option<String>> = OnceLock::new();

/// Hash a password with a fresh random salt.
///
/// # Errors
/// Returns `Error::Internal` if the salt cannot be generated or hashing fails.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| Error::internal(format!("failed to hash password: {err}")))
}

/// Check a password against a stored digest. Unparseable digests never match.
#[must_use]
pub fn verify_password(digest: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Run a verification that always fails, spending the same work as a real one.
pub fn verify_dummy(password: &str) {
    let digest = DUMMY_DIGEST.get_or_init(|| hash_password("taskgate-dummy-password").ok());
    if let Some(digest) = digest {
        let _ = verify_password(digest, password);
    }
}
