//! Password hashing and the registration password policy.
//!
//! Stored hashes have the form `<base64 salt>$<base64 digest>`, where the
//! digest is SHA-256 over the salt and password, re-hashed `ROUNDS` times.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

const SALT_LEN: usize = 16;
const ROUNDS: usize = 10_000;
const SPECIAL_CHARACTERS: &str = "#?!@$%^&*-";

pub const POLICY_MESSAGE: &str = "Password should match the following criteria: \
    at least one uppercase and lowercase letter, minimum eight characters in length, \
    at least one digit, at least one special character (#?!@$%^&*-).";

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = digest(&salt, password);
    format!("{}${}", STANDARD.encode(salt), STANDARD.encode(digest))
}

/// Check a password against a stored hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt), STANDARD.decode(expected)) else {
        return false;
    };

    let actual = digest(&salt, password);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 1..ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(digest);
        digest = hasher.finalize();
    }
    digest.to_vec()
}

/// Enforce the registration policy: eight or more characters with an
/// uppercase letter, a lowercase letter, a digit and a special character.
pub fn check_password_policy(password: &str) -> Result<(), AppError> {
    let long_enough = password.chars().count() >= 8;
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARACTERS.contains(c));

    if long_enough && has_upper && has_lower && has_digit && has_special {
        Ok(())
    } else {
        Err(AppError::Validation(POLICY_MESSAGE.to_string()))
    }
}
