// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Salted password hashing.
//!
//! Argon2id with per-password random salts. Verification runs in constant
//! time inside the argon2 implementation, so a mismatch takes as long as a
//! match and leaks no timing signal about the stored hash.

use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Verify a candidate secret against a stored PHC-format hash.
///
/// Returns `Err` only when the stored hash itself is malformed; a wrong
/// secret is `Ok(false)`.
pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a secret with a freshly generated salt. Used by the roster tooling,
/// never during login.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
