// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Credential verification and token issuance.
//!
//! [`AuthService::login`] implements the full login contract:
//!
//! 1. Shape-check the identifier (3-20 chars) and secret (4-64 chars) after
//!    trimming. Validation failures are recorded as failed attempts for the
//!    submitted identifier before the request is rejected.
//! 2. Consult the attempt guard. A blocked identifier is rejected without any
//!    credential comparison, so a lockout costs no hash work and leaks no
//!    timing signal.
//! 3. Look up the principal and verify the secret against its salted hash.
//!    Unknown identifier and wrong secret produce byte-identical errors.
//! 4. On success, clear the guard record and mint a fixed-lifetime token.
//!
//! A credential failure that crosses the attempt threshold is answered with
//! the lockout error directly, so the caller that triggered the lockout sees
//! the countdown instead of one more generic failure.

pub mod password;
pub mod principals;
pub mod token;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::{ApiResult, AuthError};
use crate::guard::{AttemptGuard, BlockStatus};
use self::principals::{PrincipalStore, Profile};
use self::token::TokenSigner;

/// Identifier length bounds for the student flow.
pub const IDENTIFIER_MIN_LEN: usize = 3;
pub const IDENTIFIER_MAX_LEN: usize = 20;

/// Secret length bounds for the student flow.
pub const SECRET_MIN_LEN: usize = 4;
pub const SECRET_MAX_LEN: usize = 64;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_in_secs: u64,
    pub profile: Profile,
}

/// Authentication service wiring the guard, principal store, and signer.
pub struct AuthService {
    store: Arc<dyn PrincipalStore>,
    guard: AttemptGuard,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(store: Arc<dyn PrincipalStore>, guard: AttemptGuard, signer: TokenSigner) -> Self {
        Self {
            store,
            guard,
            signer,
        }
    }

    /// Authenticate a principal and mint a token on success.
    pub fn login(&self, identifier: &str, secret: &str) -> ApiResult<LoginOutcome> {
        self.login_at(identifier, secret, Utc::now())
    }

    /// Login with an explicit clock, used directly by tests.
    pub fn login_at(
        &self,
        identifier: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<LoginOutcome> {
        let identifier = identifier.trim();
        let secret = secret.trim();

        // Shape checks. Failures count toward the identifier's lockout budget
        // but do not consult the guard themselves.
        if identifier.is_empty() || secret.is_empty() {
            self.guard.record_failure_at(identifier, now);
            return Err(AuthError::invalid_input(
                "Student ID and password are required",
                None,
            ));
        }
        if identifier.len() < IDENTIFIER_MIN_LEN || identifier.len() > IDENTIFIER_MAX_LEN {
            self.guard.record_failure_at(identifier, now);
            return Err(AuthError::invalid_input(
                "Student ID must be 3-20 characters",
                Some("student_id"),
            ));
        }
        if secret.len() < SECRET_MIN_LEN || secret.len() > SECRET_MAX_LEN {
            self.guard.record_failure_at(identifier, now);
            return Err(AuthError::invalid_input(
                "Password must be 4-64 characters",
                Some("password"),
            ));
        }

        // Lockout check before any credential work.
        if let BlockStatus::Blocked { remaining_secs } = self.guard.check_at(identifier, now) {
            return Err(AuthError::rate_limited(remaining_secs));
        }

        // Unknown identifier and wrong secret must be indistinguishable, so
        // both funnel through the same failure path.
        let Some(principal) = self.store.find_by_identifier(identifier) else {
            return Err(self.credential_failure(identifier, now));
        };

        let valid = match password::verify_password(&principal.password_hash, secret) {
            Ok(valid) => valid,
            Err(e) => {
                // A malformed stored hash is a roster problem, not a caller
                // problem.
                return Err(AuthError::internal_error(&format!(
                    "Password verification failed for roster entry: {e}"
                )));
            }
        };

        if !valid {
            return Err(self.credential_failure(identifier, now));
        }

        self.guard.clear(identifier);

        let minted = self
            .signer
            .mint(identifier)
            .map_err(|e| AuthError::internal_error(&format!("Token minting failed: {e}")))?;

        tracing::info!(
            "LOGIN_OK | student={} expires_in={}s",
            principal.student_id,
            minted.expires_in_secs
        );

        Ok(LoginOutcome {
            token: minted.token,
            expires_in_secs: minted.expires_in_secs,
            profile: principal.profile(),
        })
    }

    /// Record a credential failure and answer with either the generic
    /// credentials error or, when this failure crossed the attempt threshold,
    /// the lockout error carrying the countdown.
    fn credential_failure(&self, identifier: &str, now: DateTime<Utc>) -> AuthError {
        self.guard.record_failure_at(identifier, now);
        tracing::warn!("LOGIN_FAILED | student={}", identifier);

        match self.guard.check_at(identifier, now) {
            BlockStatus::Blocked { remaining_secs } => AuthError::rate_limited(remaining_secs),
            BlockStatus::Allowed => AuthError::invalid_credentials(),
        }
    }

    /// Best-effort logout: clears the attempt record for the subject.
    pub fn logout(&self, subject: &str) {
        self.guard.clear(subject);
        tracing::info!("LOGOUT | student={}", subject);
    }

    /// Verify a bearer token, returning its claims.
    pub fn verify_token(&self, bearer: &str) -> Option<token::Claims> {
        self.signer.verify(bearer).ok()
    }

    pub fn guard(&self) -> &AttemptGuard {
        &self.guard
    }
}

// ============================================================================
// TESTS
// ============================================================================
