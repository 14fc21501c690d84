// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Signed bearer tokens.
//!
//! HS256 JWTs with a fixed lifetime. Tokens are minted at successful login
//! and never renewed; the server keeps no record of issued tokens, so expiry
//! enforcement rests entirely on the signed `exp` claim. Any request bearing
//! an expired or tampered token is rejected at verification.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Fixed token lifetime: 8 hours.
pub const TOKEN_TTL_SECS: u64 = 8 * 60 * 60;

/// Claims carried by a portal token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the student identifier.
    pub sub: String,
    /// Issued at (seconds since epoch).
    pub iat: u64,
    /// Expiration time (seconds since epoch).
    pub exp: u64,
    /// Unique token id.
    pub jti: String,
}

/// A freshly minted token with its expiry metadata.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub expires_in_secs: u64,
    pub expires_at: u64,
}

/// Mints and verifies portal tokens with a shared secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Mint a token for a subject, expiring `ttl_secs` from now.
    pub fn mint(&self, subject: &str) -> Result<MintedToken> {
        self.mint_with_issued_at(subject, now_epoch()?)
    }

    /// Mint with an explicit issue instant. The expiry is always
    /// `issued_at + ttl`; there is no sliding renewal.
    pub fn mint_with_issued_at(&self, subject: &str, issued_at: u64) -> Result<MintedToken> {
        let expires_at = issued_at + self.ttl_secs;
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: expires_at,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)?;

        Ok(MintedToken {
            token,
            expires_in_secs: self.ttl_secs,
            expires_at,
        })
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// Zero leeway: a token one second past its `exp` is already invalid.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(token_data.claims)
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

fn now_epoch() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret-for-unit-tests", TOKEN_TTL_SECS)
    }

    #[test]
    fn test_mint_then_verify() {
        let signer = signer();
        let minted = signer.mint("NEET2024001").unwrap();
        assert_eq!(minted.expires_in_secs, 28800);

        let claims = signer.verify(&minted.token).unwrap();
        assert_eq!(claims.sub, "NEET2024001");
        assert_eq!(claims.exp, claims.iat + TOKEN_TTL_SECS);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = signer();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        // Issued far enough back that the token expired an hour ago.
        let minted = signer
            .mint_with_issued_at("NEET2024001", now - TOKEN_TTL_SECS - 3600)
            .unwrap();

        assert!(signer.verify(&minted.token).is_err());
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let signer = signer();
        let minted = signer.mint("NEET2024001").unwrap();

        let other = TokenSigner::new("a-different-secret", TOKEN_TTL_SECS);
        assert!(other.verify(&minted.token).is_err());
    }

    #[test]
    fn test_tokens_have_unique_ids() {
        let signer = signer();
        let a = signer.mint("NEET2024001").unwrap();
        let b = signer.mint("NEET2024001").unwrap();

        let claims_a = signer.verify(&a.token).unwrap();
        let claims_b = signer.verify(&b.token).unwrap();
        assert_ne!(claims_a.jti, claims_b.jti);
    }
}
