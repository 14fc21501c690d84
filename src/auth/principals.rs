// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Principal lookup.
//!
//! The principal store is an external collaborator behind a trait; the
//! in-process [`RosterStore`] loads a JSON roster file and serves lookups
//! from memory. Inactive principals are treated as absent, so callers cannot
//! tell a deactivated account from one that never existed.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// An account known to the portal. The stored secret is an argon2 PHC hash;
/// it never leaves this struct except through [`Principal::profile`], which
/// excludes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub student_id: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course: String,
    pub batch: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Principal {
    /// Public profile fields returned to the client after login. Never
    /// includes the password hash.
    pub fn profile(&self) -> Profile {
        Profile {
            student_id: self.student_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            course: self.course.clone(),
            batch: self.batch.clone(),
        }
    }
}

/// Minimal public profile for the login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course: String,
    pub batch: String,
}

/// Lookup contract for the account store.
pub trait PrincipalStore: Send + Sync {
    /// Find an active principal by identifier. Inactive or unknown
    /// identifiers both return `None`.
    fn find_by_identifier(&self, identifier: &str) -> Option<Principal>;
}

/// In-memory store loaded from a JSON roster file.
pub struct RosterStore {
    principals: HashMap<String, Principal>,
}

impl RosterStore {
    /// Load a roster from a JSON array of principals.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read roster file {}", path.display()))?;
        let principals: Vec<Principal> =
            serde_json::from_str(&content).context("Roster file is not a valid principal list")?;

        tracing::info!(
            count = principals.len(),
            "Loaded principal roster from {}",
            path.display()
        );

        Ok(Self::from_principals(principals))
    }

    pub fn from_principals(principals: Vec<Principal>) -> Self {
        let principals = principals
            .into_iter()
            .map(|p| (p.student_id.clone(), p))
            .collect();
        Self { principals }
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

impl PrincipalStore for RosterStore {
    fn find_by_identifier(&self, identifier: &str) -> Option<Principal> {
        self.principals
            .get(identifier)
            .filter(|p| p.is_active)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(student_id: &str, hash: &str) -> Principal {
        Principal {
            student_id: student_id.to_string(),
            password_hash: hash.to_string(),
            first_name: "Asha".to_string(),
            last_name: "Verma".to_string(),
            email: "asha.verma@example.org".to_string(),
            course: "NEET".to_string(),
            batch: "2024-A".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_lookup_finds_active_principal() {
        let store = RosterStore::from_principals(vec![principal("NEET2024001", "hash")]);
        assert!(store.find_by_identifier("NEET2024001").is_some());
        assert!(store.find_by_identifier("NEET2024999").is_none());
    }

    #[test]
    fn test_inactive_principal_is_absent() {
        let mut p = principal("NEET2024001", "hash");
        p.is_active = false;
        let store = RosterStore::from_principals(vec![p]);
        assert!(store.find_by_identifier("NEET2024001").is_none());
    }

    #[test]
    fn test_profile_excludes_password_hash() {
        let p = principal("NEET2024001", "super-secret-hash");
        let json = serde_json::to_string(&p.profile()).unwrap();
        assert!(!json.contains("super-secret-hash"));
        assert!(json.contains("NEET2024001"));
    }

    #[test]
    fn test_roster_roundtrip_through_json() {
        let roster = vec![principal("NEET2024001", "hash-a"), principal("NEET2024002", "hash-b")];
        let json = serde_json::to_string_pretty(&roster).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, json).unwrap();

        let store = RosterStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.find_by_identifier("NEET2024002").is_some());
    }
}
