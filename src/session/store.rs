// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Local session state persistence.
//!
//! The client keeps its session material in a single JSON state file under
//! the user's home directory: the bearer token, the public profile, the
//! login and last-activity timestamps, and optionally a remembered
//! identifier. The secret is never written anywhere.
//!
//! Writes take an exclusive file lock so a watch loop and a CLI command
//! touching the state concurrently cannot interleave partial writes.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::auth::principals::Profile;

/// Session material stored after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub profile: Profile,
    /// Login instant, milliseconds since epoch.
    pub login_at_ms: i64,
    /// Last recognized activity, milliseconds since epoch.
    pub last_activity_ms: i64,
}

/// Everything the client persists locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<StoredSession>,
    /// "Remember me" keeps only the identifier, never the secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remembered_student_id: Option<String>,
}

/// File-backed store for [`SessionState`].
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store at the default location, `~/.portalguard/session.json`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(Self::at_path(home.join(".portalguard").join("session.json")))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the persisted state. A missing file is an empty state, not an
    /// error.
    pub fn load(&self) -> Result<SessionState> {
        if !self.path.exists() {
            return Ok(SessionState::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Could not read session state {}", self.path.display()))?;
        serde_json::from_str(&content).context("Session state file is corrupt")
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(state)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs2::FileExt::unlock(&file)?;
        Ok(())
    }

    /// Persist a fresh login. When `remember` is set the identifier (only)
    /// is kept for pre-filling the next login; otherwise any previously
    /// remembered identifier is dropped.
    pub fn save_login(
        &self,
        token: &str,
        profile: &Profile,
        login_at_ms: i64,
        remember: bool,
    ) -> Result<()> {
        let mut state = self.load().unwrap_or_default();
        state.session = Some(StoredSession {
            token: token.to_string(),
            profile: profile.clone(),
            login_at_ms,
            last_activity_ms: login_at_ms,
        });
        state.remembered_student_id = if remember {
            Some(profile.student_id.clone())
        } else {
            None
        };
        self.save(&state)
    }

    /// Update the last-activity timestamp of the current session.
    pub fn touch_activity(&self, now_ms: i64) -> Result<()> {
        let mut state = self.load()?;
        if let Some(session) = state.session.as_mut() {
            session.last_activity_ms = now_ms;
            self.save(&state)?;
        }
        Ok(())
    }

    /// Drop the session material but keep any remembered identifier.
    pub fn clear_session(&self) -> Result<()> {
        let mut state = self.load().unwrap_or_default();
        state.session = None;
        self.save(&state)
    }

    pub fn remember_identifier(&self, identifier: &str) -> Result<()> {
        let mut state = self.load().unwrap_or_default();
        state.remembered_student_id = Some(identifier.to_string());
        self.save(&state)
    }

    pub fn forget_identifier(&self) -> Result<()> {
        let mut state = self.load().unwrap_or_default();
        state.remembered_student_id = None;
        self.save(&state)
    }

    /// Whether a session is currently stored. Token validity is the
    /// server's call; this only reports local presence.
    pub fn is_authenticated(&self) -> bool {
        self.load()
            .map(|state| state.session.is_some())
            .unwrap_or(false)
    }
}

// ============================================================================
// TESTS
// ============================================================================
