// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Configuration.
//!
//! A JSON config file with serde defaults for every field, so a missing or
//! partial file still yields a runnable configuration. The JWT signing
//! secret deliberately never lives in the file: it is read from the
//! `PORTAL_JWT_SECRET` environment variable and the server refuses to start
//! without it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::token::TOKEN_TTL_SECS;
use crate::guard::{LOCKOUT_WINDOW_SECS, MAX_LOGIN_ATTEMPTS};
use crate::session::{SESSION_TIMEOUT_SECS, WARNING_WINDOW_SECS};

/// Environment variable holding the token signing secret.
pub const JWT_SECRET_ENV: &str = "PORTAL_JWT_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Defaults to 127.0.0.1; use 0.0.0.0 to expose on the network.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_login_attempts: usize,
    #[serde(default = "default_lockout_window")]
    pub lockout_window_secs: i64,
    #[serde(default = "default_roster_path")]
    pub roster_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_warning_window")]
    pub warning_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub session: SessionSection,
    /// Base URL the CLI client talks to.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_port() -> u16 {
    5000
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_token_ttl() -> u64 {
    TOKEN_TTL_SECS
}
fn default_max_attempts() -> usize {
    MAX_LOGIN_ATTEMPTS
}
fn default_lockout_window() -> i64 {
    LOCKOUT_WINDOW_SECS
}
fn default_roster_path() -> PathBuf {
    config_dir().join("roster.json")
}
fn default_session_timeout() -> u64 {
    SESSION_TIMEOUT_SECS
}
fn default_warning_window() -> u64 {
    WARNING_WINDOW_SECS
}
fn default_api_base() -> String {
    "http://127.0.0.1:5000".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl(),
            max_login_attempts: default_max_attempts(),
            lockout_window_secs: default_lockout_window(),
            roster_path: default_roster_path(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout(),
            warning_secs: default_warning_window(),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            auth: AuthSection::default(),
            session: SessionSection::default(),
            api_base: default_api_base(),
        }
    }
}

/// Directory holding the config, roster, and session state files.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".portalguard")
}

impl PortalConfig {
    /// Load configuration from the given path, or the default location. A
    /// missing file yields the defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| config_dir().join("config.json"));

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&content).context("Config file is not valid JSON")?;

        // A warning window at or above the timeout would make the warning
        // threshold nonsensical.
        if config.session.warning_secs >= config.session.timeout_secs {
            anyhow::bail!(
                "session.warning_secs ({}) must be smaller than session.timeout_secs ({})",
                config.session.warning_secs,
                config.session.timeout_secs
            );
        }

        Ok(config)
    }

    /// Read the token signing secret from the environment.
    pub fn jwt_secret() -> Result<String> {
        std::env::var(JWT_SECRET_ENV).map_err(|_| {
            anyhow::anyhow!(
                "{} environment variable is required to sign tokens",
                JWT_SECRET_ENV
            )
        })
    }
}
