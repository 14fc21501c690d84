// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! portalguard - Student portal authentication library
//!
//! Login rate limiting, signed token issuance, and client-side session
//! lifecycle management for a coaching-institute student portal.
//!
//! The server side tracks failed login attempts per student identifier and
//! enforces a 5-attempts / 5-minute rolling lockout before verifying
//! credentials and minting an 8-hour bearer token. The client side monitors
//! session inactivity, warns 5 minutes before the 30-minute timeout, and
//! forces a local logout when the warning runs out.
//!
//! # Core Modules
//!
//! - [`guard`] - Per-identifier failed-attempt tracking and lockout policy
//! - [`auth`] - Credential verification, principal lookup, token issuance
//! - [`server`] - HTTP API (login, logout, health)
//! - [`session`] - Client-side session lifecycle monitor and local state
//! - [`client`] - Portal API client for the CLI front end
//! - [`errors`] - API error taxonomy and sanitized internal logging
//! - [`config`] - File + environment configuration

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod guard;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use auth::{
    principals::{Principal, PrincipalStore, Profile, RosterStore},
    token::{Claims, MintedToken, TokenSigner, TOKEN_TTL_SECS},
    AuthService, LoginOutcome,
};
pub use client::{ClientError, LoginSuccess, PortalClient};
pub use config::{PortalConfig, JWT_SECRET_ENV};
pub use errors::{ApiResult, AuthError, ErrorResponse};
pub use guard::{AttemptGuard, BlockStatus, LOCKOUT_WINDOW_SECS, MAX_LOGIN_ATTEMPTS};
pub use server::Server;
pub use session::{
    store::{SessionState, SessionStore, StoredSession},
    ExpiryCause, MonitorEvent, MonitorState, SessionConfig, SessionMonitor,
    ACTIVITY_DEBOUNCE_MS, SESSION_TIMEOUT_SECS, WARNING_WINDOW_SECS,
};
