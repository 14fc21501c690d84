// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Portal API client.
//!
//! Thin reqwest wrapper over the login and logout endpoints. Login errors
//! decode into [`ClientError`] so the CLI can render lockout countdowns and
//! attempts-remaining feedback; logout is fire-and-forget because local
//! cleanup must never be blocked by an unreachable server.

use std::time::Duration;

use serde::Deserialize;

use crate::auth::principals::Profile;

/// Default timeout for API requests (in seconds).
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Successful login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginSuccess {
    pub message: String,
    pub token: String,
    pub expires_in: u64,
    pub student: Profile,
}

/// Client-side view of a login failure.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// 400: malformed input.
    InvalidInput { message: String },
    /// 429: lockout active.
    RateLimited {
        message: String,
        remaining_seconds: u64,
    },
    /// 401: unknown identifier or wrong secret.
    InvalidCredentials { message: String },
    /// 5xx or an unexpected payload.
    Server { message: String },
    /// The request never reached the server.
    Network { message: String },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput { message }
            | Self::InvalidCredentials { message }
            | Self::Server { message } => write!(f, "{}", message),
            Self::RateLimited { message, .. } => write!(f, "{}", message),
            Self::Network { message } => write!(f, "Could not reach the portal server: {}", message),
        }
    }
}

impl std::error::Error for ClientError {}

/// Error body shape produced by the server.
#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error_type: String,
    message: String,
    #[serde(default)]
    remaining_seconds: Option<u64>,
}

/// HTTP client for the portal API.
pub struct PortalClient {
    base_url: String,
    client: reqwest::Client,
}

impl PortalClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Submit credentials. A non-2xx answer decodes into the matching
    /// [`ClientError`] variant.
    pub async fn login(
        &self,
        student_id: &str,
        password: &str,
    ) -> Result<LoginSuccess, ClientError> {
        let url = format!("{}/api/students/login", self.base_url);
        let body = serde_json::json!({
            "student_id": student_id,
            "password": password,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<LoginSuccess>()
                .await
                .map_err(|e| ClientError::Server {
                    message: format!("Unexpected login response: {}", e),
                });
        }

        let wire = response
            .json::<WireErrorResponse>()
            .await
            .map_err(|e| ClientError::Server {
                message: format!("Unexpected error response ({}): {}", status, e),
            })?;

        Err(match wire.error.error_type.as_str() {
            "invalid_input" => ClientError::InvalidInput {
                message: wire.error.message,
            },
            "rate_limited" => ClientError::RateLimited {
                message: wire.error.message,
                remaining_seconds: wire.error.remaining_seconds.unwrap_or(0),
            },
            "invalid_credentials" => ClientError::InvalidCredentials {
                message: wire.error.message,
            },
            _ => ClientError::Server {
                message: wire.error.message,
            },
        })
    }

    /// Best-effort logout notification. Failures are logged and swallowed;
    /// the caller clears local state regardless.
    pub async fn logout(&self, token: &str) {
        let url = format!("{}/api/students/logout", self.base_url);

        match self
            .client
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Server acknowledged logout");
            }
            Ok(response) => {
                tracing::warn!("Logout notification rejected: {}", response.status());
            }
            Err(e) => {
                tracing::warn!("Logout notification failed: {}", e);
            }
        }
    }

    /// Quick reachability probe against /health.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
