//! API server
//!
//! Provides the HTTP API for the student portal authentication flow.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/students/login` - Authenticate and receive a bearer token
//! - `POST /api/students/logout` - Best-effort logout (bearer token)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use portalguard::auth::{principals::RosterStore, token::TokenSigner, AuthService};
//! use portalguard::guard::AttemptGuard;
//! use portalguard::server::Server;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let auth = AuthService::new(
//!     Arc::new(RosterStore::from_principals(vec![])),
//!     AttemptGuard::default(),
//!     TokenSigner::new("secret", 28_800),
//! );
//! let server = Server::new(5000);
//! server.start(auth).await?;
//! # Ok(())
//! # }
//! ```

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
    GovernorLayer,
};
use tower_http::timeout::TimeoutLayer;

use crate::auth::principals::Profile;
use crate::auth::AuthService;
use crate::errors::AuthError;

// Maximum request body size. Login payloads are tiny; anything bigger is not
// a login request.
const MAX_BODY_SIZE: usize = 64 * 1024;
// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Server state shared across handlers.
pub struct AppState {
    /// Authentication service: guard, principal store, and token signer.
    pub auth: AuthService,
}

/// API server configuration.
#[derive(Debug)]
pub struct Server {
    /// Port to listen on.
    port: u16,
    /// Address to bind to (defaults to 127.0.0.1 for security).
    bind_address: String,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(5000)
    }
}

impl Server {
    /// Create a new server with the specified port.
    /// By default, binds to 127.0.0.1 (localhost only) for security.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            bind_address: "127.0.0.1".to_string(),
        }
    }

    /// Set the bind address.
    /// Use "0.0.0.0" to allow network access, "127.0.0.1" (default) for localhost only.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Build the router with all routes.
    pub fn build_router(&self, auth: AuthService) -> Router {
        let state = Arc::new(AppState { auth });

        // Outer, IP-keyed rate limiting: 60 requests per minute per IP. The
        // per-identifier lockout inside AuthService is the real guard; this
        // layer only blunts indiscriminate hammering.
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(1)
                .burst_size(60)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .expect("Failed to build governor config"),
        );

        Router::new()
            .route("/health", get(health_handler))
            .route("/api/students/login", post(login_handler))
            .route("/api/students/logout", post(logout_handler))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .layer(GovernorLayer {
                config: governor_conf,
            })
            .with_state(state)
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self, auth: AuthService) -> Result<()> {
        let router = self.build_router(auth);
        let addr = format!("{}:{}", self.bind_address, self.port);

        tracing::info!("Starting portal server on {}", addr);

        // Security warning if binding to all interfaces
        if self.bind_address == "0.0.0.0" {
            tracing::warn!(
                "Server is binding to 0.0.0.0 which exposes the API to the network. \
                Use 127.0.0.1 (default) for local-only access."
            );
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Port {} is already in use. This usually means another portalguard \
                    server is running. Try stopping other instances or use a different \
                    port with: portalguard serve --port <PORT>",
                    self.port
                )
            } else {
                anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
            }
        })?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Login request body.
///
/// Both fields default to empty so shape validation happens in one place
/// (the auth service) instead of partly in the JSON extractor.
#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    student_id: String,
    #[serde(default)]
    password: String,
}

/// Login success response.
#[derive(Serialize)]
struct LoginResponse {
    message: &'static str,
    token: String,
    expires_in: u64,
    student: Profile,
}

/// Logout response.
#[derive(Serialize)]
struct LogoutResponse {
    message: &'static str,
}

// =============================================================================
// Bearer Token Extraction
// =============================================================================

/// Authenticated student extracted from the Authorization header.
pub struct AuthStudent {
    pub student_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthStudent {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Access denied"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Access denied"))?;

        let claims = state
            .auth
            .verify_token(token)
            .ok_or_else(|| unauthorized("Invalid token"))?;

        Ok(AuthStudent {
            student_id: claims.sub,
        })
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Login handler. All policy lives in the auth service; this only translates
/// between HTTP and the service contract. Password verification is CPU-bound
/// argon2 work, so it runs on the blocking pool.
async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let worker_state = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || {
        worker_state
            .auth
            .login(&request.student_id, &request.password)
    })
    .await
    .map_err(|e| AuthError::internal_error(&format!("Login task failed: {e}")))??;

    Ok(Json(LoginResponse {
        message: "Login successful",
        token: outcome.token,
        expires_in: outcome.expires_in_secs,
        student: outcome.profile,
    }))
}

/// Logout handler. Clears the caller's attempt record; best-effort by
/// design, so it always succeeds once the bearer token checks out.
async fn logout_handler(
    student: AuthStudent,
    State(state): State<Arc<AppState>>,
) -> Json<LogoutResponse> {
    state.auth.logout(&student.student_id);

    Json(LogoutResponse {
        message: "Logged out successfully",
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    // On Unix, listen for SIGINT and SIGTERM
    // On Windows, fall back to Ctrl+C only
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt())
            .expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
    }

    tracing::info!("Shutting down portal server");
}
