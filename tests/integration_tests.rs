//! Integration tests for the portalguard server
//!
//! These tests verify the full request flow works correctly by hitting the live server.
//! They are marked with #[ignore] so they don't run in CI without a server running.
//!
//! To run these tests:
//! 1. Export a signing secret: export PORTAL_JWT_SECRET=test-secret
//! 2. Seed a roster entry for NEET2024001 with password pass1234
//! 3. Start the server: portalguard serve
//! 4. Run tests with: cargo test --test integration_tests -- --ignored

use reqwest::Client;
use serde_json::{json, Value};

const BASE: &str = "http://localhost:5000";

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_health_endpoint() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let response = client.get(format!("{}/health", BASE)).send().await?;

    assert_eq!(response.status(), 200);

    let json: Value = response.json().await?;
    assert_eq!(json["status"].as_str(), Some("ok"));
    assert!(json.get("version").is_some());

    Ok(())
}

// =============================================================================
// Login Endpoint Tests
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_login_with_wrong_password() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let response = client
        .post(format!("{}/api/students/login", BASE))
        .json(&json!({ "student_id": "NEET2024001", "password": "definitely-wrong" }))
        .send()
        .await?;

    assert_eq!(response.status(), 401);

    let json: Value = response.json().await?;
    assert_eq!(json["error"]["error_type"].as_str(), Some("invalid_credentials"));
    assert_eq!(json["error"]["message"].as_str(), Some("Invalid credentials"));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_login_rejects_short_identifier() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let response = client
        .post(format!("{}/api/students/login", BASE))
        .json(&json!({ "student_id": "ab", "password": "pass1234" }))
        .send()
        .await?;

    assert_eq!(response.status(), 400);

    let json: Value = response.json().await?;
    assert_eq!(json["error"]["error_type"].as_str(), Some("invalid_input"));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_lockout_after_repeated_failures() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();

    // Burn the attempt budget for a throwaway identifier.
    let mut last_status = 0;
    let mut last_body = Value::Null;
    for _ in 0..6 {
        let response = client
            .post(format!("{}/api/students/login", BASE))
            .json(&json!({ "student_id": "LOCKTEST001", "password": "wrong-pass" }))
            .send()
            .await?;
        last_status = response.status().as_u16();
        last_body = response.json().await?;
    }

    assert_eq!(last_status, 429);
    assert_eq!(last_body["error"]["error_type"].as_str(), Some("rate_limited"));
    let remaining = last_body["error"]["remaining_seconds"].as_u64().unwrap();
    assert!(remaining > 0 && remaining <= 300);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_successful_login_returns_token_and_profile() -> Result<(), Box<dyn std::error::Error>>
{
    let client = Client::new();
    let response = client
        .post(format!("{}/api/students/login", BASE))
        .json(&json!({ "student_id": "NEET2024001", "password": "pass1234" }))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let json: Value = response.json().await?;
    assert!(json["token"].as_str().is_some());
    assert_eq!(json["expires_in"].as_u64(), Some(28800));
    assert_eq!(json["student"]["student_id"].as_str(), Some("NEET2024001"));
    assert!(json["student"].get("password_hash").is_none());

    Ok(())
}

// =============================================================================
// Logout Endpoint Tests
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_logout_requires_bearer_token() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let response = client
        .post(format!("{}/api/students/logout", BASE))
        .send()
        .await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_login_then_logout() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let login: Value = client
        .post(format!("{}/api/students/login", BASE))
        .json(&json!({ "student_id": "NEET2024001", "password": "pass1234" }))
        .send()
        .await?
        .json()
        .await?;

    let token = login["token"].as_str().expect("login should return a token");

    let response = client
        .post(format!("{}/api/students/logout", BASE))
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let json: Value = response.json().await?;
    assert_eq!(json["message"].as_str(), Some("Logged out successfully"));

    Ok(())
}
