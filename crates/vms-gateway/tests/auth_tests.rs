//! Session lifecycle integration tests.
//!
//! Covers login/logout through the mock identity provider, session
//! validation on protected routes, and sliding refresh of the cookie.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use chrono::Utc;
use gateway_test_utils::{server_codec, TestGatewayServer, TestSessionBuilder};
use reqwest::{Client, Response};
use serde_json::json;
use vms_gateway::auth::SessionVerdict;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Token value carried by a `Set-Cookie` header.
fn cookie_token(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap()
}

fn idp_user(id: &str, role: &str, org: &str) -> serde_json::Value {
    json!({
        "id": id,
        "email": format!("{}@example.com", id),
        "name": "Dana Operator",
        "role": role,
        "organizationId": org,
        "avatarUrl": "https://cdn.example.com/a.png"
    })
}

// ============================================================================
// Login / logout
// ============================================================================

#[tokio::test]
async fn test_login_sets_session_cookie() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(header("authorization", "Bearer test-idp-key"))
        .and(body_json(json!({"email": "dana@example.com", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "user": idp_user("user-7", "admin", "org-1")
            })),
        )
        .expect(1)
        .mount(server.idp())
        .await;

    let response = Client::new()
        .post(format!("{}/api/auth/login", server.url()))
        .json(&json!({"email": "dana@example.com", "password": "pw"}))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let cookie = set_cookie(&response).expect("login must set the session cookie");
    assert!(cookie.starts_with("vms_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=300"));

    match server_codec().verify(&cookie_token(&cookie)) {
        SessionVerdict::Valid(claims) => {
            assert_eq!(claims.sub, "user-7");
            assert_eq!(claims.org_id, "org-1");
            assert_eq!(claims.exp - claims.iat, 300);
        }
        other => panic!("login issued an unusable token: {:?}", other),
    }

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(body["user"]["id"], "user-7");
    assert_eq!(body["user"]["avatarUrl"], "https://cdn.example.com/a.png");

    Ok(())
}

#[tokio::test]
async fn test_login_with_rejected_credentials_returns_401() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server.idp())
        .await;

    let response = Client::new()
        .post(format!("{}/api/auth/login", server.url()))
        .json(&json!({"email": "dana@example.com", "password": "wrong"}))
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert!(set_cookie(&response).is_none());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid email or password");
    assert_eq!(body["isAuthenticated"], false);

    Ok(())
}

#[tokio::test]
async fn test_login_with_blank_password_skips_idp() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server.idp())
        .await;

    let response = Client::new()
        .post(format!("{}/api/auth/login", server.url()))
        .json(&json!({"email": "dana@example.com", "password": ""}))
        .send()
        .await?;

    assert_eq!(response.status(), 400);

    Ok(())
}

#[tokio::test]
async fn test_login_with_mistyped_body_returns_json_400() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server.idp())
        .await;

    let response = Client::new()
        .post(format!("{}/api/auth/login", server.url()))
        .json(&json!({"email": 1, "password": "pw"}))
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["error"], "Invalid request body");

    Ok(())
}

#[tokio::test]
async fn test_logout_clears_cookie() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    let response = Client::new()
        .post(format!("{}/api/auth/logout", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let cookie = set_cookie(&response).expect("logout must clear the cookie");
    assert!(cookie.starts_with("vms_session=;"));
    assert!(cookie.contains("Max-Age=0"));

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["success"], true);

    Ok(())
}

// ============================================================================
// Session validation
// ============================================================================

#[tokio::test]
async fn test_missing_token_returns_401_without_cookie() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    let response = Client::new()
        .get(format!("{}/api/auth/session", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert!(set_cookie(&response).is_none());
    assert!(response.headers().get("www-authenticate").is_some());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert_eq!(body["isAuthenticated"], false);

    Ok(())
}

#[tokio::test]
async fn test_expired_token_returns_401_and_clears_cookie() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let token = TestSessionBuilder::new().expired_for(1).build();

    let response = Client::new()
        .get(format!("{}/api/auth/session", server.url()))
        .header("Cookie", server.session_cookie(&token))
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    let cookie = set_cookie(&response).expect("expired session must clear the cookie");
    assert!(cookie.contains("Max-Age=0"));

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"], "Session expired");

    Ok(())
}

#[tokio::test]
async fn test_forged_token_returns_401() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let token = TestSessionBuilder::admin().build_forged();

    let response = Client::new()
        .get(format!("{}/api/auth/session", server.url()))
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"], "Invalid session");

    Ok(())
}

#[tokio::test]
async fn test_session_accepts_cookie_transport() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let token = TestSessionBuilder::new().build();

    let response = Client::new()
        .get(format!("{}/api/auth/session", server.url()))
        .header("Cookie", format!("theme=dark; {}", server.session_cookie(&token)))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(body["user"]["id"], "user-1");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["organizationId"], "org-1");

    Ok(())
}

#[tokio::test]
async fn test_bearer_header_takes_precedence_over_cookie() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let token = TestSessionBuilder::new().build();

    let response = Client::new()
        .get(format!("{}/api/auth/session", server.url()))
        .bearer_auth(token)
        .header("Cookie", server.session_cookie("not-a-token"))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

// ============================================================================
// Sliding refresh
// ============================================================================

#[tokio::test]
async fn test_fresh_session_is_not_refreshed() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;
    let token = TestSessionBuilder::new().build();

    let response = Client::new()
        .get(format!("{}/api/auth/session", server.url()))
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert!(set_cookie(&response).is_none());

    Ok(())
}

#[tokio::test]
async fn test_session_near_expiry_is_refreshed() -> Result<()> {
    // TTL 300, threshold 0.2: refresh once less than 60 seconds remain
    let server = TestGatewayServer::spawn().await?;
    let builder = TestSessionBuilder::new().issued_ago(270);
    let old_exp = builder.expires_at();

    let response = Client::new()
        .get(format!("{}/api/auth/session", server.url()))
        .header("Cookie", server.session_cookie(&builder.build()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let cookie = set_cookie(&response).expect("near-expiry session must be refreshed");
    assert!(cookie.contains("Max-Age=300"));

    let now = Utc::now().timestamp();
    match server_codec().verify(&cookie_token(&cookie)) {
        SessionVerdict::Valid(claims) => {
            assert!(claims.exp > old_exp);
            assert!(claims.exp >= now + 298);
            assert_eq!(claims.sub, "user-1");
            assert_eq!(claims.org_id, "org-1");
        }
        other => panic!("refreshed token is unusable: {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_refresh_is_attached_to_handler_errors() -> Result<()> {
    // The guard passed; the handler's own failure still carries the refresh
    let server = TestGatewayServer::spawn().await?;
    let token = TestSessionBuilder::new().issued_ago(280).build();

    let response = Client::new()
        .get(format!("{}/api/nx/storages", server.url()))
        .bearer_auth(token)
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    assert!(set_cookie(&response).is_some_and(|c| c.contains("Max-Age=300")));

    Ok(())
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn test_me_returns_profile_from_idp() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    Mock::given(method("GET"))
        .and(path("/api/users/user-1"))
        .and(query_param("organizationId", "org-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(idp_user("user-1", "user", "org-1")))
        .expect(1)
        .mount(server.idp())
        .await;

    let response = Client::new()
        .get(format!("{}/api/auth/me", server.url()))
        .bearer_auth(TestSessionBuilder::new().build())
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["id"], "user-1");
    assert_eq!(body["user"]["name"], "Dana Operator");

    Ok(())
}

#[tokio::test]
async fn test_me_rejects_profile_from_other_org() -> Result<()> {
    let server = TestGatewayServer::spawn().await?;

    Mock::given(method("GET"))
        .and(path("/api/users/user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(idp_user("user-1", "user", "org-2")))
        .mount(server.idp())
        .await;

    let response = Client::new()
        .get(format!("{}/api/auth/me", server.url()))
        .bearer_auth(TestSessionBuilder::new().build())
        .send()
        .await?;

    assert_eq!(response.status(), 403);

    Ok(())
}
