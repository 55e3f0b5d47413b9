// Rate limiting verification tests
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

/// Helper to flush Redis rate limit keys before test
async fn flush_rate_limit_keys() {
    let redis_uri =
        std::env::var("REDIS_URI").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());
    let client = redis::Client::open(redis_uri).expect("Failed to connect to Redis for cleanup");
    let mut conn = client
        .get_connection_manager()
        .await
        .expect("Failed to get Redis connection");

    // Delete all ratelimit:* keys
    let keys: Vec<String> = redis::cmd("KEYS")
        .arg("ratelimit:*")
        .query_async(&mut conn)
        .await
        .unwrap_or_default();

    if !keys.is_empty() {
        let _: () = redis::cmd("DEL")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .expect("Failed to delete rate limit keys");
        eprintln!("Flushed {} rate limit keys from Redis", keys.len());
    }

    // Also flush failed_login:* lockout counters
    let failed_keys: Vec<String> = redis::cmd("KEYS")
        .arg("failed_login:*")
        .query_async(&mut conn)
        .await
        .unwrap_or_default();

    if !failed_keys.is_empty() {
        let _: () = redis::cmd("DEL")
            .arg(&failed_keys)
            .query_async(&mut conn)
            .await
            .expect("Failed to delete failed login keys");
        eprintln!("Flushed {} failed login keys from Redis", failed_keys.len());
    }
}

/// Helper to make a login request with custom IP header
async fn login_with_ip(app: &axum::Router, username: &str, password: &str, ip: &str) -> StatusCode {
    let request_body = json!({
        "username": username,
        "password": password,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users/login")
                .header("content-type", "application/json")
                .header("x-forwarded-for", ip)
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    response.status()
}

/// Helper to make a register request with custom IP header
async fn register_with_ip(app: &axum::Router, username: &str, ip: &str) -> StatusCode {
    let request_body = json!({
        "username": username,
        "email": format!("{}@example.com", username),
        "password": "ValidPassword123!",
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users/register")
                .header("content-type", "application/json")
                .header("x-forwarded-for", ip)
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    response.status()
}

/// Test login rate limiting (10 attempts per 5 min per IP)
/// NOTE: Tests IP-based rate limiting, not the per-user failed login lockout
#[tokio::test]
#[serial_test::serial]
async fn test_login_rate_limiting_per_ip() {
    flush_rate_limit_keys().await;

    std::env::set_var("RATE_LIMIT_LOGIN_ATTEMPTS", "10");
    std::env::set_var("RATE_LIMIT_DISABLED", "0");

    let app = common::create_test_app().await;
    let test_ip = "192.168.1.100";
    let timestamp = chrono::Utc::now().timestamp();

    // Register 11 different users from DIFFERENT IPs to avoid register rate limiting.
    // Using a different user per login keeps the per-user lockout counter at 1.
    for i in 0..11 {
        let username = format!("rate-login-{}-{}", timestamp, i);
        let register_ip = format!("192.168.1.{}", 150 + i);
        let status = register_with_ip(&app, &username, &register_ip).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Attempt 10 logins from same IP with DIFFERENT users (wrong password)
    for i in 0..10 {
        let username = format!("rate-login-{}-{}", timestamp, i);
        let status = login_with_ip(&app, &username, "WrongPassword", test_ip).await;
        assert_eq!(
            status,
            StatusCode::UNAUTHORIZED,
            "Login attempt {} should be allowed (within rate limit of 10), got status: {}",
            i + 1,
            status
        );
    }

    // 11th attempt should be rate limited (429 Too Many Requests)
    let username = format!("rate-login-{}-10", timestamp);
    let status = login_with_ip(&app, &username, "WrongPassword", test_ip).await;
    assert_eq!(
        status,
        StatusCode::TOO_MANY_REQUESTS,
        "11th login attempt should be rate limited"
    );

    // Request from different IP should still work
    let different_ip = "192.168.1.101";
    let username = format!("rate-login-{}-0", timestamp);
    let status = login_with_ip(&app, &username, "WrongPassword", different_ip).await;
    assert_eq!(
        status,
        StatusCode::UNAUTHORIZED,
        "Login from different IP should not be rate limited"
    );
}

/// Test register rate limiting (5 attempts per hour per IP)
#[tokio::test]
#[serial_test::serial]
async fn test_register_rate_limiting_per_ip() {
    flush_rate_limit_keys().await;

    std::env::set_var("RATE_LIMIT_REGISTER_ATTEMPTS", "5");
    std::env::set_var("RATE_LIMIT_DISABLED", "0");

    let app = common::create_test_app().await;
    let test_ip = "192.168.2.100";
    let timestamp = chrono::Utc::now().timestamp();

    // Attempt 5 registrations (all should succeed)
    for i in 0..5 {
        let username = format!("rate-register-{}-{}", timestamp, i);
        let status = register_with_ip(&app, &username, test_ip).await;
        assert_eq!(
            status,
            StatusCode::CREATED,
            "Registration attempt {} should succeed (within rate limit of 5)",
            i + 1
        );
    }

    // 6th registration should be rate limited (429 Too Many Requests)
    let username = format!("rate-register-{}-extra", timestamp);
    let status = register_with_ip(&app, &username, test_ip).await;
    assert_eq!(
        status,
        StatusCode::TOO_MANY_REQUESTS,
        "6th registration attempt should be rate limited"
    );

    // Request from different IP should still work
    let different_ip = "192.168.2.101";
    let username = format!("rate-register-{}-other", timestamp);
    let status = register_with_ip(&app, &username, different_ip).await;
    assert_eq!(
        status,
        StatusCode::CREATED,
        "Registration from different IP should not be rate limited"
    );
}

/// Test rate limiter with concurrent requests
#[tokio::test]
#[serial_test::serial]
async fn test_concurrent_login_requests_rate_limiting() {
    flush_rate_limit_keys().await;

    std::env::set_var("RATE_LIMIT_LOGIN_ATTEMPTS", "10");
    std::env::set_var("RATE_LIMIT_DISABLED", "0");

    let app = common::create_test_app().await;
    let timestamp = chrono::Utc::now().timestamp();
    let test_ip = "192.168.4.100";

    // One user per request so the per-user lockout never triggers here
    for i in 0..20 {
        let username = format!("concurrent-login-{}-{}", timestamp, i);
        let register_ip = format!("192.168.4.{}", 110 + i);
        let status = register_with_ip(&app, &username, &register_ip).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Spawn 20 concurrent login requests from the same IP
    let mut handles = vec![];
    for i in 0..20 {
        let app_clone = app.clone();
        let username = format!("concurrent-login-{}-{}", timestamp, i);
        let ip_clone = test_ip.to_string();

        let handle = tokio::spawn(async move {
            login_with_ip(&app_clone, &username, "WrongPassword", &ip_clone).await
        });
        handles.push(handle);
    }

    let mut results = vec![];
    for handle in handles {
        let status = handle.await.unwrap();
        results.push(status);
    }

    let unauthorized_count = results
        .iter()
        .filter(|&&s| s == StatusCode::UNAUTHORIZED)
        .count();
    let rate_limited_count = results
        .iter()
        .filter(|&&s| s == StatusCode::TOO_MANY_REQUESTS)
        .count();

    eprintln!(
        "Concurrent test results: {} unauthorized, {} rate limited",
        unauthorized_count, rate_limited_count
    );

    // With limit of 10, expect ~10 requests through (401) and ~10 rejected (429).
    // The Lua script is atomic, but allow some margin for the window boundary.
    assert!(
        (8..=12).contains(&unauthorized_count),
        "Expected ~10 requests within rate limit, got {}",
        unauthorized_count
    );
    assert!(
        (8..=12).contains(&rate_limited_count),
        "Expected ~10 requests rate limited, got {}",
        rate_limited_count
    );
    assert_eq!(
        unauthorized_count + rate_limited_count,
        20,
        "All 20 requests should be accounted for"
    );
}

/// Test that rate limits can be disabled via environment variable
#[tokio::test]
#[serial_test::serial]
async fn test_rate_limiting_can_be_disabled() {
    flush_rate_limit_keys().await;

    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    let app = common::create_test_app().await;
    let timestamp = chrono::Utc::now().timestamp();
    let test_ip = "192.168.6.100";

    // Different users so the per-user lockout (5 failed attempts) stays out of the way
    for i in 0..20 {
        let username = format!("no-limit-{}-{}", timestamp, i);
        let register_ip = format!("192.168.6.{}", 100 + i);
        let status = register_with_ip(&app, &username, &register_ip).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // With rate limiting disabled, all 20 logins from one IP get 401 (wrong password), not 429
    for i in 0..20 {
        let username = format!("no-limit-{}-{}", timestamp, i);
        let status = login_with_ip(&app, &username, "WrongPassword", test_ip).await;
        assert_eq!(
            status,
            StatusCode::UNAUTHORIZED,
            "Login attempt {} should not be rate limited when RATE_LIMIT_DISABLED=1",
            i + 1
        );
    }

    // Re-enable rate limiting for other tests
    std::env::set_var("RATE_LIMIT_DISABLED", "0");
}

/// Test rate limit window expiration
#[tokio::test]
#[serial_test::serial]
#[ignore] // Requires waiting out the 5 minute login window (slow test)
async fn test_rate_limit_window_expiration() {
    flush_rate_limit_keys().await;

    std::env::set_var("RATE_LIMIT_LOGIN_ATTEMPTS", "3"); // Lower limit for faster test
    std::env::set_var("RATE_LIMIT_DISABLED", "0");

    let app = common::create_test_app().await;
    let timestamp = chrono::Utc::now().timestamp();
    let test_ip = "192.168.7.100";

    // Different users per attempt so the per-user lockout never interferes
    for i in 0..4 {
        let username = format!("window-{}-{}", timestamp, i);
        let register_ip = format!("192.168.7.{}", 110 + i);
        let status = register_with_ip(&app, &username, &register_ip).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Exhaust rate limit (3 attempts)
    for i in 0..3 {
        let username = format!("window-{}-{}", timestamp, i);
        let status = login_with_ip(&app, &username, "WrongPassword", test_ip).await;
        assert_eq!(
            status,
            StatusCode::UNAUTHORIZED,
            "Attempt {} should be allowed",
            i + 1
        );
    }

    // 4th attempt should be rate limited
    let username = format!("window-{}-3", timestamp);
    let status = login_with_ip(&app, &username, "WrongPassword", test_ip).await;
    assert_eq!(
        status,
        StatusCode::TOO_MANY_REQUESTS,
        "Should be rate limited"
    );

    // Wait for the 5 minute login window to expire
    eprintln!("Waiting for rate limit window to expire (this test is slow)...");
    tokio::time::sleep(tokio::time::Duration::from_secs(310)).await;

    let status = login_with_ip(&app, &username, "WrongPassword", test_ip).await;
    assert_eq!(
        status,
        StatusCode::UNAUTHORIZED,
        "After window expiration, rate limit should reset (expected 401, got {})",
        status
    );
}
