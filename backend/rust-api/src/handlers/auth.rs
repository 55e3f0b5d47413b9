use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    metrics::{LOGIN_ATTEMPTS_TOTAL, USERS_REGISTERED_TOTAL},
    middlewares::auth::{JwtClaims, JwtService},
    models::{
        refresh_token::RefreshTokenResponse,
        user::{
            AuthResponseCookie, LoginRequest, RegisterRequest, UpdateWalletRequest, UserProfile,
        },
    },
    services::{auth_service::AuthService, AppState},
};

fn auth_service(state: &AppState) -> AuthService {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service)
}

fn refresh_cookie(state: &AppState, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build(("refresh_token", value))
        .path("/api/users")
        .http_only(true)
        .secure(state.config.cookie.secure)
        .same_site(state.config.cookie.parse_same_site())
        .max_age(max_age)
        .build()
}

/// POST /api/users/register - Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    tracing::info!("Registering new user: {}", req.username);

    let service = auth_service(&state);

    match service.register(req).await {
        Ok(response) => {
            tracing::info!("User registered successfully");
            USERS_REGISTERED_TOTAL.inc();

            // Set refresh_token as HTTP-only cookie
            let cookie = refresh_cookie(
                &state,
                response.refresh_token.clone(),
                time::Duration::days(30),
            );
            let jar = jar.add(cookie);

            // Return only access_token and user in JSON
            let response_body = AuthResponseCookie {
                access_token: response.access_token,
                user: response.user,
            };

            Ok((StatusCode::CREATED, jar, Json(response_body)))
        }
        Err(e) => {
            tracing::warn!("Failed to register user: {}", e);
            Err(ApiError::bad_request(e.to_string()))
        }
    }
}

/// POST /api/users/login - Login with username and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Login attempt for user: {}", req.username);

    let service = auth_service(&state);
    let username = req.username.clone();

    // Check if account is locked due to failed login attempts
    // Default to unlocked if the Redis check fails
    let is_locked = service
        .check_failed_attempts(&username)
        .await
        .unwrap_or(false);

    if is_locked {
        tracing::warn!("Login blocked for {}: too many failed attempts", username);
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["locked"]).inc();
        return Err(ApiError::too_many_requests(
            "Too many failed login attempts. Please try again later.",
        ));
    }

    match service.login(req).await {
        Ok(response) => {
            // Clear failed login attempts on successful login
            let _ = service.clear_failed_attempts(&username).await;
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();

            // Set refresh_token as HTTP-only cookie
            let cookie = refresh_cookie(
                &state,
                response.refresh_token.clone(),
                time::Duration::days(30),
            );
            let jar = jar.add(cookie);

            // Return only access_token and user in JSON
            let response_body = AuthResponseCookie {
                access_token: response.access_token,
                user: response.user,
            };

            Ok((StatusCode::OK, jar, Json(response_body)))
        }
        Err(e) => {
            // Increment failed login attempts counter
            let count = service
                .increment_failed_attempts(&username)
                .await
                .unwrap_or(0);
            tracing::warn!("Failed login attempts for {}: {}/5", username, count);
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();

            Err(ApiError::unauthorized(e.to_string()))
        }
    }
}

/// POST /api/users/refresh - Refresh access token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!("Refreshing access token");

    // Read refresh_token from HTTP-only cookie
    let refresh_token = jar
        .get("refresh_token")
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token cookie"))?;

    let service = auth_service(&state);

    match service.refresh_token(&refresh_token).await {
        Ok(access_token) => {
            tracing::debug!("Access token refreshed successfully");
            Ok((StatusCode::OK, Json(RefreshTokenResponse { access_token })))
        }
        Err(e) => {
            tracing::warn!("Failed to refresh token: {}", e);
            Err(ApiError::unauthorized(e.to_string()))
        }
    }
}

/// POST /api/users/logout - Logout (revoke refresh token)
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Logging out user");

    // Read refresh_token from HTTP-only cookie
    let refresh_token = jar
        .get("refresh_token")
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token cookie"))?;

    let service = auth_service(&state);

    // Revocation of an already revoked token is not an error worth
    // surfacing to the client
    if let Err(e) = service.logout(&refresh_token).await {
        tracing::warn!("Logout revocation: {}", e);
    }

    // Clear the refresh_token cookie
    let cookie = refresh_cookie(&state, String::new(), time::Duration::ZERO);
    let jar = jar.add(cookie);

    Ok((
        StatusCode::OK,
        jar,
        Json(serde_json::json!({
            "success": true,
            "message": "Logged out successfully"
        })),
    ))
}

/// GET /api/users/profile - Get current user profile (protected)
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!("Getting profile for user_id: {}", claims.sub);

    let service = auth_service(&state);

    match service.get_user_by_id(&claims.sub).await {
        Ok(user) => Ok((StatusCode::OK, Json(UserProfile::from(user)))),
        Err(e) => {
            tracing::warn!("Failed to get user: {}", e);
            Err(ApiError::not_found(e.to_string()))
        }
    }
}

/// POST /api/users/update-wallet - Link a wallet address (protected)
pub async fn update_wallet(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateWalletRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Updating wallet address for user_id: {}", claims.sub);

    let service = auth_service(&state);

    match service.update_wallet(&claims.sub, &req.wallet_address).await {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "message": "Wallet address updated",
                "wallet_address": req.wallet_address
            })),
        )),
        Err(e) => {
            tracing::warn!("Failed to update wallet: {}", e);
            Err(ApiError::bad_request(e.to_string()))
        }
    }
}
