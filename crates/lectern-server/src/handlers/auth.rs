// File: src/handlers/auth.rs
// Purpose: Registration, login, password reset, OAuth sign-in and session endpoints

use axum::{
    extract::State,
    http::{
        header::AUTHORIZATION,
        HeaderName, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use lectern::auth::{
    self, otp, password, users,
    users::EMAIL_PASSWORD,
    validate::{require, require_email},
    NewUser, OtpPurpose, Provider, TempUser, User,
};
use lectern::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;

use crate::extract::{AuthUser, JsonBody};
use crate::handlers::message;
use crate::state::AppState;

pub const LOGIN_FAILED: &str = "Invalid email or password";
pub const USER_NOT_FOUND: &str = "User not found";

// ============================================================================
// REQUEST BODIES
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RegisterBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country_code: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmailBody {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtpBody {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetBody {
    pub email: Option<String>,
    pub otp: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OAuthBody {
    pub access_token: Option<String>,
}

/// Trimmed required field; call after `require` has vetted it
fn field(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}

/// Respond with `body` and the session token in both auth headers.
///
/// The CORS layer exposes both headers to browsers.
fn with_token(token: &str, body: impl IntoResponse) -> Response {
    (
        [
            (AUTHORIZATION, format!("Bearer {token}")),
            (HeaderName::from_static("x-auth-token"), token.to_string()),
        ],
        body,
    )
        .into_response()
}

// ============================================================================
// REGISTRATION
// ============================================================================

/// Handler for POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterBody>,
) -> AppResult<(StatusCode, Json<TempUser>)> {
    require(&[
        body.name.as_deref(),
        body.email.as_deref(),
        body.phone.as_deref(),
        body.country_code.as_deref(),
        body.password.as_deref(),
    ])?;
    let email = require_email(body.email.as_deref())?;

    let new_user = NewUser {
        name: field(body.name.as_deref()),
        email: email.clone(),
        country_code: Some(field(body.country_code.as_deref())),
        phone: Some(field(body.phone.as_deref())),
        password: Some(password::hash_password(&field(body.password.as_deref()))?),
        registration_type: EMAIL_PASSWORD.to_string(),
    };
    let temp = users::store_temp_user(&state.stores.library, &new_user).await?;

    auth::send_otp(
        &state.stores.library,
        state.mailer.as_ref(),
        state.otp_policy(),
        &state.config.mail,
        &email,
        OtpPurpose::Registration,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(temp)))
}

/// Handler for POST /auth/register/verify-otp
///
/// Consumes the code and promotes the pending sign-up to a confirmed user.
pub async fn verify_registration(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<OtpBody>,
) -> AppResult<Json<User>> {
    require(&[body.email.as_deref(), body.otp.as_deref()])?;
    let email = require_email(body.email.as_deref())?;

    otp::consume(&state.stores.library, state.otp_policy(), &email, &field(body.otp.as_deref())).await?;
    let temp = users::temp_user_by_email(&state.stores.library, &email)
        .await?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;

    let user = users::ensure_user(&state.stores.catalog, &NewUser::from(temp)).await?;
    users::delete_temp_user(&state.stores.library, &email).await?;
    Ok(Json(user))
}

/// Handler for POST /auth/register/resend-otp
pub async fn resend_registration(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EmailBody>,
) -> AppResult<Json<Value>> {
    let email = require_email(body.email.as_deref())?;
    let policy = state.otp_policy();

    otp::ensure_can_resend(&state.stores.library, policy, &email).await?;
    auth::send_otp(
        &state.stores.library,
        state.mailer.as_ref(),
        policy,
        &state.config.mail,
        &email,
        OtpPurpose::Registration,
    )
    .await?;
    Ok(message("OTP resent successfully"))
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Handler for POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginBody>,
) -> AppResult<Response> {
    require(&[body.email.as_deref(), body.password.as_deref()])?;
    let email = field(body.email.as_deref()).to_lowercase();

    let user = users::user_by_email(&state.stores.catalog, &email)
        .await?
        .ok_or_else(|| AppError::unauthorized(LOGIN_FAILED))?;
    let matches = user
        .password
        .as_deref()
        .is_some_and(|stored| password::verify_password(&field(body.password.as_deref()), stored));
    if !matches {
        return Err(AppError::unauthorized(LOGIN_FAILED));
    }

    let token = state.tokens.issue(user.id)?;
    tracing::info!(user_id = user.id, "user logged in");
    Ok(with_token(&token, Json(user)))
}

/// Handler for POST /auth/logout
///
/// Tokens are stateless; the response clears the client's copy.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Response> {
    users::user_by_id(&state.stores.catalog, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;
    Ok(with_token("null", message("Logout successful")))
}

/// Handler for GET /auth/me
pub async fn me(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> AppResult<Json<User>> {
    users::user_by_id(&state.stores.catalog, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))
}

// ============================================================================
// PASSWORD RESET
// ============================================================================

/// Handler for POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EmailBody>,
) -> AppResult<Json<Value>> {
    let email = require_email(body.email.as_deref())?;
    users::user_by_email(&state.stores.catalog, &email)
        .await?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;

    auth::send_otp(
        &state.stores.library,
        state.mailer.as_ref(),
        state.otp_policy(),
        &state.config.mail,
        &email,
        OtpPurpose::PasswordReset,
    )
    .await?;
    Ok(message("OTP sent successfully"))
}

/// Handler for POST /auth/forgot-password/verify-otp
///
/// Only checks the code; it stays valid for the reset step.
pub async fn verify_reset(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<OtpBody>,
) -> AppResult<Json<Value>> {
    require(&[body.email.as_deref(), body.otp.as_deref()])?;
    let email = require_email(body.email.as_deref())?;

    otp::verify(&state.stores.library, state.otp_policy(), &email, &field(body.otp.as_deref())).await?;
    Ok(message("OTP verified successfully"))
}

/// Handler for POST /auth/forgot-password/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ResetBody>,
) -> AppResult<Json<Value>> {
    require(&[
        body.email.as_deref(),
        body.otp.as_deref(),
        body.new_password.as_deref(),
    ])?;
    let email = require_email(body.email.as_deref())?;

    otp::consume(&state.stores.library, state.otp_policy(), &email, &field(body.otp.as_deref())).await?;
    let hash = password::hash_password(&field(body.new_password.as_deref()))?;
    users::set_password(&state.stores.catalog, &email, &hash).await?;
    users::delete_temp_user(&state.stores.library, &email).await?;

    tracing::info!(email = %email, "password reset");
    Ok(message("Password updated successfully"))
}

// ============================================================================
// OAUTH
// ============================================================================

async fn oauth_sign_in(state: &AppState, provider: Provider, body: OAuthBody) -> AppResult<Response> {
    require(&[body.access_token.as_deref()])?;

    let profile = state
        .identity
        .verify(provider, &field(body.access_token.as_deref()))
        .await?;
    let user = users::ensure_user(&state.stores.catalog, &NewUser::from(profile)).await?;

    let token = state.tokens.issue(user.id)?;
    tracing::info!(user_id = user.id, provider = ?provider, "oauth sign-in");
    Ok(with_token(&token, Json(user)))
}

/// Handler for POST /auth/google
pub async fn google(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<OAuthBody>,
) -> AppResult<Response> {
    oauth_sign_in(&state, Provider::Google, body).await
}

/// Handler for POST /auth/facebook
pub async fn facebook(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<OAuthBody>,
) -> AppResult<Response> {
    oauth_sign_in(&state, Provider::Facebook, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_with_token_sets_both_headers() {
        let response = with_token("abc", message("ok"));
        let headers = response.headers();
        assert_eq!(headers.get(AUTHORIZATION), Some(&HeaderValue::from_static("Bearer abc")));
        assert_eq!(headers.get("x-auth-token"), Some(&HeaderValue::from_static("abc")));
        assert!(headers.get(axum::http::header::ACCESS_CONTROL_EXPOSE_HEADERS).is_none());
    }

    #[test]
    fn test_field_trims() {
        assert_eq!(field(Some("  reader ")), "reader");
        assert_eq!(field(None), "");
    }
}
