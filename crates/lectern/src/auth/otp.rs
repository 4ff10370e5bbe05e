// File: src/auth/otp.rs
// Purpose: One-time email verification codes: generation, storage, expiry and resend window
//
// Architecture: the expiry/resend rules are pure functions over an `OtpRecord`;
// the async functions load and store records in the library store.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;

use crate::config::OtpConfig;
use crate::error::{AppError, AppResult};

pub const NOT_FOUND: &str = "OTP not found";
pub const INVALID: &str = "Invalid OTP";
pub const EXPIRED: &str = "OTP expired";
pub const NOT_EXPIRED: &str = "OTP is not expired";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OtpRecord {
    pub email: String,
    pub code: String,
    pub updated_at: DateTime<Utc>,
}

/// Code length and time windows
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub length: usize,
    pub expiry: Duration,
    pub resend_after: Duration,
}

impl From<&OtpConfig> for OtpPolicy {
    fn from(config: &OtpConfig) -> Self {
        Self {
            length: config.length,
            expiry: Duration::minutes(config.expiry_minutes),
            resend_after: Duration::minutes(config.resend_minutes),
        }
    }
}

// ============================================================================
// PURE FUNCTIONS
// ============================================================================

/// Random numeric code of `length` digits
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Match a submitted code against the stored record
pub fn check(record: Option<&OtpRecord>, submitted: &str, now: DateTime<Utc>, expiry: Duration) -> AppResult<()> {
    let record = record.ok_or_else(|| AppError::bad_request(NOT_FOUND))?;
    if record.code != submitted.trim() {
        return Err(AppError::bad_request(INVALID));
    }
    if now - record.updated_at > expiry {
        return Err(AppError::bad_request(EXPIRED));
    }
    Ok(())
}

/// A new code may be sent when none exists or the last one is older than `window`
pub fn can_resend(record: Option<&OtpRecord>, now: DateTime<Utc>, window: Duration) -> bool {
    record.map_or(true, |r| now - r.updated_at > window)
}

// ============================================================================
// I/O FUNCTIONS
// ============================================================================

pub async fn find(pool: &PgPool, email: &str) -> AppResult<Option<OtpRecord>> {
    let record = sqlx::query_as::<_, OtpRecord>("SELECT email, code, updated_at FROM otp WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

/// Generate and store a fresh code for `email`, replacing any previous one
pub async fn issue(pool: &PgPool, policy: OtpPolicy, email: &str) -> AppResult<String> {
    let code = generate_code(policy.length);
    sqlx::query(
        "INSERT INTO otp (email, code, updated_at) VALUES ($1, $2, NOW()) \
         ON CONFLICT (email) DO UPDATE SET code = EXCLUDED.code, updated_at = NOW()",
    )
    .bind(email)
    .bind(&code)
    .execute(pool)
    .await?;
    tracing::debug!(email, "otp issued");
    Ok(code)
}

/// Check a code without consuming it
pub async fn verify(pool: &PgPool, policy: OtpPolicy, email: &str, code: &str) -> AppResult<()> {
    let record = find(pool, email).await?;
    check(record.as_ref(), code, Utc::now(), policy.expiry)
}

/// Check a code and delete it so it cannot be replayed
pub async fn consume(pool: &PgPool, policy: OtpPolicy, email: &str, code: &str) -> AppResult<()> {
    verify(pool, policy, email, code).await?;
    sqlx::query("DELETE FROM otp WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn ensure_can_resend(pool: &PgPool, policy: OtpPolicy, email: &str) -> AppResult<()> {
    let record = find(pool, email).await?;
    if can_resend(record.as_ref(), Utc::now(), policy.resend_after) {
        Ok(())
    } else {
        Err(AppError::bad_request(NOT_EXPIRED))
    }
}
