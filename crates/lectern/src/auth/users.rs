// File: src/auth/users.rs
// Purpose: Temporary (pre-verification) and confirmed user records

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::oauth::OAuthProfile;
use crate::error::{AppError, AppResult};

pub const EMAIL_PASSWORD: &str = "EMAIL_PASSWORD";

/// Confirmed account in the catalog store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_code_selection: Option<String>,
    pub mobile: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub registration_type: String,
    pub customer_code: Option<String>,
}

/// Sign-up awaiting email verification, kept in the library store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TempUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub registration_type: String,
}

/// Registration form after validation; `password` is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub registration_type: String,
}

const USER_COLUMNS: &str =
    "id, name, email, phone_code_selection, mobile, password, registration_type, customer_code";

const TEMP_USER_COLUMNS: &str = "id, name, email, country_code, phone, password, registration_type";

/// Customer code derived from the email's local part
pub fn customer_code(email: &str) -> String {
    format!("CUST-{}", email.split('@').next().unwrap_or_default())
}

impl From<TempUser> for NewUser {
    fn from(temp: TempUser) -> Self {
        Self {
            name: temp.name,
            email: temp.email,
            country_code: temp.country_code,
            phone: temp.phone,
            password: temp.password,
            registration_type: temp.registration_type,
        }
    }
}

impl From<OAuthProfile> for NewUser {
    fn from(profile: OAuthProfile) -> Self {
        Self {
            name: profile.name,
            email: profile.email,
            country_code: None,
            phone: None,
            password: None,
            registration_type: profile.registration_type,
        }
    }
}

// ============================================================================
// TEMPORARY USERS (library store)
// ============================================================================

/// Insert or refresh the pending sign-up for `user.email`
pub async fn store_temp_user(pool: &PgPool, user: &NewUser) -> AppResult<TempUser> {
    let sql = format!(
        "INSERT INTO temp_user (name, email, country_code, phone, password, registration_type) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, country_code = EXCLUDED.country_code, \
         phone = EXCLUDED.phone, password = EXCLUDED.password, registration_type = EXCLUDED.registration_type \
         RETURNING {TEMP_USER_COLUMNS}"
    );
    let temp = sqlx::query_as::<_, TempUser>(&sql)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.country_code)
        .bind(&user.phone)
        .bind(&user.password)
        .bind(&user.registration_type)
        .fetch_one(pool)
        .await?;
    Ok(temp)
}

pub async fn temp_user_by_email(pool: &PgPool, email: &str) -> AppResult<Option<TempUser>> {
    let sql = format!("SELECT {TEMP_USER_COLUMNS} FROM temp_user WHERE email = $1");
    let temp = sqlx::query_as::<_, TempUser>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(temp)
}

pub async fn delete_temp_user(pool: &PgPool, email: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM temp_user WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}

// ============================================================================
// CONFIRMED USERS (catalog store)
// ============================================================================

pub async fn user_by_id(pool: &PgPool, id: i64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM res_partner WHERE id = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn user_by_email(pool: &PgPool, email: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM res_partner WHERE email = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn create_user(pool: &PgPool, user: &NewUser) -> AppResult<User> {
    let sql = format!(
        "INSERT INTO res_partner \
         (name, email, phone_code_selection, mobile, password, registration_type, customer_code) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
    );
    let created = sqlx::query_as::<_, User>(&sql)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.country_code)
        .bind(&user.phone)
        .bind(&user.password)
        .bind(&user.registration_type)
        .bind(customer_code(&user.email))
        .fetch_one(pool)
        .await?;
    tracing::info!(user_id = created.id, "user created");
    Ok(created)
}

/// Return the account for `user.email`, creating it on first sight
pub async fn ensure_user(pool: &PgPool, user: &NewUser) -> AppResult<User> {
    match user_by_email(pool, &user.email).await? {
        Some(existing) => Ok(existing),
        None => create_user(pool, user).await,
    }
}

/// Replace the password hash; fails with 404 when no such account exists
pub async fn set_password(pool: &PgPool, email: &str, password_hash: &str) -> AppResult<()> {
    let result = sqlx::query("UPDATE res_partner SET password = $1, write_date = NOW() WHERE email = $2")
        .bind(password_hash)
        .bind(email)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User not found"));
    }
    Ok(())
}
