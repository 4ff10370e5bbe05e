// File: src/auth/mod.rs
// Purpose: Authentication services: session tokens, passwords, email codes, OAuth, user records

pub mod mail;
pub mod oauth;
pub mod otp;
pub mod password;
pub mod token;
pub mod users;
pub mod validate;

pub use mail::{LogMailer, MailBody, Mailer, OtpPurpose, OutgoingMail};
pub use oauth::{IdentityProvider, OAuthClient, OAuthProfile, Provider};
pub use otp::OtpPolicy;
pub use token::TokenService;
pub use users::{NewUser, TempUser, User};

use sqlx::PgPool;

use crate::config::MailConfig;
use crate::error::AppResult;

/// Generate, store and mail a verification code
pub async fn send_otp(
    pool: &PgPool,
    mailer: &dyn Mailer,
    policy: OtpPolicy,
    mail: &MailConfig,
    email: &str,
    purpose: OtpPurpose,
) -> AppResult<()> {
    let code = otp::issue(pool, policy, email).await?;
    let body = MailBody::otp(purpose, &code, policy.expiry.num_minutes(), mail);
    mailer.send(OutgoingMail::new(mail, email, body)).await
}
