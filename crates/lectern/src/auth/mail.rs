// File: src/auth/mail.rs
// Purpose: Verification-code emails: templates and the outgoing mail seam

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::config::MailConfig;
use crate::error::{AppError, AppResult};

/// Why a code is being mailed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Registration,
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailBody {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// A rendered message ready to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub body: MailBody,
}

impl MailBody {
    /// Render the verification-code email for `purpose`
    pub fn otp(purpose: OtpPurpose, code: &str, expiry_minutes: i64, mail: &MailConfig) -> Self {
        let (subject, heading, intro) = match purpose {
            OtpPurpose::Registration => (
                "Confirm Your Email Address",
                format!("Welcome to {}!", mail.app_name),
                "Thank you for registering with us. To complete your registration, \
                 please enter the following verification code:",
            ),
            OtpPurpose::PasswordReset => (
                "Password Reset Request",
                "Reset Your Password".to_string(),
                "We received a request to reset your password. \
                 Please use the following verification code to proceed:",
            ),
        };

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h1 style="color: #2c3e50; text-align: center;">{heading}</h1>
  <p style="font-size: 16px; line-height: 1.6; color: #34495e;">{intro}</p>
  <div style="background: #f8f9fa; padding: 15px; font-size: 28px; letter-spacing: 8px; text-align: center; font-weight: bold;">{code}</div>
  <ul style="color: #7f8c8d;">
    <li>This code will expire in {expiry_minutes} minutes</li>
    <li>Do not share this code with anyone</li>
    <li>If you didn't request this, please secure your account</li>
  </ul>
  <p style="color: #7f8c8d; font-size: 14px;">Need help? Contact our support team at <a href="mailto:{support}">{support}</a></p>
  <p style="color: #7f8c8d; font-size: 14px;">&copy; {year} {app}. All rights reserved.</p>
</div>"#,
            support = mail.support_address,
            year = Utc::now().year(),
            app = mail.app_name,
        );

        Self {
            subject: subject.to_string(),
            html,
            text: format!(
                "Your verification code is: {code}\nThis code will expire in {expiry_minutes} minutes."
            ),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.subject.is_empty() || (self.html.is_empty() && self.text.is_empty()) {
            return Err(AppError::internal(
                "Failed to send email",
                "Invalid mail body: Subject and content are required.",
            ));
        }
        Ok(())
    }
}

impl OutgoingMail {
    pub fn new(mail: &MailConfig, to: &str, body: MailBody) -> Self {
        Self {
            from: format!("\"{}\" <{}>", mail.app_name, mail.support_address),
            to: to.to_string(),
            body,
        }
    }
}

/// Delivers outgoing mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()>;
}

/// Mailer that records messages in the log instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        mail.body.validate()?;
        tracing::info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.body.subject,
            "outgoing mail"
        );
        tracing::debug!(text = %mail.body.text, "outgoing mail body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_template() {
        let body = MailBody::otp(OtpPurpose::Registration, "4821", 10, &MailConfig::default());
        assert_eq!(body.subject, "Confirm Your Email Address");
        assert!(body.html.contains("4821"));
        assert!(body.html.contains("expire in 10 minutes"));
        assert!(body.html.contains("support@lectern.local"));
        assert_eq!(
            body.text,
            "Your verification code is: 4821\nThis code will expire in 10 minutes."
        );
    }

    #[test]
    fn test_reset_template() {
        let body = MailBody::otp(OtpPurpose::PasswordReset, "0007", 10, &MailConfig::default());
        assert_eq!(body.subject, "Password Reset Request");
        assert!(body.html.contains("Reset Your Password"));
    }

    #[test]
    fn test_empty_body_is_rejected() {
        let body = MailBody {
            subject: String::new(),
            html: String::new(),
            text: "x".into(),
        };
        assert!(body.validate().is_err());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_valid_mail() {
        let config = MailConfig::default();
        let body = MailBody::otp(OtpPurpose::Registration, "1234", 10, &config);
        let mail = OutgoingMail::new(&config, "reader@example.com", body);
        assert_eq!(mail.from, "\"Lectern\" <support@lectern.local>");
        assert!(LogMailer.send(mail).await.is_ok());
    }
}
