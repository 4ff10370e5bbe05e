// File: src/auth/oauth.rs
// Purpose: Third-party identity verification (Google ID tokens, Facebook access tokens)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;
use crate::error::{AppError, AppResult};

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const FACEBOOK_GRAPH_URL: &str = "https://graph.facebook.com";

/// Identity asserted by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthProfile {
    pub email: String,
    pub name: String,
    pub registration_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub fn registration_type(&self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE",
            Provider::Facebook => "FACEBOOK",
        }
    }
}

/// Verifies provider tokens and returns the identity they carry
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, provider: Provider, token: &str) -> AppResult<OAuthProfile>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookDebug {
    data: FacebookDebugData,
}

#[derive(Debug, Deserialize)]
struct FacebookDebugData {
    #[serde(default)]
    is_valid: bool,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    email: Option<String>,
    name: Option<String>,
}

fn rejected(provider: Provider) -> AppError {
    let name = match provider {
        Provider::Google => "Google",
        Provider::Facebook => "Facebook",
    };
    AppError::unauthorized(format!("Invalid {name} token"))
}

fn profile(provider: Provider, email: Option<String>, name: Option<String>) -> AppResult<OAuthProfile> {
    let email = email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::unauthorized("Provider did not return an email address"))?;
    let name = name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    Ok(OAuthProfile {
        email: email.to_lowercase(),
        name,
        registration_type: provider.registration_type().to_string(),
    })
}

/// HTTP-backed provider verification
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::internal("Failed to build HTTP client", e))?;
        Ok(Self { http, config })
    }

    async fn google(&self, id_token: &str) -> AppResult<OAuthProfile> {
        let response = self
            .http
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| AppError::internal("Google verification failed", e))?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "google rejected id token");
            return Err(rejected(Provider::Google));
        }

        let info: GoogleTokenInfo = response
            .json()
            .await
            .map_err(|e| AppError::internal("Google verification failed", e))?;

        if let Some(expected) = &self.config.google_client_id {
            if info.aud.as_deref() != Some(expected.as_str()) {
                tracing::warn!(aud = ?info.aud, "google token issued for another audience");
                return Err(rejected(Provider::Google));
            }
        }

        profile(Provider::Google, info.email, info.name)
    }

    async fn facebook(&self, access_token: &str) -> AppResult<OAuthProfile> {
        let app_token = format!(
            "{}|{}",
            self.config.facebook_app_id, self.config.facebook_app_secret
        );
        let debug: FacebookDebug = self
            .http
            .get(format!("{FACEBOOK_GRAPH_URL}/debug_token"))
            .query(&[("input_token", access_token), ("access_token", app_token.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!(error = %e, "facebook debug_token failed");
                rejected(Provider::Facebook)
            })?
            .json()
            .await
            .map_err(|e| AppError::internal("Facebook verification failed", e))?;

        let user_id = match debug.data.user_id {
            Some(id) if debug.data.is_valid => id,
            _ => return Err(rejected(Provider::Facebook)),
        };

        let user: FacebookUser = self
            .http
            .get(format!("{FACEBOOK_GRAPH_URL}/{user_id}"))
            .query(&[("fields", "id,name,email"), ("access_token", access_token)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::internal("Facebook profile lookup failed", e))?
            .json()
            .await
            .map_err(|e| AppError::internal("Facebook profile lookup failed", e))?;

        profile(Provider::Facebook, user.email, user.name)
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    async fn verify(&self, provider: Provider, token: &str) -> AppResult<OAuthProfile> {
        match provider {
            Provider::Google => self.google(token).await,
            Provider::Facebook => self.facebook(token).await,
        }
    }
}
