// File: src/config.rs
// Purpose: Configuration parsing from lectern.toml plus environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub otp: OtpConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub oauth: OAuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Prefix mounted in front of every API route (e.g. "/api/v1")
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// "development" or "production"; production hides error details
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Length of one rate-limit window
    #[serde(default = "default_limiter_window")]
    pub limiter_window_ms: u64,

    /// Requests allowed per client IP in one window; 0 turns the limiter off
    #[serde(default = "default_limiter_max")]
    pub limiter_max: u32,
}

/// Connection settings for the two backing stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Catalog store: books, authors, categories, users...
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// Library store: annotations, tokens, OTP codes, change logs...
    #[serde(default = "default_library_url")]
    pub library_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Apply the bundled schema files at startup
    #[serde(default = "default_false")]
    pub bootstrap_schema: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    #[serde(default = "default_otp_length")]
    pub length: usize,

    #[serde(default = "default_otp_expiry")]
    pub expiry_minutes: i64,

    /// Minimum age of the previous code before a new one may be sent
    #[serde(default = "default_otp_resend")]
    pub resend_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_support_address")]
    pub support_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfig {
    /// Expected audience of Google ID tokens; unchecked when absent
    #[serde(default)]
    pub google_client_id: Option<String>,

    #[serde(default)]
    pub facebook_app_id: String,

    #[serde(default)]
    pub facebook_app_secret: String,
}

// Default values
fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_body_limit() -> usize {
    5 * 1024 * 1024
}

fn default_limiter_window() -> u64 {
    15 * 60 * 1000
}

fn default_limiter_max() -> u32 {
    100
}

fn default_catalog_url() -> String {
    "postgres://localhost/lectern_catalog".to_string()
}

fn default_library_url() -> String {
    "postgres://localhost/lectern_library".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

fn default_jwt_secret() -> String {
    "change-me".to_string()
}

fn default_token_ttl_days() -> i64 {
    3650
}

fn default_otp_length() -> usize {
    4
}

fn default_otp_expiry() -> i64 {
    10
}

fn default_otp_resend() -> i64 {
    1
}

fn default_app_name() -> String {
    "Lectern".to_string()
}

fn default_support_address() -> String {
    "support@lectern.local".to_string()
}

fn default_false() -> bool {
    false
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_prefix: default_api_prefix(),
            environment: default_environment(),
            body_limit_bytes: default_body_limit(),
            limiter_window_ms: default_limiter_window(),
            limiter_max: default_limiter_max(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            library_url: default_library_url(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            bootstrap_schema: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_days: default_token_ttl_days(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: default_otp_length(),
            expiry_minutes: default_otp_expiry(),
            resend_minutes: default_otp_resend(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            support_address: default_support_address(),
        }
    }
}

impl ServerConfig {
    pub fn limiter_window(&self) -> Duration {
        Duration::from_millis(self.limiter_window_ms)
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist or is empty, return default config
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load ./lectern.toml and apply process environment overrides
    pub fn load_default() -> Result<Self> {
        let mut config = Self::load("lectern.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override values from an environment lookup.
    ///
    /// The lookup is injected so the mapping can be exercised without
    /// touching the real process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("BACKEND_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("BACKEND_PORT is not a port number: {port}"))?;
        }
        if let Some(prefix) = lookup("API_PREFIX") {
            self.server.api_prefix = prefix;
        }
        if let Some(env) = lookup("APP_ENV") {
            self.server.environment = env;
        }
        if let Some(ms) = lookup("LIMITER_WINDOW_MS") {
            self.server.limiter_window_ms = ms
                .parse()
                .with_context(|| format!("LIMITER_WINDOW_MS is not a number: {ms}"))?;
        }
        if let Some(max) = lookup("LIMITER_MAX") {
            self.server.limiter_max = max
                .parse()
                .with_context(|| format!("LIMITER_MAX is not a number: {max}"))?;
        }
        if let Some(url) = lookup("CATALOG_DATABASE_URL") {
            self.database.catalog_url = url;
        }
        if let Some(url) = lookup("LIBRARY_DATABASE_URL") {
            self.database.library_url = url;
        }
        if let Some(max) = lookup("PG_CLIENTS_NUMBER") {
            self.database.max_connections = max
                .parse()
                .with_context(|| format!("PG_CLIENTS_NUMBER is not a number: {max}"))?;
        }
        if let Some(ms) = lookup("PG_CONNECTION_TIMEOUT") {
            self.database.acquire_timeout_ms = ms
                .parse()
                .with_context(|| format!("PG_CONNECTION_TIMEOUT is not a number: {ms}"))?;
        }
        if let Some(ms) = lookup("PG_IDLE_TIMEOUT") {
            self.database.idle_timeout_ms = ms
                .parse()
                .with_context(|| format!("PG_IDLE_TIMEOUT is not a number: {ms}"))?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(name) = lookup("APP_NAME") {
            self.mail.app_name = name;
        }
        if let Some(address) = lookup("APP_SUPPORT_MAIL") {
            self.mail.support_address = address;
        }
        if let Some(client_id) = lookup("GOOGLE_CLIENT_ID") {
            self.oauth.google_client_id = Some(client_id);
        }
        if let Some(app_id) = lookup("FACEBOOK_APP_ID") {
            self.oauth.facebook_app_id = app_id;
        }
        if let Some(secret) = lookup("FACEBOOK_APP_SECRET") {
            self.oauth.facebook_app_secret = secret;
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }

    /// Normalized route prefix: leading slash, no trailing slash, "" for root
    pub fn api_prefix(&self) -> String {
        let trimmed = self.server.api_prefix.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }
}
