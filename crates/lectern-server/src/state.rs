// File: src/state.rs
// Purpose: Application state shared across handlers

use std::sync::Arc;

use lectern::auth::{IdentityProvider, Mailer, OtpPolicy, TokenService};
use lectern::{Config, Stores};

use crate::limiter::RateLimiter;

/// Cloned into every handler; everything heavy sits behind an `Arc` or a pool handle
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
    pub identity: Arc<dyn IdentityProvider>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        mailer: Arc<dyn Mailer>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let tokens = TokenService::from_config(&config.auth);
        let limiter = Arc::new(RateLimiter::from_config(&config.server));
        Self {
            config: Arc::new(config),
            stores,
            tokens,
            mailer,
            identity,
            limiter,
        }
    }

    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy::from(&self.config.otp)
    }
}
