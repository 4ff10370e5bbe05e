// File: src/auth/token.rs
// Purpose: Bearer token parsing and HS256 JWT issue/verify

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

pub const NO_TOKEN: &str = "Access denied. No token provided.";
pub const BAD_FORMAT: &str = "Access denied. Invalid token format.";
pub const BAD_TYPE: &str = "Access denied. Invalid token type.";
pub const BAD_TOKEN: &str = "Access denied. Token is expired or invalid.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// Extract the token from an `Authorization` header value
pub fn parse_bearer(header: Option<&str>) -> AppResult<&str> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::unauthorized(NO_TOKEN))?;

    let parts: Vec<&str> = header.split_whitespace().collect();
    let [scheme, token] = parts.as_slice() else {
        return Err(AppError::unauthorized(BAD_FORMAT));
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(BAD_TYPE));
    }
    Ok(*token)
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").field("ttl", &self.ttl).finish()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, Duration::days(config.token_ttl_days))
    }

    pub fn issue(&self, user_id: i64) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            id: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::internal("Failed to issue token", e))
    }

    /// Verified user id carried by `token`
    pub fn verify(&self, token: &str) -> AppResult<i64> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.id)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                AppError::unauthorized(BAD_TOKEN)
            })
    }

    /// Full header check: presence, shape, scheme, signature and expiry
    pub fn authenticate(&self, header: Option<&str>) -> AppResult<i64> {
        let token = parse_bearer(header)?;
        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::days(1))
    }

    #[rstest]
    #[case(None, NO_TOKEN)]
    #[case(Some(""), NO_TOKEN)]
    #[case(Some("abc"), BAD_FORMAT)]
    #[case(Some("Bearer a b"), BAD_FORMAT)]
    #[case(Some("Basic dXNlcjpwYXNz"), BAD_TYPE)]
    fn test_parse_bearer_rejections(#[case] header: Option<&str>, #[case] message: &str) {
        let err = parse_bearer(header).unwrap_err();
        assert_eq!(err.to_string(), message);
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_parse_bearer_accepts_any_case() {
        assert_eq!(parse_bearer(Some("bearer tok")).unwrap(), "tok");
        assert_eq!(parse_bearer(Some("Bearer tok")).unwrap(), "tok");
    }

    #[test]
    fn test_issue_then_authenticate() {
        let tokens = service();
        let token = tokens.issue(7).unwrap();
        let header = format!("Bearer {token}");
        assert_eq!(tokens.authenticate(Some(&header)).unwrap(), 7);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = service().issue(7).unwrap();
        let other = TokenService::new("other-secret", Duration::days(1));
        assert_eq!(other.verify(&token).unwrap_err().to_string(), BAD_TOKEN);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = TokenService::new("test-secret", Duration::days(-2));
        let token = expired.issue(7).unwrap();
        assert_eq!(service().verify(&token).unwrap_err().to_string(), BAD_TOKEN);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(service().verify("not.a.jwt").is_err());
    }
}
