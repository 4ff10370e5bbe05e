// File: src/middleware.rs
// Purpose: Rate limiting, bearer-token authentication and error-detail exposure

use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use axum::{
    body::{self, Body},
    extract::{ConnectInfo, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, RETRY_AFTER},
        HeaderName, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use lectern::{AppError, ErrorDetail};
use serde_json::Value;

use crate::extract::AuthUser;
use crate::limiter::{Decision, TOO_MANY_REQUESTS};
use crate::state::AppState;

/// Error bodies are small JSON objects; anything larger is left alone
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Count the request against its client's window; over the limit answers 429.
///
/// Clients are keyed by peer address. Without connect info every request
/// shares one bucket.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.limiter.is_enabled() {
        return next.run(req).await;
    }

    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match state.limiter.check(client, Instant::now()) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(state.limiter.max()),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(remaining),
            );
            response
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(client = %client, "rate limit exceeded");
            let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            (
                [(RETRY_AFTER, seconds.to_string())],
                AppError::too_many_requests(TOO_MANY_REQUESTS),
            )
                .into_response()
        }
    }
}

/// Reject requests without a valid bearer token, otherwise record the caller
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let user_id = state.tokens.authenticate(header)?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}

/// Copy the private failure detail into the body as `error` outside production
pub async fn expose_error_detail(State(state): State<AppState>, response: Response) -> Response {
    if state.config.is_production() {
        return response;
    }
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match body::to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "could not buffer error body");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut map)) => {
            map.insert("error".to_string(), Value::String(detail));
            parts.headers.remove(CONTENT_LENGTH);
            Body::from(Value::Object(map).to_string())
        }
        _ => Body::from(bytes),
    };
    Response::from_parts(parts, body)
}

/// Turn a handler panic into the standard JSON 500
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    AppError::internal("Internal server error", detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_panic_response_is_json_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().cloned();
        assert_eq!(detail.map(|d| d.0), Some("boom".to_string()));

        let bytes = body::to_bytes(response.into_body(), MAX_ERROR_BODY).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"], "Internal server error");
    }
}
