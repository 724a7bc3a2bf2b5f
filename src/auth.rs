//! Credentials: HTTP Basic auth for the staff provisioning endpoints and
//! bearer-token lookup for everything a provisioned user does.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, Response, StatusCode},
    middleware::Next,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::store::Store;
use crate::types::User;

/// Staff credentials guarding user provisioning
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Username for the staff endpoints (None = guard disabled)
    pub username: Option<String>,
    /// Password for the staff endpoints
    pub password: Option<String>,
}

impl AuthConfig {
    /// Load from environment. STAFF_USERNAME and STAFF_PASSWORD must both
    /// be set to enable the guard.
    pub fn from_env() -> Self {
        let username = std::env::var("STAFF_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let password = std::env::var("STAFF_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if username.is_some() && password.is_some() {
            tracing::info!("Staff authentication enabled");
            Self { username, password }
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!(
                    "STAFF_USERNAME and STAFF_PASSWORD must both be set to enable authentication"
                );
            }
            tracing::warn!("Staff authentication DISABLED - anyone can provision users!");
            Self {
                username: None,
                password: None,
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                // Constant-time comparison to prevent timing attacks
                constant_time_eq(u.as_bytes(), username.as_bytes())
                    && constant_time_eq(p.as_bytes(), password.as_bytes())
            }
            _ => true, // Guard disabled, allow all
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Middleware for HTTP Basic Authentication on the staff routes
pub async fn staff_auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !auth_config.is_enabled() {
        return next.run(request).await;
    }

    if let Some((username, password)) = basic_credentials(request.headers()) {
        if auth_config.validate(&username, &password) {
            return next.run(request).await;
        }
    }

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, "Basic realm=\"Studyhall Staff\"")
        .body(Body::from("Unauthorized"))
        .unwrap()
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = auth_str.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(BASE64.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Resolve the `Authorization: Bearer <token>` header to a provisioned
/// user. Missing header and unknown token both come back Unauthorized.
pub async fn bearer_user(store: &Store, headers: &HeaderMap) -> Result<User, ServiceError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(ServiceError::Unauthorized)?;

    store
        .user_by_token(token)
        .await?
        .ok_or(ServiceError::Unauthorized)
}
