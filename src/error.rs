//! Service error type used at the HTTP boundary.
//!
//! Every variant maps to one status code and a JSON `{code, msg}` body.
//! Note that broadcast delivery problems are absent here on purpose: the
//! dispatcher is fire-and-forget and having no listeners is not an error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("only {0} may do this")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Validation(_) => "VALIDATION",
            ServiceError::Storage(_) => "STORAGE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Storage(ref e) = self {
            tracing::error!("storage error: {}", e);
        }

        let body = ErrorBody {
            code: self.code(),
            msg: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ServiceError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServiceError::Forbidden("teachers").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ServiceError::NotFound("room").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::Validation("content must not be empty".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::Storage(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::Unauthorized.code(), "UNAUTHORIZED");
        assert_eq!(ServiceError::NotFound("quiz").code(), "NOT_FOUND");
    }
}
