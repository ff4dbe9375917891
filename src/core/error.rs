use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{debug, error};

/// Client-facing message for constraint violations; the database detail stays in the logs.
pub const REJECTED_WRITE: &str = "invalid reference or value";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(cause) => {
                error!("Request failed: {}", cause);
                "internal error".to_string()
            }
            Self::Unauthenticated(msg)
            | Self::NotFound(msg)
            | Self::PermissionDenied(msg)
            | Self::InvalidArgument(msg) => msg.clone(),
        };

        let body = Json(serde_json::json!({
            "error": self.kind(),
            "message": message,
            "code": self.kind().to_uppercase(),
        }));

        if matches!(self, Self::Unauthenticated(_)) {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => Self::NotFound("record not found".to_string()),
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::CheckViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::UniqueViolation => {
                    debug!("Rejected write ({:?}): {}", kind, info.message());
                    Self::invalid(REJECTED_WRITE)
                }
                _ => Self::Internal(info.message().to_string()),
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::Internal(format!("connection pool: {e}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_per_kind() {
        assert_eq!(ApiError::Unauthenticated("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("card").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::PermissionDenied("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::invalid("no fields to update").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_diesel_not_found_maps_to_not_found() {
        let err: ApiError = DieselError::NotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[derive(Debug)]
    struct ConstraintInfo;

    impl diesel::result::DatabaseErrorInformation for ConstraintInfo {
        fn message(&self) -> &str {
            "insert or update on table \"transactions\" violates foreign key constraint \"transactions_category_id_fkey\""
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("transactions")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            Some("transactions_category_id_fkey")
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[tokio::test]
    async fn test_constraint_violation_hides_database_detail() {
        for kind in [
            DatabaseErrorKind::ForeignKeyViolation,
            DatabaseErrorKind::UniqueViolation,
            DatabaseErrorKind::CheckViolation,
        ] {
            let err: ApiError = DieselError::DatabaseError(kind, Box::new(ConstraintInfo)).into();
            assert!(matches!(&err, ApiError::InvalidArgument(m) if m == REJECTED_WRITE));

            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["message"], REJECTED_WRITE);
            assert!(!bytes.windows(12).any(|w| w == b"transactions"));
        }
    }

    #[test]
    fn test_other_diesel_errors_are_internal() {
        let err: ApiError = DieselError::RollbackTransaction.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn test_unauthenticated_response_carries_challenge() {
        let response = ApiError::Unauthenticated("missing token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::not_found("goal").to_string(), "Not found: goal not found");
    }
}
