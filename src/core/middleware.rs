use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::core::error::ApiError;
use crate::core::shared::state::AppState;

// ============================================================================
// User Context (Authentication)
// ============================================================================

/// Authenticated caller, inserted into request extensions by
/// [`authentication_middleware`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            image_url: None,
        }
    }
}

impl From<Identity> for AuthenticatedUser {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            email: identity.email,
            image_url: identity.image_url,
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("missing authorization token".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| ApiError::Unauthenticated("invalid authorization format".to_string()))?;

    if token.is_empty() {
        return Err(ApiError::Unauthenticated("missing authorization token".to_string()));
    }
    Ok(token)
}

/// Rejects the request with 401 unless the bearer token resolves to a user.
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => return e.into_response(),
    };

    match state.identity.verify(&token).await {
        Ok(identity) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser::from(identity));
            next.run(request).await
        }
        Err(e) => {
            debug!("Rejected request to {}: {}", request.uri().path(), e);
            e.into_response()
        }
    }
}

// ============================================================================
// Axum Extractors
// ============================================================================

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthenticated("authentication required".to_string()))
    }
}
