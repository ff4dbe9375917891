//! Identity provider integration.
//!
//! Tokens are verified by an external identity provider; the application only
//! needs a stable user id back, plus optional profile fields for `/user/me`.

pub mod jwt;
pub mod zitadel;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::core::config::{AuthConfig, AuthProviderKind};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use jwt::JwtProvider;
pub use zitadel::{IntrospectionProvider, ZitadelConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            image_url: None,
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer token to the caller's identity or fails with `Unauthenticated`.
    async fn verify(&self, token: &str) -> Result<Identity, ApiError>;
}

pub fn build_provider(config: &AuthConfig) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    match config.provider {
        AuthProviderKind::Jwt => {
            if config.jwt_secret.is_empty() {
                anyhow::bail!("auth.jwt_secret must be set when auth.provider = \"jwt\"");
            }
            Ok(Arc::new(JwtProvider::new(&config.jwt_secret)))
        }
        AuthProviderKind::Introspection => {
            if config.issuer_url.is_empty() {
                anyhow::bail!("auth.issuer_url must be set when auth.provider = \"introspection\"");
            }
            Ok(Arc::new(IntrospectionProvider::new(ZitadelConfig {
                issuer_url: config.issuer_url.trim_end_matches('/').to_string(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            })))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

pub async fn current_user(user: AuthenticatedUser) -> Json<UserProfile> {
    Json(UserProfile {
        id: user.user_id,
        email: user.email,
        image_url: user.image_url,
    })
}

pub fn configure_user_routes() -> Router<Arc<AppState>> {
    Router::new().route(ApiUrls::USER_ME, get(current_user))
}
