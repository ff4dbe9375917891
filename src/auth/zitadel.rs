use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Identity, IdentityProvider};
use crate::core::error::ApiError;

#[derive(Debug, Clone)]
pub struct ZitadelConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    pub sub: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub exp: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// OAuth2 token introspection against a Zitadel-style OIDC issuer.
pub struct IntrospectionProvider {
    config: ZitadelConfig,
    client: Client,
}

impl IntrospectionProvider {
    pub fn new(config: ZitadelConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn introspect(&self, token: &str) -> Result<IntrospectionResponse, ApiError> {
        let introspect_url = format!("{}/oauth/v2/introspect", self.config.issuer_url);

        let params = [
            ("token", token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&introspect_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!("Token introspection request failed: {}", e);
                ApiError::Unauthenticated("identity provider unavailable".to_string())
            })?;

        if !response.status().is_success() {
            warn!("Token introspection returned {}", response.status());
            return Err(ApiError::Unauthenticated("token rejected".to_string()));
        }

        response.json::<IntrospectionResponse>().await.map_err(|e| {
            warn!("Invalid introspection response: {}", e);
            ApiError::Unauthenticated("token rejected".to_string())
        })
    }

    /// Profile lookup; failures leave the profile fields empty.
    async fn user_info(&self, access_token: &str) -> Option<UserInfo> {
        let userinfo_url = format!("{}/oidc/v1/userinfo", self.config.issuer_url);

        let response = self
            .client
            .get(&userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            debug!("Userinfo returned {}", response.status());
            return None;
        }
        response.json::<UserInfo>().await.ok()
    }
}

#[async_trait]
impl IdentityProvider for IntrospectionProvider {
    async fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let introspection = self.introspect(token).await?;

        if !introspection.active {
            return Err(ApiError::Unauthenticated("token is not active".to_string()));
        }

        let user_id = introspection
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Unauthenticated("token has no subject".to_string()))?;

        let identity = Identity::new(user_id).with_email(introspection.email);

        match self.user_info(token).await {
            Some(info) if info.sub == identity.user_id => {
                let email = info.email.or(identity.email.clone());
                Ok(identity.with_email(email).with_image_url(info.picture))
            }
            _ => Ok(identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider(server: &mockito::Server) -> IntrospectionProvider {
        IntrospectionProvider::new(ZitadelConfig {
            issuer_url: server.url(),
            client_id: "lifedash".to_string(),
            client_secret: "secret".to_string(),
        })
    }

    #[tokio::test]
    async fn test_active_token_with_profile() {
        let mut server = mockito::Server::new_async().await;
        let introspect = server
            .mock("POST", "/oauth/v2/introspect")
            .match_body(Matcher::UrlEncoded("token".into(), "good-token".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": true, "sub": "user-1", "email": "a@example.com"}"#)
            .create_async()
            .await;
        let userinfo = server
            .mock("GET", "/oidc/v1/userinfo")
            .match_header("authorization", "Bearer good-token")
            .with_header("content-type", "application/json")
            .with_body(r#"{"sub": "user-1", "email": "a@example.com", "picture": "https://img/1.png"}"#)
            .create_async()
            .await;

        let identity = provider(&server).verify("good-token").await.unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(identity.image_url.as_deref(), Some("https://img/1.png"));

        introspect.assert_async().await;
        userinfo.assert_async().await;
    }

    #[tokio::test]
    async fn test_inactive_token_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/v2/introspect")
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": false}"#)
            .create_async()
            .await;

        let err = provider(&server).verify("stale").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_userinfo_failure_keeps_identity() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/v2/introspect")
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": true, "sub": "user-2"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/oidc/v1/userinfo")
            .with_status(500)
            .create_async()
            .await;

        let identity = provider(&server).verify("t").await.unwrap();
        assert_eq!(identity, Identity::new("user-2"));
    }

    #[tokio::test]
    async fn test_issuer_error_is_unauthenticated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/v2/introspect")
            .with_status(401)
            .create_async()
            .await;

        let err = provider(&server).verify("t").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }
}
