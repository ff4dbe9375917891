use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::{Identity, IdentityProvider};
use crate::core::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Local HS256 validation with a shared secret.
pub struct JwtProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtProvider {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<TokenClaims, ApiError> {
        match decode::<TokenClaims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => Err(ApiError::Unauthenticated(match e.kind() {
                ErrorKind::ExpiredSignature => "token expired".to_string(),
                ErrorKind::InvalidSignature => "invalid signature".to_string(),
                ErrorKind::InvalidToken => "malformed token".to_string(),
                ErrorKind::MissingRequiredClaim(claim) => format!("missing required claim: {claim}"),
                _ => format!("token validation failed: {e}"),
            })),
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtProvider {
    async fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let claims = self.validate(token)?;
        if claims.sub.is_empty() {
            return Err(ApiError::Unauthenticated("token has no subject".to_string()));
        }
        Ok(Identity::new(claims.sub)
            .with_email(claims.email)
            .with_image_url(claims.picture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp_offset: i64) -> String {
        let claims = TokenClaims {
            sub: sub.to_string(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            email: Some("me@example.com".to_string()),
            picture: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token() {
        let provider = JwtProvider::new("secret");
        let identity = provider.verify(&token("secret", "user-7", 3600)).await.unwrap();
        assert_eq!(identity.user_id, "user-7");
        assert_eq!(identity.email.as_deref(), Some("me@example.com"));
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let provider = JwtProvider::new("secret");
        let err = provider.verify(&token("other", "user-7", 3600)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let provider = JwtProvider::new("secret");
        let err = provider.verify(&token("secret", "user-7", -3600)).await.unwrap_err();
        match err {
            ApiError::Unauthenticated(msg) => assert_eq!(msg, "token expired"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let provider = JwtProvider::new("secret");
        assert!(provider.verify("not-a-jwt").await.is_err());
    }
}
