use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use git_http::{AuthIdentity, TokenValidator};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

fn now_secs() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?
        .as_secs())
}

/// Checks signature, issuer and expiry.
pub struct JwtTokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenValidator {
    pub fn new(secret: &[u8], issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl TokenValidator for JwtTokenValidator {
    async fn validate(&self, token: &str) -> Result<AuthIdentity> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .context("invalid bearer token")?;
        Ok(AuthIdentity {
            subject: data.claims.sub,
        })
    }
}

pub struct TokenIssuer {
    key: EncodingKey,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String> {
        let iat = now_secs()?;
        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat,
            exp: iat + ttl.as_secs(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .context("failed to sign token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[tokio::test]
    async fn issued_tokens_validate() {
        let token = TokenIssuer::new(SECRET, "forge")
            .issue("alice", Duration::from_secs(3600))
            .unwrap();
        let identity = JwtTokenValidator::new(SECRET, "forge")
            .validate(&token)
            .await
            .unwrap();
        assert_eq!(identity.subject, "alice");
    }

    #[tokio::test]
    async fn wrong_secret_or_issuer_is_rejected() {
        let token = TokenIssuer::new(SECRET, "forge")
            .issue("alice", Duration::from_secs(3600))
            .unwrap();
        assert!(JwtTokenValidator::new(b"other", "forge").validate(&token).await.is_err());
        assert!(JwtTokenValidator::new(SECRET, "elsewhere").validate(&token).await.is_err());
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let issuer = TokenIssuer::new(SECRET, "forge");
        let now = now_secs().unwrap();
        let token = issuer
            .encode(&Claims {
                sub: "alice".into(),
                iss: "forge".into(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(JwtTokenValidator::new(SECRET, "forge").validate(&token).await.is_err());
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        assert!(JwtTokenValidator::new(SECRET, "forge").validate("not.a.jwt").await.is_err());
    }
}
