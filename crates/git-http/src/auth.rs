//! Bearer-token gate for Git and LFS requests.
//!
//! Policy:
//! - fetch from a public repository needs nothing;
//! - fetch from a private repository needs a valid bearer token;
//! - push always needs a valid bearer token.
//!
//! The resulting identity only answers "authenticated or not"; per-repository
//! permissions are left to the caller.

use async_trait::async_trait;
use axum::http::{HeaderMap, header};

use crate::errors::GitHttpError;
use crate::repo::Visibility;

/// Subject a bearer token was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub subject: String,
}

/// External validator for opaque bearer tokens.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> anyhow::Result<AuthIdentity>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Push,
}

pub fn requires_auth(operation: Operation, visibility: Visibility) -> bool {
    match (operation, visibility) {
        (Operation::Fetch, Visibility::Public) => false,
        (Operation::Fetch, Visibility::Private) => true,
        (Operation::Push, _) => true,
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GitHttpError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(GitHttpError::Unauthorized)?
        .to_str()
        .map_err(|_| GitHttpError::Unauthorized)?;
    let token = value.strip_prefix("Bearer ").ok_or(GitHttpError::Unauthorized)?;
    if token.is_empty() || token.starts_with(' ') {
        return Err(GitHttpError::Unauthorized);
    }
    Ok(token)
}

/// Require a valid bearer token regardless of the target.
pub async fn authenticate<V>(validator: &V, headers: &HeaderMap) -> Result<AuthIdentity, GitHttpError>
where
    V: TokenValidator + ?Sized,
{
    let token = bearer_token(headers)?;
    match validator.validate(token).await {
        Ok(identity) => {
            tracing::debug!(subject = %identity.subject, "bearer token accepted");
            Ok(identity)
        }
        Err(err) => {
            tracing::debug!(error = %err, "bearer token rejected");
            Err(GitHttpError::Unauthorized)
        }
    }
}

/// Apply the policy table. Returns the identity when a token was required.
pub async fn authorize<V>(
    validator: &V,
    headers: &HeaderMap,
    operation: Operation,
    visibility: Visibility,
) -> Result<Option<AuthIdentity>, GitHttpError>
where
    V: TokenValidator + ?Sized,
{
    if !requires_auth(operation, visibility) {
        return Ok(None);
    }
    authenticate(validator, headers).await.map(Some)
}
