//! Login, token refresh and logout over the user collection.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    application::{error::AppError, users::UserService},
    domain::entities::UserRecord,
    infra::error::InfraError,
};

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
pub const LOGIN_REQUIRED: &str = "Access denied. Login required";

/// One-way hashing of passwords and refresh tokens.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, InfraError>;

    /// `Ok(false)` for a well-formed hash that does not match.
    fn verify(&self, secret: &str, hash: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub email: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies bearer tokens. Each kind uses its own secret and
/// lifetime.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, kind: TokenKind, user_id: Uuid, email: &str) -> Result<String, InfraError>;

    /// Fails on a bad signature, an expired token or a kind mismatch.
    fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, InfraError>;

    fn ttl(&self, kind: TokenKind) -> Duration;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    pub access_token_expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expires_in: u64,
    pub refresh_token: String,
    pub refresh_token_expires_in: u64,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    hasher: Arc<dyn CredentialHasher>,
    issuer: Arc<dyn TokenIssuer>,
}

impl AuthService {
    pub fn new(
        users: UserService,
        hasher: Arc<dyn CredentialHasher>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            users,
            hasher,
            issuer,
        }
    }

    pub async fn login(&self, command: LoginCommand) -> Result<TokenPair, AppError> {
        let user = self
            .users
            .find_by_email(&command.email)
            .await?
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

        if !self.hasher.verify(&command.password, &user.password_hash)? {
            debug!(user_id = %user.id, "password mismatch");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        let access = self.access_token(&user)?;
        let refresh_token = self
            .issuer
            .issue(TokenKind::Refresh, user.id, &user.email)?;
        let refresh_hash = self.hasher.hash(&refresh_token)?;
        self.users
            .store_refresh_hash(user, Some(refresh_hash))
            .await?;

        Ok(TokenPair {
            access_token: access.access_token,
            access_token_expires_in: access.access_token_expires_in,
            refresh_token,
            refresh_token_expires_in: self.issuer.ttl(TokenKind::Refresh).as_secs(),
        })
    }

    /// Exchange a refresh token for a new access token. The token must be
    /// the one most recently issued to the user.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken, AppError> {
        let claims = self
            .issuer
            .verify(TokenKind::Refresh, refresh_token)
            .map_err(|err| {
                debug!(error = %err, "refresh token rejected");
                AppError::unauthorized(INVALID_REFRESH_TOKEN)
            })?;

        let user = self
            .users
            .find_record(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized(INVALID_REFRESH_TOKEN))?;

        let Some(stored) = user.refresh_token_hash.as_deref() else {
            return Err(AppError::unauthorized(INVALID_REFRESH_TOKEN));
        };
        if !self.hasher.verify(refresh_token, stored)? {
            return Err(AppError::unauthorized(INVALID_REFRESH_TOKEN));
        }

        self.access_token(&user)
    }

    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        let user = self
            .users
            .find_record(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized(LOGIN_REQUIRED))?;
        if user.refresh_token_hash.is_none() {
            return Err(AppError::unauthorized(LOGIN_REQUIRED));
        }

        self.users.store_refresh_hash(user, None).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    fn access_token(&self, user: &UserRecord) -> Result<AccessToken, AppError> {
        let access_token = self
            .issuer
            .issue(TokenKind::Access, user.id, &user.email)?;
        Ok(AccessToken {
            access_token,
            access_token_expires_in: self.issuer.ttl(TokenKind::Access).as_secs(),
        })
    }
}
