//! Argon2 credential hashing and HS256 bearer tokens.

use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::auth::{CredentialHasher, TokenClaims, TokenIssuer, TokenKind},
    config::AuthSettings,
};

use super::error::InfraError;

#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, InfraError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| InfraError::credentials(format!("failed to hash secret: {err}")))
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, InfraError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|err| InfraError::credentials(format!("stored hash is malformed: {err}")))?;
        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(InfraError::credentials(format!(
                "failed to verify secret: {err}"
            ))),
        }
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// HS256 issuer with separate secrets for access and refresh tokens.
pub struct JwtIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
}

impl JwtIssuer {
    pub fn new(
        access_secret: &str,
        access_ttl: Duration,
        refresh_secret: &str,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: SigningKeys::new(access_secret, access_ttl),
            refresh: SigningKeys::new(refresh_secret, refresh_ttl),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, InfraError> {
        let access_secret = settings
            .access_secret
            .as_deref()
            .ok_or_else(|| InfraError::configuration("auth.access_secret is required"))?;
        let refresh_secret = settings
            .refresh_secret
            .as_deref()
            .ok_or_else(|| InfraError::configuration("auth.refresh_secret is required"))?;
        Ok(Self::new(
            access_secret,
            settings.access_ttl,
            refresh_secret,
            settings.refresh_ttl,
        ))
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, kind: TokenKind, user_id: Uuid, email: &str) -> Result<String, InfraError> {
        let keys = self.keys(kind);
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = i64::try_from(keys.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: user_id,
            email: email.to_string(),
            kind,
            iat,
            exp: iat.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|err| InfraError::credentials(format!("failed to sign token: {err}")))
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, InfraError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let claims = decode::<TokenClaims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|err| InfraError::credentials(format!("token rejected: {err}")))?
            .claims;
        if claims.kind != kind {
            return Err(InfraError::credentials("token kind mismatch"));
        }
        Ok(claims)
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        self.keys(kind).ttl
    }
}
