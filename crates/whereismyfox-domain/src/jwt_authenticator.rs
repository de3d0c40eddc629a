use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::authenticator::{Authenticator, CallerRequest};
use crate::error::{DomainError, DomainResult};

/// Session token settings
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: u64,
}

impl JwtConfig {
    pub fn new(secret: String, expiration_hours: u64) -> Self {
        Self {
            secret,
            expiration_hours,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    /// Verified address the session was issued for; this is the caller identity
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticator backed by HS256 session tokens carried as bearer credentials.
///
/// The identity-verification flow mints tokens with [`JwtAuthenticator::issue_token`]
/// once it has a verified e-mail address; every later request presents the token.
pub struct JwtAuthenticator {
    config: JwtConfig,
}

impl JwtAuthenticator {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn issue_token(&self, email: &str) -> DomainResult<String> {
        let now = chrono::Utc::now();
        let exp = i64::try_from(self.config.expiration_hours)
            .ok()
            .and_then(chrono::TimeDelta::try_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                DomainError::InvalidToken(format!(
                    "token lifetime of {} hours is out of range",
                    self.config.expiration_hours
                ))
            })?;

        let claims = JwtClaims {
            sub: email.to_string(),
            email: email.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| DomainError::InvalidToken(format!("JWT encoding error: {}", e)))
    }

    /// Validate a token and return the e-mail it was issued for
    pub fn verify_token(&self, token: &str) -> DomainResult<String> {
        let token_data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| DomainError::InvalidToken(e.to_string()))?;

        Ok(token_data.claims.email)
    }
}

impl Authenticator for JwtAuthenticator {
    fn is_authenticated(&self, request: &CallerRequest) -> bool {
        self.caller_identity(request).is_some()
    }

    fn caller_identity(&self, request: &CallerRequest) -> Option<String> {
        let token = request.bearer_token()?;
        match self.verify_token(token) {
            Ok(email) if !email.is_empty() => Some(email),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                None
            }
        }
    }
}
