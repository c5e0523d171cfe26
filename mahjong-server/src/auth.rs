//! Bearer token validation (`spec.md` §6): `Authorization: Bearer <token>`,
//! HS512-signed, payload `{ userId, role, type, exp }`. Issuance is external
//! (an account/auth service elsewhere in the deployment); this crate only
//! validates and decodes.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use mahjong::messages::{AuthClaims, TokenType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingBearer,
    #[error("token rejected: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("refresh tokens cannot authenticate a session")]
    WrongTokenType,
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: Vec<u8>,
}

impl Authenticator {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    /// Decodes and validates an already-bearer-stripped token, returning the
    /// `userId` to act on behalf of. Only `type: "access"` tokens may
    /// authenticate a live session; `refresh` tokens are for the (external)
    /// token-issuance endpoint only.
    pub fn authenticate(&self, token: &str) -> Result<u64, AuthError> {
        let key = DecodingKey::from_secret(&self.secret);
        let validation = Validation::new(Algorithm::HS512);
        let data = decode::<AuthClaims>(token, &key, &validation)?;

        if data.claims.token_type != TokenType::Access {
            return Err(AuthError::WrongTokenType);
        }

        Ok(data.claims.user_id)
    }

    pub fn strip_bearer(header_value: &str) -> Result<&str, AuthError> {
        header_value.strip_prefix("Bearer ").ok_or(AuthError::MissingBearer)
    }
}
