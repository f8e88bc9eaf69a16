//! Access tokens and confirmation codes.
//!
//! Access tokens are short-lived JWTs. Confirmation codes are derived
//! with HMAC-SHA-256 over the identity fields, so they need no storage:
//! the same derivation verifies them.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use model::entities::user;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Access tokens stay valid for one day.
const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Confirmation codes are the first half of the HMAC digest, hex-encoded.
const CONFIRMATION_CODE_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to encode access token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
    #[error("invalid or expired token")]
    InvalidToken,
}

/// JWT claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at
    pub iat: i64,
    pub username: String,
}

impl Claims {
    fn new(user: &user::Model) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
            iat: now.timestamp(),
            username: user.username.clone(),
        }
    }
}

/// Issues and verifies both token kinds from a single secret.
pub struct TokenService {
    secret: String,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    pub fn issue_access_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let claims = Claims::new(user);
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
    }

    /// Derive the confirmation code for a user. Depends on the identity
    /// fields, so a changed username or email invalidates old codes.
    pub fn confirmation_code(&self, user: &user::Model) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(user.id.to_le_bytes().as_ref());
        mac.update(user.username.as_bytes());
        mac.update(user.email.as_bytes());
        let digest = mac.finalize().into_bytes();
        let mut code = hex::encode(digest);
        code.truncate(CONFIRMATION_CODE_LEN);
        code
    }

    pub fn verify_confirmation_code(&self, user: &user::Model, code: &str) -> bool {
        self.confirmation_code(user) == code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::entities::user::UserRole;

    fn sample_user() -> user::Model {
        user::Model {
            id: 7,
            username: "critic".to_string(),
            email: "critic@example.com".to_string(),
            first_name: None,
            last_name: None,
            bio: None,
            role: UserRole::User,
            is_staff: false,
            is_superuser: false,
        }
    }

    #[test]
    fn issued_tokens_verify_and_carry_the_subject() {
        let service = TokenService::new("secret");
        let token = service.issue_access_token(&sample_user()).unwrap();

        let claims = service.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.username, "critic");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let service = TokenService::new("secret");
        let token = service.issue_access_token(&sample_user()).unwrap();

        assert!(TokenService::new("other").verify_access_token(&token).is_err());
    }

    #[test]
    fn confirmation_codes_are_stable_per_identity() {
        let service = TokenService::new("secret");
        let user = sample_user();

        let code = service.confirmation_code(&user);
        assert_eq!(code.len(), 32);
        assert!(service.verify_confirmation_code(&user, &code));
        assert!(!service.verify_confirmation_code(&user, "0000000000000000"));

        let mut renamed = sample_user();
        renamed.username = "other".to_string();
        assert!(!service.verify_confirmation_code(&renamed, &code));
    }
}
