//! Requester identity. Handlers never touch token cryptography or mail
//! delivery directly: they take an [`AuthUser`] argument and the
//! extractor does the rest.

pub mod mail;
pub mod tokens;

use crate::schemas::{unauthorized, ApiError, AppState};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use model::entities::user;
use sea_orm::EntityTrait;
use tokens::TokenService;
use tracing::debug;

/// The authenticated requester, loaded from the bearer token.
///
/// Extraction fails with 401 when credentials are missing or invalid;
/// role checks on top of this stay in the handlers so that an
/// authenticated-but-unprivileged requester gets 403, not 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthorized("Authentication credentials were not provided"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Authorization header must use the Bearer scheme"))?;

        let tokens = TokenService::new(&state.config.token_secret);
        let claims = tokens
            .verify_access_token(token)
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        let user_id: i32 = claims
            .sub
            .parse()
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        match user::Entity::find_by_id(user_id).one(&state.db).await {
            Ok(Some(user)) => Ok(AuthUser(user)),
            Ok(None) => {
                debug!("Token subject {} no longer exists", user_id);
                Err(unauthorized("Invalid or expired token"))
            }
            Err(e) => {
                tracing::error!("Failed to load requester {}: {}", user_id, e);
                Err(unauthorized("Invalid or expired token"))
            }
        }
    }
}
