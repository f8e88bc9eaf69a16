use crate::auth::tokens::TokenService;
use crate::schemas::{
    database_error, internal_error, not_found, validation_error, ApiError, ApiResponse, AppState,
    ErrorResponse, FieldViolation,
};
use crate::validation;
use axum::{extract::State, http::StatusCode, response::Json};
use model::entities::user::{self, UserRole};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for signing up
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SignupRequest {
    /// Desired username
    #[validate(length(min = 1, max = 150, message = "username must be between 1 and 150 characters"))]
    pub username: String,
    /// Email address the confirmation code is sent to
    #[validate(email(message = "email address is not valid"), length(max = 254, message = "email must be at most 254 characters"))]
    pub email: String,
}

/// Signup response echoing the registered identity
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

/// Request body for exchanging a confirmation code for a token
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

/// Bearer access token response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Find or create the signup identity. An existing (username, email)
/// pair is reused so the code can be re-requested; a clash on only one
/// of the two fields is a validation error.
async fn get_or_create_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
) -> Result<user::Model, ApiError> {
    let by_username = match user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await
    {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to look up username '{}': {}", username, e);
            return Err(database_error("Failed to sign up"));
        }
    };
    let by_email = match user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
    {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to look up email '{}': {}", email, e);
            return Err(database_error("Failed to sign up"));
        }
    };

    if let (Some(user), Some(same)) = (&by_username, &by_email) {
        if user.id == same.id {
            return Ok(user.clone());
        }
    }

    let mut violations = Vec::new();
    if by_username.is_some() {
        violations.push(FieldViolation::new(
            "username",
            format!("username '{username}' is already in use"),
        ));
    }
    if by_email.is_some() {
        violations.push(FieldViolation::new(
            "email",
            format!("email '{email}' is already in use"),
        ));
    }
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let new_user = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        role: Set(UserRole::User),
        is_staff: Set(false),
        is_superuser: Set(false),
        ..Default::default()
    };
    match new_user.insert(db).await {
        Ok(model) => Ok(model),
        Err(e) => {
            error!("Failed to create signup user '{}': {}", username, e);
            Err(database_error("Failed to sign up"))
        }
    }
}

/// Sign up with a username and email
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Confirmation code issued", body = ApiResponse<SignupResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<ApiResponse<SignupResponse>>, ApiError> {
    let mut violations = validation::violations_from(request.validate());
    violations.extend(validation::username_violations(
        &request.username,
        &state.config.reserved_username,
    ));
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let user = get_or_create_user(&state.db, &request.username, &request.email).await?;

    let code = TokenService::new(&state.config.token_secret).confirmation_code(&user);
    if let Err(e) = state
        .mailer
        .send_confirmation_code(&user.email, &user.username, &code)
        .await
    {
        error!("Failed to deliver confirmation code to '{}': {}", user.email, e);
        return Err(internal_error("Failed to deliver the confirmation code"));
    }

    info!("Confirmation code issued for '{}'", user.username);
    Ok(Json(ApiResponse {
        data: SignupResponse {
            username: user.username,
            email: user.email,
        },
        message: "Confirmation code sent".to_string(),
        success: true,
    }))
}

/// Exchange a confirmation code for a bearer access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access token issued", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Wrong confirmation code", body = ErrorResponse),
        (status = 404, description = "Unknown username", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let user = match user::Entity::find()
        .filter(user::Column::Username.eq(&request.username))
        .one(&state.db)
        .await
    {
        Ok(Some(model)) => model,
        Ok(None) => {
            warn!("Token requested for unknown username '{}'", request.username);
            return Err(not_found(format!(
                "User with username '{}' not found",
                request.username
            )));
        }
        Err(e) => {
            error!("Failed to look up username '{}': {}", request.username, e);
            return Err(database_error("Failed to issue token"));
        }
    };

    let tokens = TokenService::new(&state.config.token_secret);
    if !tokens.verify_confirmation_code(&user, &request.confirmation_code) {
        warn!("Wrong confirmation code for '{}'", user.username);
        return Err(validation_error(vec![FieldViolation::new(
            "confirmation_code",
            "confirmation code is not valid for this user",
        )]));
    }

    match tokens.issue_access_token(&user) {
        Ok(token) => {
            info!("Access token issued for '{}'", user.username);
            Ok(Json(ApiResponse {
                data: TokenResponse { token },
                message: "Access token issued".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to issue access token for '{}': {}", user.username, e);
            Err(internal_error("Failed to issue token"))
        }
    }
}
