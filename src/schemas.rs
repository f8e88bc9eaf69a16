use crate::auth::mail::Mailer;
use crate::config::AppConfig;
use axum::http::StatusCode;
use axum::response::Json;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Runtime configuration
    pub config: AppConfig,
    /// Delivery seam for confirmation codes
    pub mailer: Arc<dyn Mailer>,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldViolation {
    /// The offending field
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Field-level details, present for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldViolation>>,
}

impl ErrorResponse {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            success: false,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<FieldViolation>) -> Self {
        self.details = Some(details);
        self
    }
}

/// The error half of every handler signature.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn validation_error(details: Vec<FieldViolation>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("VALIDATION_ERROR", "Request validation failed").with_details(details)),
    )
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("NOT_FOUND", message)),
    )
}

pub fn unauthorized(message: impl Into<String>) -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("UNAUTHORIZED", message)),
    )
}

pub fn forbidden(message: impl Into<String>) -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse::new("FORBIDDEN", message)),
    )
}

pub fn database_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("DATABASE_ERROR", message)),
    )
}

pub fn internal_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("INTERNAL_ERROR", message)),
    )
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::signup,
        crate::handlers::auth::token,
        crate::handlers::categories::get_categories,
        crate::handlers::categories::create_category,
        crate::handlers::categories::delete_category,
        crate::handlers::genres::get_genres,
        crate::handlers::genres::create_genre,
        crate::handlers::genres::delete_genre,
        crate::handlers::titles::get_titles,
        crate::handlers::titles::create_title,
        crate::handlers::titles::get_title,
        crate::handlers::titles::update_title,
        crate::handlers::titles::delete_title,
        crate::handlers::reviews::get_reviews,
        crate::handlers::reviews::create_review,
        crate::handlers::reviews::get_review,
        crate::handlers::reviews::update_review,
        crate::handlers::reviews::delete_review,
        crate::handlers::comments::get_comments,
        crate::handlers::comments::create_comment,
        crate::handlers::comments::get_comment,
        crate::handlers::comments::update_comment,
        crate::handlers::comments::delete_comment,
        crate::handlers::users::get_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_me,
        crate::handlers::users::update_me,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
    ),
    components(
        schemas(
            ErrorResponse,
            FieldViolation,
            HealthResponse,
            crate::handlers::auth::SignupRequest,
            crate::handlers::auth::SignupResponse,
            crate::handlers::auth::TokenRequest,
            crate::handlers::auth::TokenResponse,
            crate::handlers::categories::CreateCategoryRequest,
            crate::handlers::categories::CategoryResponse,
            crate::handlers::genres::CreateGenreRequest,
            crate::handlers::genres::GenreResponse,
            crate::handlers::titles::CreateTitleRequest,
            crate::handlers::titles::UpdateTitleRequest,
            crate::handlers::titles::TitleResponse,
            crate::handlers::reviews::CreateReviewRequest,
            crate::handlers::reviews::UpdateReviewRequest,
            crate::handlers::reviews::ReviewResponse,
            crate::handlers::comments::CreateCommentRequest,
            crate::handlers::comments::UpdateCommentRequest,
            crate::handlers::comments::CommentResponse,
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::UpdateMeRequest,
            crate::handlers::users::UserResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup and token issuance"),
        (name = "categories", description = "Title categories"),
        (name = "genres", description = "Title genres"),
        (name = "titles", description = "Reviewable titles"),
        (name = "reviews", description = "Reviews of a title"),
        (name = "comments", description = "Comments on a review"),
        (name = "users", description = "User directory and self profile"),
    ),
    info(
        title = "Kritika API",
        description = "Review aggregation service - users rate creative titles and discuss each other's reviews",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
