use crate::auth::AuthUser;
use crate::permissions;
use crate::schemas::{
    database_error, forbidden, not_found, validation_error, ApiError, ApiResponse, AppState,
    ErrorResponse, FieldViolation,
};
use crate::validation;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use model::entities::user::{self, UserRole};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 150, message = "username must be between 1 and 150 characters"))]
    pub username: String,
    /// Email address (must be unique)
    #[validate(email(message = "email address is not valid"), length(max = 254, message = "email must be at most 254 characters"))]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// One of 'user', 'moderator' or 'admin' (default: 'user')
    pub role: Option<String>,
}

/// Request body for updating a user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 150, message = "username must be between 1 and 150 characters"))]
    pub username: Option<String>,
    /// Email address (must be unique)
    #[validate(email(message = "email address is not valid"), length(max = 254, message = "email must be at most 254 characters"))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// One of 'user', 'moderator' or 'admin'
    pub role: Option<String>,
}

/// Request body for updating one's own profile
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateMeRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 150, message = "username must be between 1 and 150 characters"))]
    pub username: Option<String>,
    /// Email address (must be unique)
    #[validate(email(message = "email address is not valid"), length(max = 254, message = "email must be at most 254 characters"))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// Accepted but never applied: the stored role always survives a
    /// self-service update.
    pub role: Option<String>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: String,
}

fn role_name(role: UserRole) -> &'static str {
    match role {
        UserRole::User => "user",
        UserRole::Moderator => "moderator",
        UserRole::Admin => "admin",
    }
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            role: role_name(model.role).to_string(),
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            bio: model.bio,
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct UserQuery {
    /// Case-insensitive substring to match against usernames
    pub search: Option<String>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

async fn find_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<user::Model, ApiError> {
    match user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await
    {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            warn!("User '{}' not found", username);
            Err(not_found(format!("User with username '{username}' not found")))
        }
        Err(e) => {
            error!("Failed to fetch user '{}': {}", username, e);
            Err(database_error("Failed to fetch user"))
        }
    }
}

/// Field-level conflicts for a username/email pair, excluding a given
/// user id when updating.
async fn uniqueness_violations(
    db: &DatabaseConnection,
    username: Option<&str>,
    email: Option<&str>,
    exclude_id: Option<i32>,
) -> Result<Vec<FieldViolation>, ApiError> {
    let mut violations = Vec::new();

    for (column, field, value) in [
        (user::Column::Username, "username", username),
        (user::Column::Email, "email", email),
    ] {
        let Some(value) = value else { continue };
        let mut query = user::Entity::find().filter(column.eq(value));
        if let Some(id) = exclude_id {
            query = query.filter(user::Column::Id.ne(id));
        }
        match query.one(db).await {
            Ok(Some(_)) => violations.push(FieldViolation::new(
                field,
                format!("{field} '{value}' is already in use"),
            )),
            Ok(None) => {}
            Err(e) => {
                error!("Failed to check {} uniqueness: {}", field, e);
                return Err(database_error("Failed to validate user"));
            }
        }
    }

    Ok(violations)
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    Valid(Query(query)): Valid<Query<UserQuery>>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    if !permissions::admin_only(Some(&requester)) {
        warn!("User '{}' attempted to list users", requester.username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    debug!("Fetching users - page: {}, limit: {}", page, limit);

    let mut query_builder = user::Entity::find();

    if let Some(search) = &query.search {
        query_builder = query_builder.filter(
            Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                .like(format!("%{}%", search.to_lowercase())),
        );
    }

    match query_builder
        .order_by_asc(user::Column::Username)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
    {
        Ok(users) => {
            info!("Retrieved {} users", users.len());
            Ok(Json(ApiResponse {
                data: users.into_iter().map(UserResponse::from).collect(),
                message: "Users retrieved successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to fetch users: {}", e);
            Err(database_error("Failed to fetch users"))
        }
    }
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    if !permissions::admin_only(Some(&requester)) {
        warn!("User '{}' attempted to create a user", requester.username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let mut violations = validation::violations_from(request.validate());
    violations.extend(validation::username_violations(
        &request.username,
        &state.config.reserved_username,
    ));
    let role = match request.role.as_deref() {
        Some(value) => match validation::parse_role(value) {
            Ok(role) => role,
            Err(violation) => {
                violations.push(violation);
                UserRole::User
            }
        },
        None => UserRole::User,
    };
    violations.extend(
        uniqueness_violations(
            &state.db,
            Some(&request.username),
            Some(&request.email),
            None,
        )
        .await?,
    );
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let new_user = user::ActiveModel {
        username: Set(request.username.clone()),
        email: Set(request.email.clone()),
        first_name: Set(request.first_name.clone()),
        last_name: Set(request.last_name.clone()),
        bio: Set(request.bio.clone()),
        role: Set(role),
        is_staff: Set(false),
        is_superuser: Set(false),
        ..Default::default()
    };

    match new_user.insert(&state.db).await {
        Ok(model) => {
            info!("User created successfully with username: {}", model.username);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse {
                    data: UserResponse::from(model),
                    message: "User created successfully".to_string(),
                    success: true,
                }),
            ))
        }
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                warn!("Concurrent duplicate user '{}'", request.username);
                return Err(validation_error(vec![FieldViolation::new(
                    "username",
                    "username or email is already in use",
                )]));
            }
            error!("Failed to create user '{}': {}", request.username, e);
            Err(database_error("Failed to create user"))
        }
    }
}

/// Get the requester's own profile
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Missing credentials", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_me(
    AuthUser(requester): AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    Ok(Json(ApiResponse {
        data: UserResponse::from(requester),
        message: "Profile retrieved successfully".to_string(),
        success: true,
    }))
}

/// Partially update the requester's own profile
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    tag = "users",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Profile updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<UpdateMeRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let mut violations = validation::violations_from(request.validate());
    if let Some(username) = &request.username {
        violations.extend(validation::username_violations(
            username,
            &state.config.reserved_username,
        ));
    }
    violations.extend(
        uniqueness_violations(
            &state.db,
            request.username.as_deref(),
            request.email.as_deref(),
            Some(requester.id),
        )
        .await?,
    );
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    if request.role.is_some() {
        debug!(
            "Ignoring role submitted through the self-service path by '{}'",
            requester.username
        );
    }

    let mut user_active: user::ActiveModel = requester.into();
    if let Some(username) = request.username {
        user_active.username = Set(username);
    }
    if let Some(email) = request.email {
        user_active.email = Set(email);
    }
    if request.first_name.is_some() {
        user_active.first_name = Set(request.first_name);
    }
    if request.last_name.is_some() {
        user_active.last_name = Set(request.last_name);
    }
    if request.bio.is_some() {
        user_active.bio = Set(request.bio);
    }
    // role is deliberately left untouched

    match user_active.update(&state.db).await {
        Ok(model) => {
            info!("User '{}' updated their profile", model.username);
            Ok(Json(ApiResponse {
                data: UserResponse::from(model),
                message: "Profile updated successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                return Err(validation_error(vec![FieldViolation::new(
                    "username",
                    "username or email is already in use",
                )]));
            }
            error!("Failed to update profile: {}", e);
            Err(database_error("Failed to update profile"))
        }
    }
}

/// Get a specific user by username
#[utoipa::path(
    get,
    path = "/api/v1/users/{username}",
    tag = "users",
    params(
        ("username" = String, Path, description = "Username"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    Path(username): Path<String>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    if !permissions::admin_only(Some(&requester)) {
        warn!("User '{}' attempted to fetch user '{}'", requester.username, username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let user = find_by_username(&state.db, &username).await?;
    Ok(Json(ApiResponse {
        data: UserResponse::from(user),
        message: "User retrieved successfully".to_string(),
        success: true,
    }))
}

/// Partially update a user
#[utoipa::path(
    patch,
    path = "/api/v1/users/{username}",
    tag = "users",
    params(
        ("username" = String, Path, description = "Username"),
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_user(
    Path(username): Path<String>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    if !permissions::admin_only(Some(&requester)) {
        warn!("User '{}' attempted to update user '{}'", requester.username, username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let existing = find_by_username(&state.db, &username).await?;

    let mut violations = validation::violations_from(request.validate());
    if let Some(new_username) = &request.username {
        violations.extend(validation::username_violations(
            new_username,
            &state.config.reserved_username,
        ));
    }
    let role = match request.role.as_deref() {
        Some(value) => match validation::parse_role(value) {
            Ok(role) => Some(role),
            Err(violation) => {
                violations.push(violation);
                None
            }
        },
        None => None,
    };
    violations.extend(
        uniqueness_violations(
            &state.db,
            request.username.as_deref(),
            request.email.as_deref(),
            Some(existing.id),
        )
        .await?,
    );
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let mut user_active: user::ActiveModel = existing.into();
    if let Some(new_username) = request.username {
        user_active.username = Set(new_username);
    }
    if let Some(email) = request.email {
        user_active.email = Set(email);
    }
    if request.first_name.is_some() {
        user_active.first_name = Set(request.first_name);
    }
    if request.last_name.is_some() {
        user_active.last_name = Set(request.last_name);
    }
    if request.bio.is_some() {
        user_active.bio = Set(request.bio);
    }
    if let Some(role) = role {
        user_active.role = Set(role);
    }

    match user_active.update(&state.db).await {
        Ok(model) => {
            info!("User '{}' updated successfully", username);
            Ok(Json(ApiResponse {
                data: UserResponse::from(model),
                message: "User updated successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                return Err(validation_error(vec![FieldViolation::new(
                    "username",
                    "username or email is already in use",
                )]));
            }
            error!("Failed to update user '{}': {}", username, e);
            Err(database_error("Failed to update user"))
        }
    }
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{username}",
    tag = "users",
    params(
        ("username" = String, Path, description = "Username"),
    ),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    Path(username): Path<String>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<StatusCode, ApiError> {
    if !permissions::admin_only(Some(&requester)) {
        warn!("User '{}' attempted to delete user '{}'", requester.username, username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let user = find_by_username(&state.db, &username).await?;

    // The author's reviews and comments go with the account
    match user::Entity::delete_by_id(user.id).exec(&state.db).await {
        Ok(_) => {
            info!("User '{}' deleted successfully", username);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!("Failed to delete user '{}': {}", username, e);
            Err(database_error("Failed to delete user"))
        }
    }
}
