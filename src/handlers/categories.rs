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
use model::entities::category;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a category
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCategoryRequest {
    /// Display name
    #[validate(length(min = 1, max = 256, message = "name must be between 1 and 256 characters"))]
    pub name: String,
    /// Unique slug used for lookups
    #[validate(length(min = 1, max = 50, message = "slug must be between 1 and 50 characters"))]
    pub slug: String,
}

/// Category response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub name: String,
    pub slug: String,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

/// Query parameters for listing categories
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct CategoryQuery {
    /// Case-insensitive substring to match against names
    pub search: Option<String>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// Get all categories
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    params(CategoryQuery),
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<CategoryResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_categories(
    Valid(Query(query)): Valid<Query<CategoryQuery>>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ApiError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    debug!("Fetching categories - page: {}, limit: {}", page, limit);

    let mut query_builder = category::Entity::find();

    if let Some(search) = &query.search {
        query_builder = query_builder.filter(
            Expr::expr(Func::lower(Expr::col(category::Column::Name)))
                .like(format!("%{}%", search.to_lowercase())),
        );
    }

    match query_builder
        .order_by_asc(category::Column::Name)
        .order_by_asc(category::Column::Slug)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
    {
        Ok(categories) => {
            info!("Retrieved {} categories", categories.len());
            let response = ApiResponse {
                data: categories.into_iter().map(CategoryResponse::from).collect(),
                message: "Categories retrieved successfully".to_string(),
                success: true,
            };
            Ok(Json(response))
        }
        Err(e) => {
            error!("Failed to fetch categories: {}", e);
            Err(database_error("Failed to fetch categories"))
        }
    }
}

/// Create a new category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ApiError> {
    if !permissions::admin_or_read_only(false, Some(&requester)) {
        warn!("User '{}' attempted to create a category", requester.username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let mut violations = validation::violations_from(request.validate());
    if let Some(violation) = validation::slug_violation(&request.slug) {
        violations.push(violation);
    }
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let new_category = category::ActiveModel {
        name: Set(request.name.clone()),
        slug: Set(request.slug.clone()),
        ..Default::default()
    };

    match new_category.insert(&state.db).await {
        Ok(model) => {
            info!("Category created successfully with slug: {}", model.slug);
            let response = ApiResponse {
                data: CategoryResponse::from(model),
                message: "Category created successfully".to_string(),
                success: true,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                warn!("Category slug '{}' already exists", request.slug);
                return Err(validation_error(vec![FieldViolation::new(
                    "slug",
                    format!("category with slug '{}' already exists", request.slug),
                )]));
            }
            error!("Failed to create category: {}", e);
            Err(database_error("Failed to create category"))
        }
    }
}

/// Delete a category by slug
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{slug}",
    tag = "categories",
    params(
        ("slug" = String, Path, description = "Category slug"),
    ),
    responses(
        (status = 204, description = "Category deleted successfully"),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !permissions::admin_or_read_only(false, Some(&requester)) {
        warn!("User '{}' attempted to delete category '{}'", requester.username, slug);
        return Err(forbidden("Administrator privileges are required"));
    }

    let category = match category::Entity::find()
        .filter(category::Column::Slug.eq(&slug))
        .one(&state.db)
        .await
    {
        Ok(Some(model)) => model,
        Ok(None) => {
            warn!("Category '{}' not found for deletion", slug);
            return Err(not_found(format!("Category with slug '{slug}' not found")));
        }
        Err(e) => {
            error!("Failed to fetch category '{}': {}", slug, e);
            return Err(database_error("Failed to fetch category"));
        }
    };

    // Titles keep existing with a null category (ON DELETE SET NULL)
    match category::Entity::delete_by_id(category.id).exec(&state.db).await {
        Ok(_) => {
            info!("Category '{}' deleted successfully", slug);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!("Failed to delete category '{}': {}", slug, e);
            Err(database_error("Failed to delete category"))
        }
    }
}
