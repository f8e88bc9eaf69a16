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
use model::entities::genre;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a genre
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateGenreRequest {
    /// Display name
    #[validate(length(min = 1, max = 256, message = "name must be between 1 and 256 characters"))]
    pub name: String,
    /// Unique slug used for lookups
    #[validate(length(min = 1, max = 50, message = "slug must be between 1 and 50 characters"))]
    pub slug: String,
}

/// Genre response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenreResponse {
    pub name: String,
    pub slug: String,
}

impl From<genre::Model> for GenreResponse {
    fn from(model: genre::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

/// Query parameters for listing genres
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct GenreQuery {
    /// Case-insensitive substring to match against names
    pub search: Option<String>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// Get all genres
#[utoipa::path(
    get,
    path = "/api/v1/genres",
    tag = "genres",
    params(GenreQuery),
    responses(
        (status = 200, description = "Genres retrieved successfully", body = ApiResponse<Vec<GenreResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_genres(
    Valid(Query(query)): Valid<Query<GenreQuery>>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<GenreResponse>>>, ApiError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    debug!("Fetching genres - page: {}, limit: {}", page, limit);

    let mut query_builder = genre::Entity::find();

    if let Some(search) = &query.search {
        query_builder = query_builder.filter(
            Expr::expr(Func::lower(Expr::col(genre::Column::Name)))
                .like(format!("%{}%", search.to_lowercase())),
        );
    }

    match query_builder
        .order_by_asc(genre::Column::Name)
        .order_by_asc(genre::Column::Slug)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
    {
        Ok(genres) => {
            info!("Retrieved {} genres", genres.len());
            let response = ApiResponse {
                data: genres.into_iter().map(GenreResponse::from).collect(),
                message: "Genres retrieved successfully".to_string(),
                success: true,
            };
            Ok(Json(response))
        }
        Err(e) => {
            error!("Failed to fetch genres: {}", e);
            Err(database_error("Failed to fetch genres"))
        }
    }
}

/// Create a new genre
#[utoipa::path(
    post,
    path = "/api/v1/genres",
    tag = "genres",
    request_body = CreateGenreRequest,
    responses(
        (status = 201, description = "Genre created successfully", body = ApiResponse<GenreResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_genre(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<CreateGenreRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GenreResponse>>), ApiError> {
    if !permissions::admin_or_read_only(false, Some(&requester)) {
        warn!("User '{}' attempted to create a genre", requester.username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let mut violations = validation::violations_from(request.validate());
    if let Some(violation) = validation::slug_violation(&request.slug) {
        violations.push(violation);
    }
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let new_genre = genre::ActiveModel {
        name: Set(request.name.clone()),
        slug: Set(request.slug.clone()),
        ..Default::default()
    };

    match new_genre.insert(&state.db).await {
        Ok(model) => {
            info!("Genre created successfully with slug: {}", model.slug);
            let response = ApiResponse {
                data: GenreResponse::from(model),
                message: "Genre created successfully".to_string(),
                success: true,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                warn!("Genre slug '{}' already exists", request.slug);
                return Err(validation_error(vec![FieldViolation::new(
                    "slug",
                    format!("genre with slug '{}' already exists", request.slug),
                )]));
            }
            error!("Failed to create genre: {}", e);
            Err(database_error("Failed to create genre"))
        }
    }
}

/// Delete a genre by slug
#[utoipa::path(
    delete,
    path = "/api/v1/genres/{slug}",
    tag = "genres",
    params(
        ("slug" = String, Path, description = "Genre slug"),
    ),
    responses(
        (status = 204, description = "Genre deleted successfully"),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 404, description = "Genre not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_genre(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !permissions::admin_or_read_only(false, Some(&requester)) {
        warn!("User '{}' attempted to delete genre '{}'", requester.username, slug);
        return Err(forbidden("Administrator privileges are required"));
    }

    let genre = match genre::Entity::find()
        .filter(genre::Column::Slug.eq(&slug))
        .one(&state.db)
        .await
    {
        Ok(Some(model)) => model,
        Ok(None) => {
            warn!("Genre '{}' not found for deletion", slug);
            return Err(not_found(format!("Genre with slug '{slug}' not found")));
        }
        Err(e) => {
            error!("Failed to fetch genre '{}': {}", slug, e);
            return Err(database_error("Failed to fetch genre"));
        }
    };

    match genre::Entity::delete_by_id(genre.id).exec(&state.db).await {
        Ok(_) => {
            info!("Genre '{}' deleted successfully", slug);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!("Failed to delete genre '{}': {}", slug, e);
            Err(database_error("Failed to delete genre"))
        }
    }
}
