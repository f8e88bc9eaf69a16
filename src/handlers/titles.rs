use crate::auth::AuthUser;
use crate::handlers::categories::CategoryResponse;
use crate::handlers::genres::GenreResponse;
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
use model::entities::{category, genre, title, title_genre};
use model::rating;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a title
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTitleRequest {
    /// Display name
    #[validate(length(min = 1, max = 256, message = "name must be between 1 and 256 characters"))]
    pub name: String,
    /// Release year, must not lie in the future
    pub year: i32,
    /// Optional description
    pub description: Option<String>,
    /// Slug of the category the title belongs to
    pub category: Option<String>,
    /// Slugs of the genres attached to the title
    pub genre: Option<Vec<String>>,
}

/// Request body for partially updating a title
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateTitleRequest {
    /// Display name
    #[validate(length(min = 1, max = 256, message = "name must be between 1 and 256 characters"))]
    pub name: Option<String>,
    /// Release year, must not lie in the future
    pub year: Option<i32>,
    /// Optional description
    pub description: Option<String>,
    /// Slug of the category the title belongs to
    pub category: Option<String>,
    /// Slugs of the genres attached to the title; replaces the current set
    pub genre: Option<Vec<String>>,
}

/// Title response model with nested catalog objects and the computed rating
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TitleResponse {
    pub id: i32,
    pub name: String,
    pub year: i32,
    /// Average review score, absent while the title has no reviews
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub category: Option<CategoryResponse>,
    pub genre: Vec<GenreResponse>,
}

/// Query parameters for listing titles
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct TitleQuery {
    /// Case-insensitive substring to match against names
    pub name: Option<String>,
    /// Category slug
    pub category: Option<String>,
    /// Genre slug
    pub genre: Option<String>,
    /// Exact release year
    pub year: Option<i32>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// Assemble full responses for a page of titles: one grouped rating
/// query plus batch lookups for categories and genres, never per-row
/// queries.
async fn build_title_responses(
    db: &DatabaseConnection,
    titles: Vec<title::Model>,
) -> Result<Vec<TitleResponse>, DbErr> {
    let title_ids: Vec<i32> = titles.iter().map(|t| t.id).collect();
    let ratings = rating::for_titles(db, &title_ids).await?;

    let category_ids: Vec<i32> = titles.iter().filter_map(|t| t.category_id).collect();
    let categories: HashMap<i32, category::Model> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let links = if title_ids.is_empty() {
        Vec::new()
    } else {
        title_genre::Entity::find()
            .filter(title_genre::Column::TitleId.is_in(title_ids))
            .all(db)
            .await?
    };
    let genre_ids: Vec<i32> = links.iter().map(|l| l.genre_id).collect();
    let genres: HashMap<i32, genre::Model> = if genre_ids.is_empty() {
        HashMap::new()
    } else {
        genre::Entity::find()
            .filter(genre::Column::Id.is_in(genre_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect()
    };
    let mut genres_by_title: HashMap<i32, Vec<GenreResponse>> = HashMap::new();
    for link in links {
        if let Some(genre) = genres.get(&link.genre_id) {
            genres_by_title
                .entry(link.title_id)
                .or_default()
                .push(GenreResponse::from(genre.clone()));
        }
    }

    Ok(titles
        .into_iter()
        .map(|t| TitleResponse {
            rating: ratings.get(&t.id).copied(),
            category: t
                .category_id
                .and_then(|id| categories.get(&id))
                .cloned()
                .map(CategoryResponse::from),
            genre: genres_by_title.remove(&t.id).unwrap_or_default(),
            id: t.id,
            name: t.name,
            year: t.year,
            description: t.description,
        })
        .collect())
}

async fn resolve_category_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<category::Model, ApiError> {
    match category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await
    {
        Ok(Some(model)) => Ok(model),
        Ok(None) => Err(validation_error(vec![FieldViolation::new(
            "category",
            format!("category with slug '{slug}' does not exist"),
        )])),
        Err(e) => {
            error!("Failed to resolve category '{}': {}", slug, e);
            Err(database_error("Failed to resolve category"))
        }
    }
}

async fn resolve_genre_slugs(
    db: &DatabaseConnection,
    slugs: &[String],
) -> Result<Vec<genre::Model>, ApiError> {
    let mut models = Vec::new();
    let mut violations = Vec::new();
    for slug in slugs {
        match genre::Entity::find()
            .filter(genre::Column::Slug.eq(slug))
            .one(db)
            .await
        {
            Ok(Some(model)) => models.push(model),
            Ok(None) => violations.push(FieldViolation::new(
                "genre",
                format!("genre with slug '{slug}' does not exist"),
            )),
            Err(e) => {
                error!("Failed to resolve genre '{}': {}", slug, e);
                return Err(database_error("Failed to resolve genre"));
            }
        }
    }
    if violations.is_empty() {
        Ok(models)
    } else {
        Err(validation_error(violations))
    }
}

async fn replace_genre_links(
    db: &DatabaseConnection,
    title_id: i32,
    genres: &[genre::Model],
) -> Result<(), DbErr> {
    title_genre::Entity::delete_many()
        .filter(title_genre::Column::TitleId.eq(title_id))
        .exec(db)
        .await?;
    for genre in genres {
        title_genre::ActiveModel {
            title_id: Set(title_id),
            genre_id: Set(genre.id),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Get all titles
#[utoipa::path(
    get,
    path = "/api/v1/titles",
    tag = "titles",
    params(TitleQuery),
    responses(
        (status = 200, description = "Titles retrieved successfully", body = ApiResponse<Vec<TitleResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_titles(
    Valid(Query(query)): Valid<Query<TitleQuery>>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TitleResponse>>>, ApiError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    debug!("Fetching titles - page: {}, limit: {}", page, limit);

    let mut query_builder = title::Entity::find();

    if let Some(name) = &query.name {
        query_builder = query_builder.filter(
            Expr::expr(Func::lower(Expr::col(title::Column::Name)))
                .like(format!("%{}%", name.to_lowercase())),
        );
    }
    if let Some(slug) = &query.category {
        // An unknown slug matches nothing rather than erroring
        let category_ids: Vec<i32> = match category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&state.db)
            .await
        {
            Ok(model) => model.into_iter().map(|c| c.id).collect(),
            Err(e) => {
                error!("Failed to resolve category filter '{}': {}", slug, e);
                return Err(database_error("Failed to fetch titles"));
            }
        };
        query_builder = query_builder.filter(title::Column::CategoryId.is_in(category_ids));
    }
    if let Some(slug) = &query.genre {
        let genre = match genre::Entity::find()
            .filter(genre::Column::Slug.eq(slug))
            .one(&state.db)
            .await
        {
            Ok(model) => model,
            Err(e) => {
                error!("Failed to resolve genre filter '{}': {}", slug, e);
                return Err(database_error("Failed to fetch titles"));
            }
        };
        let title_ids: Vec<i32> = match genre {
            Some(genre) => match title_genre::Entity::find()
                .filter(title_genre::Column::GenreId.eq(genre.id))
                .all(&state.db)
                .await
            {
                Ok(links) => links.into_iter().map(|l| l.title_id).collect(),
                Err(e) => {
                    error!("Failed to resolve genre links for '{}': {}", slug, e);
                    return Err(database_error("Failed to fetch titles"));
                }
            },
            None => Vec::new(),
        };
        query_builder = query_builder.filter(title::Column::Id.is_in(title_ids));
    }
    if let Some(year) = query.year {
        query_builder = query_builder.filter(title::Column::Year.eq(year));
    }

    let titles = match query_builder
        .order_by_asc(title::Column::Name)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
    {
        Ok(titles) => titles,
        Err(e) => {
            error!("Failed to fetch titles: {}", e);
            return Err(database_error("Failed to fetch titles"));
        }
    };

    match build_title_responses(&state.db, titles).await {
        Ok(responses) => {
            info!("Retrieved {} titles", responses.len());
            Ok(Json(ApiResponse {
                data: responses,
                message: "Titles retrieved successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to assemble title responses: {}", e);
            Err(database_error("Failed to fetch titles"))
        }
    }
}

/// Create a new title
#[utoipa::path(
    post,
    path = "/api/v1/titles",
    tag = "titles",
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Title created successfully", body = ApiResponse<TitleResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_title(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<CreateTitleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TitleResponse>>), ApiError> {
    if !permissions::admin_or_read_only(false, Some(&requester)) {
        warn!("User '{}' attempted to create a title", requester.username);
        return Err(forbidden("Administrator privileges are required"));
    }

    let mut violations = validation::violations_from(request.validate());
    if let Some(violation) = validation::year_violation(request.year) {
        violations.push(violation);
    }
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let category = match &request.category {
        Some(slug) => Some(resolve_category_slug(&state.db, slug).await?),
        None => None,
    };
    let genres = resolve_genre_slugs(&state.db, request.genre.as_deref().unwrap_or(&[])).await?;

    let new_title = title::ActiveModel {
        name: Set(request.name.clone()),
        year: Set(request.year),
        description: Set(request.description.clone()),
        category_id: Set(category.map(|c| c.id)),
        ..Default::default()
    };

    let title = match new_title.insert(&state.db).await {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to create title: {}", e);
            return Err(database_error("Failed to create title"));
        }
    };

    if let Err(e) = replace_genre_links(&state.db, title.id, &genres).await {
        error!("Failed to attach genres to title {}: {}", title.id, e);
        return Err(database_error("Failed to create title"));
    }

    match build_title_responses(&state.db, vec![title]).await {
        Ok(mut responses) => {
            let response = responses.remove(0);
            info!("Title created successfully with ID: {}", response.id);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse {
                    data: response,
                    message: "Title created successfully".to_string(),
                    success: true,
                }),
            ))
        }
        Err(e) => {
            error!("Failed to assemble title response: {}", e);
            Err(database_error("Failed to create title"))
        }
    }
}

/// Get a specific title by ID
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}",
    tag = "titles",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
    ),
    responses(
        (status = 200, description = "Title retrieved successfully", body = ApiResponse<TitleResponse>),
        (status = 404, description = "Title not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_title(
    Path(title_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TitleResponse>>, ApiError> {
    let title = match title::Entity::find_by_id(title_id).one(&state.db).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            warn!("Title {} not found", title_id);
            return Err(not_found(format!("Title with ID {title_id} not found")));
        }
        Err(e) => {
            error!("Failed to fetch title {}: {}", title_id, e);
            return Err(database_error("Failed to fetch title"));
        }
    };

    match build_title_responses(&state.db, vec![title]).await {
        Ok(mut responses) => Ok(Json(ApiResponse {
            data: responses.remove(0),
            message: "Title retrieved successfully".to_string(),
            success: true,
        })),
        Err(e) => {
            error!("Failed to assemble title response: {}", e);
            Err(database_error("Failed to fetch title"))
        }
    }
}

/// Partially update a title
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}",
    tag = "titles",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
    ),
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Title updated successfully", body = ApiResponse<TitleResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 404, description = "Title not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_title(
    Path(title_id): Path<i32>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<UpdateTitleRequest>,
) -> Result<Json<ApiResponse<TitleResponse>>, ApiError> {
    if !permissions::admin_or_read_only(false, Some(&requester)) {
        warn!("User '{}' attempted to update title {}", requester.username, title_id);
        return Err(forbidden("Administrator privileges are required"));
    }

    let existing = match title::Entity::find_by_id(title_id).one(&state.db).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            warn!("Title {} not found for update", title_id);
            return Err(not_found(format!("Title with ID {title_id} not found")));
        }
        Err(e) => {
            error!("Failed to fetch title {}: {}", title_id, e);
            return Err(database_error("Failed to fetch title"));
        }
    };

    let mut violations = validation::violations_from(request.validate());
    if let Some(year) = request.year {
        if let Some(violation) = validation::year_violation(year) {
            violations.push(violation);
        }
    }
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let category = match &request.category {
        Some(slug) => Some(resolve_category_slug(&state.db, slug).await?),
        None => None,
    };
    let genres = match &request.genre {
        Some(slugs) => Some(resolve_genre_slugs(&state.db, slugs).await?),
        None => None,
    };

    let mut title_active: title::ActiveModel = existing.into();
    if let Some(name) = request.name {
        title_active.name = Set(name);
    }
    if let Some(year) = request.year {
        title_active.year = Set(year);
    }
    if request.description.is_some() {
        title_active.description = Set(request.description);
    }
    if let Some(category) = category {
        title_active.category_id = Set(Some(category.id));
    }

    let updated = match title_active.update(&state.db).await {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to update title {}: {}", title_id, e);
            return Err(database_error("Failed to update title"));
        }
    };

    if let Some(genres) = genres {
        if let Err(e) = replace_genre_links(&state.db, updated.id, &genres).await {
            error!("Failed to replace genres of title {}: {}", title_id, e);
            return Err(database_error("Failed to update title"));
        }
    }

    match build_title_responses(&state.db, vec![updated]).await {
        Ok(mut responses) => {
            info!("Title {} updated successfully", title_id);
            Ok(Json(ApiResponse {
                data: responses.remove(0),
                message: "Title updated successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to assemble title response: {}", e);
            Err(database_error("Failed to update title"))
        }
    }
}

/// Delete a title
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}",
    tag = "titles",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
    ),
    responses(
        (status = 204, description = "Title deleted successfully"),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester is not an admin", body = ErrorResponse),
        (status = 404, description = "Title not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_title(
    Path(title_id): Path<i32>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<StatusCode, ApiError> {
    if !permissions::admin_or_read_only(false, Some(&requester)) {
        warn!("User '{}' attempted to delete title {}", requester.username, title_id);
        return Err(forbidden("Administrator privileges are required"));
    }

    // Reviews and their comments go with the title (ON DELETE CASCADE)
    match title::Entity::delete_by_id(title_id).exec(&state.db).await {
        Ok(result) if result.rows_affected > 0 => {
            info!("Title {} deleted successfully", title_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(_) => {
            warn!("Title {} not found for deletion", title_id);
            Err(not_found(format!("Title with ID {title_id} not found")))
        }
        Err(e) => {
            error!("Failed to delete title {}: {}", title_id, e);
            Err(database_error("Failed to delete title"))
        }
    }
}
