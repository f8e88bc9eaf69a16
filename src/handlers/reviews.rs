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
use chrono::{DateTime, Utc};
use model::entities::{review, title, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a review
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateReviewRequest {
    /// Review text
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
    /// Integer score in [1, 10]
    pub score: i16,
}

/// Request body for partially updating a review
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateReviewRequest {
    /// Review text
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: Option<String>,
    /// Integer score in [1, 10]
    pub score: Option<i16>,
}

/// Review response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    /// Username of the review author
    pub author: String,
    pub text: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

/// Query parameters for listing reviews
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ReviewQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// Resolve author usernames for a page of reviews in one batch query.
async fn build_review_responses(
    db: &DatabaseConnection,
    reviews: Vec<review::Model>,
) -> Result<Vec<ReviewResponse>, DbErr> {
    let author_ids: Vec<i32> = reviews.iter().map(|r| r.author_id).collect();
    let authors: HashMap<i32, String> = if author_ids.is_empty() {
        HashMap::new()
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(author_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect()
    };

    Ok(reviews
        .into_iter()
        .map(|r| ReviewResponse {
            author: authors.get(&r.author_id).cloned().unwrap_or_default(),
            id: r.id,
            text: r.text,
            score: r.score,
            pub_date: r.pub_date,
        })
        .collect())
}

/// 404 unless the path's title exists.
pub(super) async fn ensure_title(
    db: &DatabaseConnection,
    title_id: i32,
) -> Result<title::Model, ApiError> {
    match title::Entity::find_by_id(title_id).one(db).await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            warn!("Title {} not found", title_id);
            Err(not_found(format!("Title with ID {title_id} not found")))
        }
        Err(e) => {
            error!("Failed to fetch title {}: {}", title_id, e);
            Err(database_error("Failed to fetch title"))
        }
    }
}

/// 404 unless the review exists and belongs to the path's title.
pub(super) async fn find_scoped_review(
    db: &DatabaseConnection,
    title_id: i32,
    review_id: i32,
) -> Result<review::Model, ApiError> {
    ensure_title(db, title_id).await?;
    match review::Entity::find_by_id(review_id)
        .filter(review::Column::TitleId.eq(title_id))
        .one(db)
        .await
    {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            warn!("Review {} not found under title {}", review_id, title_id);
            Err(not_found(format!(
                "Review with ID {review_id} not found for title {title_id}"
            )))
        }
        Err(e) => {
            error!("Failed to fetch review {}: {}", review_id, e);
            Err(database_error("Failed to fetch review"))
        }
    }
}

/// Get all reviews of a title
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ReviewQuery,
    ),
    responses(
        (status = 200, description = "Reviews retrieved successfully", body = ApiResponse<Vec<ReviewResponse>>),
        (status = 404, description = "Title not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_reviews(
    Path(title_id): Path<i32>,
    Valid(Query(query)): Valid<Query<ReviewQuery>>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ReviewResponse>>>, ApiError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    debug!("Fetching reviews of title {} - page: {}, limit: {}", title_id, page, limit);

    ensure_title(&state.db, title_id).await?;

    let reviews = match review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .order_by_asc(review::Column::PubDate)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
    {
        Ok(reviews) => reviews,
        Err(e) => {
            error!("Failed to fetch reviews of title {}: {}", title_id, e);
            return Err(database_error("Failed to fetch reviews"));
        }
    };

    match build_review_responses(&state.db, reviews).await {
        Ok(responses) => {
            info!("Retrieved {} reviews for title {}", responses.len(), title_id);
            Ok(Json(ApiResponse {
                data: responses,
                message: "Reviews retrieved successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to assemble review responses: {}", e);
            Err(database_error("Failed to fetch reviews"))
        }
    }
}

/// Create a review of a title
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
    ),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request data or duplicate review", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 404, description = "Title not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_review(
    Path(title_id): Path<i32>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReviewResponse>>), ApiError> {
    ensure_title(&state.db, title_id).await?;

    let mut violations = validation::violations_from(request.validate());
    if let Some(violation) = validation::score_violation(request.score) {
        violations.push(violation);
    }
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let duplicate = FieldViolation::new("title", "you have already reviewed this title");

    // Checked here for a descriptive error; the unique index on
    // (title_id, author_id) still decides the race between two
    // concurrent creates.
    match review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .filter(review::Column::AuthorId.eq(requester.id))
        .one(&state.db)
        .await
    {
        Ok(Some(_)) => {
            warn!(
                "User '{}' already reviewed title {}",
                requester.username, title_id
            );
            return Err(validation_error(vec![duplicate]));
        }
        Ok(None) => {}
        Err(e) => {
            error!("Failed to check for an existing review: {}", e);
            return Err(database_error("Failed to create review"));
        }
    }

    let new_review = review::ActiveModel {
        title_id: Set(title_id),
        author_id: Set(requester.id),
        text: Set(request.text.clone()),
        score: Set(request.score),
        pub_date: Set(Utc::now()),
        ..Default::default()
    };

    match new_review.insert(&state.db).await {
        Ok(model) => {
            info!("Review created successfully with ID: {}", model.id);
            let response = ReviewResponse {
                id: model.id,
                author: requester.username,
                text: model.text,
                score: model.score,
                pub_date: model.pub_date,
            };
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse {
                    data: response,
                    message: "Review created successfully".to_string(),
                    success: true,
                }),
            ))
        }
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                warn!(
                    "Concurrent duplicate review by '{}' for title {}",
                    requester.username, title_id
                );
                return Err(validation_error(vec![duplicate]));
            }
            error!("Failed to create review: {}", e);
            Err(database_error("Failed to create review"))
        }
    }
}

/// Get a specific review of a title
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 200, description = "Review retrieved successfully", body = ApiResponse<ReviewResponse>),
        (status = 404, description = "Title or review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_review(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let review = find_scoped_review(&state.db, title_id, review_id).await?;

    match build_review_responses(&state.db, vec![review]).await {
        Ok(mut responses) => Ok(Json(ApiResponse {
            data: responses.remove(0),
            message: "Review retrieved successfully".to_string(),
            success: true,
        })),
        Err(e) => {
            error!("Failed to assemble review response: {}", e);
            Err(database_error("Failed to fetch review"))
        }
    }
}

/// Partially update a review
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester may not modify this review", body = ErrorResponse),
        (status = 404, description = "Title or review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_review(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<UpdateReviewRequest>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let review = find_scoped_review(&state.db, title_id, review_id).await?;

    if !permissions::can_modify_object(&requester, review.author_id) {
        warn!(
            "User '{}' may not modify review {}",
            requester.username, review_id
        );
        return Err(forbidden("Only the author, a moderator or an admin may modify a review"));
    }

    let mut violations = validation::violations_from(request.validate());
    if let Some(score) = request.score {
        if let Some(violation) = validation::score_violation(score) {
            violations.push(violation);
        }
    }
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let mut review_active: review::ActiveModel = review.into();
    if let Some(text) = request.text {
        review_active.text = Set(text);
    }
    if let Some(score) = request.score {
        review_active.score = Set(score);
    }

    let updated = match review_active.update(&state.db).await {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to update review {}: {}", review_id, e);
            return Err(database_error("Failed to update review"));
        }
    };

    match build_review_responses(&state.db, vec![updated]).await {
        Ok(mut responses) => {
            info!("Review {} updated successfully", review_id);
            Ok(Json(ApiResponse {
                data: responses.remove(0),
                message: "Review updated successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to assemble review response: {}", e);
            Err(database_error("Failed to update review"))
        }
    }
}

/// Delete a review
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 204, description = "Review deleted successfully"),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester may not delete this review", body = ErrorResponse),
        (status = 404, description = "Title or review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_review(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<StatusCode, ApiError> {
    let review = find_scoped_review(&state.db, title_id, review_id).await?;

    if !permissions::can_modify_object(&requester, review.author_id) {
        warn!(
            "User '{}' may not delete review {}",
            requester.username, review_id
        );
        return Err(forbidden("Only the author, a moderator or an admin may delete a review"));
    }

    // Comments on the review go with it (ON DELETE CASCADE)
    match review::Entity::delete_by_id(review.id).exec(&state.db).await {
        Ok(_) => {
            info!("Review {} deleted successfully", review_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!("Failed to delete review {}: {}", review_id, e);
            Err(database_error("Failed to delete review"))
        }
    }
}
