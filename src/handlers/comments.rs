use crate::auth::AuthUser;
use crate::handlers::reviews::find_scoped_review;
use crate::permissions;
use crate::schemas::{
    database_error, forbidden, not_found, validation_error, ApiError, ApiResponse, AppState,
    ErrorResponse,
};
use crate::validation;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::{comment, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for creating a comment
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCommentRequest {
    /// Comment text
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
}

/// Request body for partially updating a comment
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateCommentRequest {
    /// Comment text
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: Option<String>,
}

/// Comment response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    /// Username of the comment author
    pub author: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

/// Query parameters for listing comments
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct CommentQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

async fn build_comment_responses(
    db: &DatabaseConnection,
    comments: Vec<comment::Model>,
) -> Result<Vec<CommentResponse>, DbErr> {
    let author_ids: Vec<i32> = comments.iter().map(|c| c.author_id).collect();
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

    Ok(comments
        .into_iter()
        .map(|c| CommentResponse {
            author: authors.get(&c.author_id).cloned().unwrap_or_default(),
            id: c.id,
            text: c.text,
            pub_date: c.pub_date,
        })
        .collect())
}

/// 404 unless the comment exists and belongs to the path's review.
async fn find_scoped_comment(
    db: &DatabaseConnection,
    review_id: i32,
    comment_id: i32,
) -> Result<comment::Model, ApiError> {
    match comment::Entity::find_by_id(comment_id)
        .filter(comment::Column::ReviewId.eq(review_id))
        .one(db)
        .await
    {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            warn!("Comment {} not found under review {}", comment_id, review_id);
            Err(not_found(format!(
                "Comment with ID {comment_id} not found for review {review_id}"
            )))
        }
        Err(e) => {
            error!("Failed to fetch comment {}: {}", comment_id, e);
            Err(database_error("Failed to fetch comment"))
        }
    }
}

/// Get all comments on a review
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        CommentQuery,
    ),
    responses(
        (status = 200, description = "Comments retrieved successfully", body = ApiResponse<Vec<CommentResponse>>),
        (status = 404, description = "Title or review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_comments(
    Path((title_id, review_id)): Path<(i32, i32)>,
    Valid(Query(query)): Valid<Query<CommentQuery>>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CommentResponse>>>, ApiError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    debug!(
        "Fetching comments of review {} under title {} - page: {}, limit: {}",
        review_id, title_id, page, limit
    );

    find_scoped_review(&state.db, title_id, review_id).await?;

    let comments = match comment::Entity::find()
        .filter(comment::Column::ReviewId.eq(review_id))
        .order_by_asc(comment::Column::PubDate)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
    {
        Ok(comments) => comments,
        Err(e) => {
            error!("Failed to fetch comments of review {}: {}", review_id, e);
            return Err(database_error("Failed to fetch comments"));
        }
    };

    match build_comment_responses(&state.db, comments).await {
        Ok(responses) => {
            info!("Retrieved {} comments for review {}", responses.len(), review_id);
            Ok(Json(ApiResponse {
                data: responses,
                message: "Comments retrieved successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to assemble comment responses: {}", e);
            Err(database_error("Failed to fetch comments"))
        }
    }
}

/// Create a comment on a review
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created successfully", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 404, description = "Title or review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_comment(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponse>>), ApiError> {
    let review = find_scoped_review(&state.db, title_id, review_id).await?;

    let violations = validation::violations_from(request.validate());
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let new_comment = comment::ActiveModel {
        review_id: Set(review.id),
        author_id: Set(requester.id),
        text: Set(request.text.clone()),
        pub_date: Set(Utc::now()),
        ..Default::default()
    };

    match new_comment.insert(&state.db).await {
        Ok(model) => {
            info!("Comment created successfully with ID: {}", model.id);
            let response = CommentResponse {
                id: model.id,
                author: requester.username,
                text: model.text,
                pub_date: model.pub_date,
            };
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse {
                    data: response,
                    message: "Comment created successfully".to_string(),
                    success: true,
                }),
            ))
        }
        Err(e) => {
            error!("Failed to create comment: {}", e);
            Err(database_error("Failed to create comment"))
        }
    }
}

/// Get a specific comment on a review
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 200, description = "Comment retrieved successfully", body = ApiResponse<CommentResponse>),
        (status = 404, description = "Title, review or comment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_comment(
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CommentResponse>>, ApiError> {
    find_scoped_review(&state.db, title_id, review_id).await?;
    let comment = find_scoped_comment(&state.db, review_id, comment_id).await?;

    match build_comment_responses(&state.db, vec![comment]).await {
        Ok(mut responses) => Ok(Json(ApiResponse {
            data: responses.remove(0),
            message: "Comment retrieved successfully".to_string(),
            success: true,
        })),
        Err(e) => {
            error!("Failed to assemble comment response: {}", e);
            Err(database_error("Failed to fetch comment"))
        }
    }
}

/// Partially update a comment
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated successfully", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester may not modify this comment", body = ErrorResponse),
        (status = 404, description = "Title, review or comment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_comment(
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<ApiResponse<CommentResponse>>, ApiError> {
    find_scoped_review(&state.db, title_id, review_id).await?;
    let comment = find_scoped_comment(&state.db, review_id, comment_id).await?;

    if !permissions::can_modify_object(&requester, comment.author_id) {
        warn!(
            "User '{}' may not modify comment {}",
            requester.username, comment_id
        );
        return Err(forbidden("Only the author, a moderator or an admin may modify a comment"));
    }

    let violations = validation::violations_from(request.validate());
    if !violations.is_empty() {
        return Err(validation_error(violations));
    }

    let mut comment_active: comment::ActiveModel = comment.into();
    if let Some(text) = request.text {
        comment_active.text = Set(text);
    }

    let updated = match comment_active.update(&state.db).await {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to update comment {}: {}", comment_id, e);
            return Err(database_error("Failed to update comment"));
        }
    };

    match build_comment_responses(&state.db, vec![updated]).await {
        Ok(mut responses) => {
            info!("Comment {} updated successfully", comment_id);
            Ok(Json(ApiResponse {
                data: responses.remove(0),
                message: "Comment updated successfully".to_string(),
                success: true,
            }))
        }
        Err(e) => {
            error!("Failed to assemble comment response: {}", e);
            Err(database_error("Failed to update comment"))
        }
    }
}

/// Delete a comment
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted successfully"),
        (status = 401, description = "Missing credentials", body = ErrorResponse),
        (status = 403, description = "Requester may not delete this comment", body = ErrorResponse),
        (status = 404, description = "Title, review or comment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_comment(
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<StatusCode, ApiError> {
    find_scoped_review(&state.db, title_id, review_id).await?;
    let comment = find_scoped_comment(&state.db, review_id, comment_id).await?;

    if !permissions::can_modify_object(&requester, comment.author_id) {
        warn!(
            "User '{}' may not delete comment {}",
            requester.username, comment_id
        );
        return Err(forbidden("Only the author, a moderator or an admin may delete a comment"));
    }

    match comment::Entity::delete_by_id(comment.id).exec(&state.db).await {
        Ok(_) => {
            info!("Comment {} deleted successfully", comment_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!("Failed to delete comment {}: {}", comment_id, e);
            Err(database_error("Failed to delete comment"))
        }
    }
}
