use crate::handlers::{
    auth::{signup, token},
    categories::{create_category, delete_category, get_categories},
    comments::{create_comment, delete_comment, get_comment, get_comments, update_comment},
    genres::{create_genre, delete_genre, get_genres},
    health::health_check,
    reviews::{create_review, delete_review, get_review, get_reviews, update_review},
    titles::{create_title, delete_title, get_title, get_titles, update_title},
    users::{create_user, delete_user, get_me, get_user, get_users, update_me, update_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Signup and token issuance
        .route("/api/v1/auth/signup", post(signup))
        .route("/api/v1/auth/token", post(token))
        // Category routes (list/create/delete by slug)
        .route("/api/v1/categories", get(get_categories))
        .route("/api/v1/categories", post(create_category))
        .route("/api/v1/categories/:slug", delete(delete_category))
        // Genre routes (list/create/delete by slug)
        .route("/api/v1/genres", get(get_genres))
        .route("/api/v1/genres", post(create_genre))
        .route("/api/v1/genres/:slug", delete(delete_genre))
        // Title CRUD routes (partial update only, no PUT)
        .route("/api/v1/titles", get(get_titles))
        .route("/api/v1/titles", post(create_title))
        .route("/api/v1/titles/:title_id", get(get_title))
        .route("/api/v1/titles/:title_id", patch(update_title))
        .route("/api/v1/titles/:title_id", delete(delete_title))
        // Review routes, nested under a title
        .route("/api/v1/titles/:title_id/reviews", get(get_reviews))
        .route("/api/v1/titles/:title_id/reviews", post(create_review))
        .route("/api/v1/titles/:title_id/reviews/:review_id", get(get_review))
        .route("/api/v1/titles/:title_id/reviews/:review_id", patch(update_review))
        .route("/api/v1/titles/:title_id/reviews/:review_id", delete(delete_review))
        // Comment routes, nested under a review
        .route("/api/v1/titles/:title_id/reviews/:review_id/comments", get(get_comments))
        .route("/api/v1/titles/:title_id/reviews/:review_id/comments", post(create_comment))
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/comments/:comment_id",
            get(get_comment),
        )
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/comments/:comment_id",
            patch(update_comment),
        )
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/comments/:comment_id",
            delete(delete_comment),
        )
        // User directory (admin) and self profile
        .route("/api/v1/users", get(get_users))
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/me", get(get_me))
        .route("/api/v1/users/me", patch(update_me))
        .route("/api/v1/users/:username", get(get_user))
        .route("/api/v1/users/:username", patch(update_user))
        .route("/api/v1/users/:username", delete(delete_user))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
