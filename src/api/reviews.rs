//! Reviews API endpoints, also mounted under `/tours/{id}/reviews`

use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::review::{CreateReview, Review, UpdateReview},
    AppState,
};

use super::{ApiJson, ApiPath, Envelope};

/// List all reviews
#[utoipa::path(
    get,
    path = "/reviews",
    tag = "reviews",
    responses(
        (status = 200, description = "Reviews", body = [Review])
    )
)]
pub async fn list_reviews(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<Review>>>> {
    let reviews = state.services.reviews.list(None).await?;
    Ok(Json(Envelope::list("reviews", reviews)))
}

/// List reviews of one tour
#[utoipa::path(
    get,
    path = "/tours/{id}/reviews",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Tour ID")),
    responses(
        (status = 200, description = "Reviews of the tour", body = [Review])
    )
)]
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    ApiPath(tour_id): ApiPath<Uuid>,
) -> AppResult<Json<Envelope<Vec<Review>>>> {
    let reviews = state.services.reviews.list(Some(tour_id)).await?;
    Ok(Json(Envelope::list("reviews", reviews)))
}

/// Get review by ID
#[utoipa::path(
    get,
    path = "/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review", body = Review),
        (status = 404, description = "Review not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Envelope<Review>>> {
    let review = state.services.reviews.get_by_id(id).await?;
    Ok(Json(Envelope::new("review", review)))
}

/// Create a review; `tour` must be given in the body
#[utoipa::path(
    post,
    path = "/reviews",
    tag = "reviews",
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 409, description = "User already reviewed this tour", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_review(
    State(state): State<AppState>,
    ApiJson(data): ApiJson<CreateReview>,
) -> AppResult<(StatusCode, Json<Envelope<Review>>)> {
    let review = state.services.reviews.create(None, data).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new("review", review))))
}

/// Create a review of the tour in the path
#[utoipa::path(
    post,
    path = "/tours/{id}/reviews",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Tour ID")),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review created", body = Review)
    )
)]
pub async fn create_tour_review(
    State(state): State<AppState>,
    ApiPath(tour_id): ApiPath<Uuid>,
    ApiJson(data): ApiJson<CreateReview>,
) -> AppResult<(StatusCode, Json<Envelope<Review>>)> {
    let review = state.services.reviews.create(Some(tour_id), data).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new("review", review))))
}

/// Update a review
#[utoipa::path(
    patch,
    path = "/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review ID")),
    request_body = UpdateReview,
    responses(
        (status = 200, description = "Review updated", body = Review)
    )
)]
pub async fn update_review(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(data): ApiJson<UpdateReview>,
) -> AppResult<Json<Envelope<Review>>> {
    let review = state.services.reviews.update(id, data).await?;
    Ok(Json(Envelope::new("review", review)))
}

/// Delete a review
#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Review deleted")
    )
)]
pub async fn delete_review(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.services.reviews.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
