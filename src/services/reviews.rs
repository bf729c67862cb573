//! Reviews service. Every write refreshes the rating statistics of the reviewed tour.

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::review::{CreateReview, Review, UpdateReview},
    repository::Repository,
};

#[derive(Clone)]
pub struct ReviewsService {
    repository: Repository,
}

impl ReviewsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, tour_id: Option<Uuid>) -> AppResult<Vec<Review>> {
        self.repository.reviews.list(tour_id).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Review> {
        self.repository.reviews.get_by_id(id).await
    }

    /// Create a review; the route tour ID wins over the body one
    pub async fn create(&self, route_tour: Option<Uuid>, data: CreateReview) -> AppResult<Review> {
        self.import(Uuid::new_v4(), route_tour, data).await
    }

    pub async fn import(&self, id: Uuid, route_tour: Option<Uuid>, data: CreateReview) -> AppResult<Review> {
        let data = CreateReview {
            review: data.review.trim().to_string(),
            ..data
        };
        data.validate()?;
        let tour_id = route_tour
            .or(data.tour)
            .ok_or_else(|| AppError::Validation("Review must belong to a tour.".to_string()))?;

        let review = self.repository.reviews.insert(id, tour_id, &data).await?;
        self.refresh_ratings(tour_id).await?;
        Ok(review)
    }

    pub async fn update(&self, id: Uuid, data: UpdateReview) -> AppResult<Review> {
        data.validate()?;
        let review = self.repository.reviews.update(id, &data).await?;
        self.refresh_ratings(review.tour).await?;
        Ok(review)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let tour_id = self.repository.reviews.delete(id).await?;
        self.refresh_ratings(tour_id).await
    }

    /// Recompute ratings quantity and average of a tour from its reviews
    pub async fn refresh_ratings(&self, tour_id: Uuid) -> AppResult<()> {
        let stats = self.repository.reviews.rating_stats(tour_id).await?;
        tracing::debug!(tour_id = %tour_id, quantity = stats.quantity, "Refreshing tour ratings");
        self.repository
            .tours
            .update_ratings(tour_id, stats.quantity, stats.average)
            .await
    }
}
