//! Reviews repository

use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::review::{CreateReview, RatingStats, Review, ReviewRow, UpdateReview},
};

const SELECT_REVIEWS: &str = r#"
    SELECT r.id, r.review, r.rating, r.created_at, r.tour_id, r.user_id,
           u.name AS user_name, u.photo AS user_photo
    FROM reviews r
    LEFT JOIN users u ON u.id = r.user_id
"#;

#[derive(Clone)]
pub struct ReviewsRepository {
    pool: Pool<Postgres>,
}

impl ReviewsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List reviews, optionally restricted to one tour, newest first
    pub async fn list(&self, tour_id: Option<Uuid>) -> AppResult<Vec<Review>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_REVIEWS);
        if let Some(tour_id) = tour_id {
            qb.push(" WHERE r.tour_id = ").push_bind(tour_id);
        }
        qb.push(" ORDER BY r.created_at DESC, r.id");

        let rows = qb.build_query_as::<ReviewRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Review> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_REVIEWS);
        qb.push(" WHERE r.id = ").push_bind(id);

        qb.build_query_as::<ReviewRow>()
            .fetch_optional(&self.pool)
            .await?
            .map(Review::from)
            .ok_or_else(|| AppError::NotFound("No review found with that ID".to_string()))
    }

    pub async fn insert(&self, id: Uuid, tour_id: Uuid, data: &CreateReview) -> AppResult<Review> {
        sqlx::query("INSERT INTO reviews (id, review, rating, tour_id, user_id) VALUES ($1, $2, $3, $4, $5)")
            .bind(id)
            .bind(&data.review)
            .bind(data.rating)
            .bind(tour_id)
            .bind(data.user)
            .execute(&self.pool)
            .await?;
        self.get_by_id(id).await
    }

    /// Update a review, returning the updated review
    pub async fn update(&self, id: Uuid, data: &UpdateReview) -> AppResult<Review> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE reviews SET id = id");
        if let Some(ref review) = data.review {
            qb.push(", review = ").push_bind(review.clone());
        }
        if let Some(rating) = data.rating {
            qb.push(", rating = ").push_bind(rating);
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("No review found with that ID".to_string()));
        }
        self.get_by_id(id).await
    }

    /// Delete a review, returning the tour it belonged to
    pub async fn delete(&self, id: Uuid) -> AppResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>("DELETE FROM reviews WHERE id = $1 RETURNING tour_id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No review found with that ID".to_string()))
    }

    /// Number of reviews and mean rating of a tour
    pub async fn rating_stats(&self, tour_id: Uuid) -> AppResult<RatingStats> {
        Ok(sqlx::query_as::<_, RatingStats>(
            "SELECT COUNT(*) AS quantity, AVG(rating)::float8 AS average FROM reviews WHERE tour_id = $1",
        )
        .bind(tour_id)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM reviews").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
