//! Review model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Internal row structure for review queries joined with their author
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    id: Uuid,
    review: String,
    rating: i32,
    created_at: DateTime<Utc>,
    tour_id: Uuid,
    user_id: Uuid,
    user_name: Option<String>,
    user_photo: Option<String>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            review: row.review,
            rating: row.rating,
            created_at: row.created_at,
            tour: row.tour_id,
            user: ReviewAuthor {
                id: row.user_id,
                name: row.user_name,
                photo: row.user_photo,
            },
        }
    }
}

/// Author of a review, as shown next to it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewAuthor {
    pub id: Uuid,
    pub name: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    /// 1 to 5
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub tour: Uuid,
    pub user: ReviewAuthor,
}

/// Create review request. `tour` may come from the route instead of the body.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    pub tour: Option<Uuid>,
    pub user: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReview {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
}

/// Review count and mean rating of one tour
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct RatingStats {
    pub quantity: i64,
    pub average: Option<f64>,
}
