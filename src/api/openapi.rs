//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{bookings, health, reviews, tours, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Natours API",
        version = "1.0.0",
        description = "Tour booking REST API",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Tours
        tours::list_tours,
        tours::top_cheap_tours,
        tours::get_tour,
        tours::create_tour,
        tours::update_tour,
        tours::delete_tour,
        tours::tour_stats,
        tours::monthly_plan,
        tours::tours_within,
        tours::tour_distances,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Reviews
        reviews::list_reviews,
        reviews::list_tour_reviews,
        reviews::get_review,
        reviews::create_review,
        reviews::create_tour_review,
        reviews::update_review,
        reviews::delete_review,
        // Bookings
        bookings::list_bookings,
        bookings::get_booking,
        bookings::create_booking,
        bookings::update_booking,
        bookings::delete_booking,
    ),
    components(
        schemas(
            // Tours
            crate::models::tour::Tour,
            crate::models::tour::TourDocument,
            crate::models::tour::TourDistance,
            crate::models::tour::CreateTour,
            crate::models::tour::UpdateTour,
            crate::models::tour::Difficulty,
            crate::models::geo::GeoPoint,
            crate::models::geo::PointKind,
            crate::models::geo::Location,
            // Users
            crate::models::user::User,
            crate::models::user::GuideSummary,
            crate::models::user::Role,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            // Reviews
            crate::models::review::Review,
            crate::models::review::ReviewAuthor,
            crate::models::review::CreateReview,
            crate::models::review::UpdateReview,
            // Bookings
            crate::models::booking::Booking,
            crate::models::booking::CreateBooking,
            crate::models::booking::UpdateBooking,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "tours", description = "Tour catalogue, statistics and geo queries"),
        (name = "users", description = "User management"),
        (name = "reviews", description = "Tour reviews"),
        (name = "bookings", description = "Tour bookings")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_tour_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/tours"));
        assert!(doc.paths.paths.contains_key("/tours/{id}"));
        assert!(doc.paths.paths.contains_key("/tours/monthly-plan/{year}"));
    }
}
