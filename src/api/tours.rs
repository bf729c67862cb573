//! Tours API endpoints

use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        geo::{DistanceUnit, LatLng},
        tour::{CreateTour, Tour, TourDistance, TourDocument, TourQuery, UpdateTour},
    },
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, Envelope};

fn render(tours: Vec<Tour>, query: &TourQuery) -> AppResult<Vec<Value>> {
    tours
        .into_iter()
        .map(|tour| {
            serde_json::to_value(TourDocument::from(tour))
                .map(|doc| query.project(doc))
                .map_err(|e| AppError::Internal(format!("Failed to serialize tour: {}", e)))
        })
        .collect()
}

/// List tours
///
/// Supports `field=value` and `field[gte|gt|lte|lt|ne]=value` filters on
/// duration, ratingsQuantity, ratingsAverage, maxGroupSize, difficulty and price,
/// plus `sort`, `fields`, `page` and `limit`.
#[utoipa::path(
    get,
    path = "/tours",
    tag = "tours",
    responses(
        (status = 200, description = "Visible tours", body = [TourDocument]),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_tours(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> AppResult<Json<Envelope<Vec<Value>>>> {
    let query = TourQuery::from_params(&params)?;
    let tours = state.services.tours.list(&query).await?;
    Ok(Json(Envelope::list("tours", render(tours, &query)?)))
}

/// The five best rated, cheapest tours
#[utoipa::path(
    get,
    path = "/tours/top-5-cheap",
    tag = "tours",
    responses(
        (status = 200, description = "Top tours", body = [TourDocument])
    )
)]
pub async fn top_cheap_tours(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<Value>>>> {
    let query = TourQuery::top_cheap();
    let tours = state.services.tours.list(&query).await?;
    Ok(Json(Envelope::list("tours", render(tours, &query)?)))
}

/// Get a tour with its guides and reviews
#[utoipa::path(
    get,
    path = "/tours/{id}",
    tag = "tours",
    params(("id" = Uuid, Path, description = "Tour ID")),
    responses(
        (status = 200, description = "Tour details", body = TourDocument),
        (status = 404, description = "No visible tour with that ID", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_tour(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Envelope<TourDocument>>> {
    let tour = state.services.tours.get_with_reviews(id).await?;
    Ok(Json(Envelope::new("tour", tour)))
}

/// Create a tour
#[utoipa::path(
    post,
    path = "/tours",
    tag = "tours",
    request_body = CreateTour,
    responses(
        (status = 201, description = "Tour created", body = TourDocument),
        (status = 400, description = "Invalid tour", body = crate::error::ErrorResponse),
        (status = 409, description = "Duplicate name", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_tour(
    State(state): State<AppState>,
    ApiJson(data): ApiJson<CreateTour>,
) -> AppResult<(StatusCode, Json<Envelope<TourDocument>>)> {
    let tour = state.services.tours.create(data).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new("tour", tour.into()))))
}

/// Update a tour
#[utoipa::path(
    patch,
    path = "/tours/{id}",
    tag = "tours",
    params(("id" = Uuid, Path, description = "Tour ID")),
    request_body = UpdateTour,
    responses(
        (status = 200, description = "Tour updated", body = TourDocument),
        (status = 404, description = "No visible tour with that ID", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_tour(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(data): ApiJson<UpdateTour>,
) -> AppResult<Json<Envelope<TourDocument>>> {
    let tour = state.services.tours.update(id, data).await?;
    Ok(Json(Envelope::new("tour", tour.into())))
}

/// Delete a tour
#[utoipa::path(
    delete,
    path = "/tours/{id}",
    tag = "tours",
    params(("id" = Uuid, Path, description = "Tour ID")),
    responses(
        (status = 204, description = "Tour deleted"),
        (status = 404, description = "No visible tour with that ID", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_tour(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.services.tours.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Statistics per difficulty for tours rated 4.5 or more
#[utoipa::path(
    get,
    path = "/tours/tour-stats",
    tag = "tours",
    responses(
        (status = 200, description = "Statistics, cheapest average price first")
    )
)]
pub async fn tour_stats(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<Value>>>> {
    let stats = state.services.tours.stats().await?;
    Ok(Json(Envelope::new("stats", stats)))
}

/// Tour starts per month of a year
#[utoipa::path(
    get,
    path = "/tours/monthly-plan/{year}",
    tag = "tours",
    params(("year" = i32, Path, description = "Calendar year")),
    responses(
        (status = 200, description = "Months with their starting tours, busiest first")
    )
)]
pub async fn monthly_plan(
    State(state): State<AppState>,
    ApiPath(year): ApiPath<i32>,
) -> AppResult<Json<Envelope<Vec<Value>>>> {
    let plan = state.services.tours.monthly_plan(year).await?;
    Ok(Json(Envelope::new("plan", plan)))
}

/// Tours starting within a distance of a point
#[utoipa::path(
    get,
    path = "/tours/tours-within/{distance}/center/{latlng}/unit/{unit}",
    tag = "tours",
    params(
        ("distance" = f64, Path, description = "Radius"),
        ("latlng" = String, Path, description = "Center as lat,lng"),
        ("unit" = String, Path, description = "mi for miles, anything else for kilometers")
    ),
    responses(
        (status = 200, description = "Tours in range", body = [TourDocument]),
        (status = 400, description = "Malformed center", body = crate::error::ErrorResponse)
    )
)]
pub async fn tours_within(
    State(state): State<AppState>,
    ApiPath((distance, latlng, unit)): ApiPath<(f64, String, String)>,
) -> AppResult<Json<Envelope<Vec<TourDocument>>>> {
    let center: LatLng = latlng.parse()?;
    let tours = state
        .services
        .tours
        .within(distance, center, DistanceUnit::parse(&unit))
        .await?;
    Ok(Json(Envelope::list(
        "data",
        tours.into_iter().map(TourDocument::from).collect(),
    )))
}

/// Distance from a point to every tour start, nearest first
#[utoipa::path(
    get,
    path = "/tours/distances/{latlng}/unit/{unit}",
    tag = "tours",
    params(
        ("latlng" = String, Path, description = "Point as lat,lng"),
        ("unit" = String, Path, description = "mi for miles, anything else for kilometers")
    ),
    responses(
        (status = 200, description = "Distances", body = [TourDistance]),
        (status = 400, description = "Malformed point", body = crate::error::ErrorResponse)
    )
)]
pub async fn tour_distances(
    State(state): State<AppState>,
    ApiPath((latlng, unit)): ApiPath<(String, String)>,
) -> AppResult<Json<Envelope<Vec<TourDistance>>>> {
    let center: LatLng = latlng.parse()?;
    let distances = state
        .services
        .tours
        .distances(center, DistanceUnit::parse(&unit))
        .await?;
    Ok(Json(Envelope::new("data", distances)))
}
