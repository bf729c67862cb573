//! Bookings API endpoints

use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::booking::{Booking, CreateBooking, UpdateBooking},
    AppState,
};

use super::{ApiJson, ApiPath, Envelope};

/// List bookings
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    responses(
        (status = 200, description = "Bookings", body = [Booking])
    )
)]
pub async fn list_bookings(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<Booking>>>> {
    let bookings = state.services.bookings.list().await?;
    Ok(Json(Envelope::list("bookings", bookings)))
}

/// Get booking by ID
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking", body = Booking),
        (status = 404, description = "Booking not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Envelope<Booking>>> {
    let booking = state.services.bookings.get_by_id(id).await?;
    Ok(Json(Envelope::new("booking", booking)))
}

/// Create a booking
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Booking created", body = Booking)
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    ApiJson(data): ApiJson<CreateBooking>,
) -> AppResult<(StatusCode, Json<Envelope<Booking>>)> {
    let booking = state.services.bookings.create(data).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new("booking", booking))))
}

/// Update a booking
#[utoipa::path(
    patch,
    path = "/bookings/{id}",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateBooking,
    responses(
        (status = 200, description = "Booking updated", body = Booking)
    )
)]
pub async fn update_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(data): ApiJson<UpdateBooking>,
) -> AppResult<Json<Envelope<Booking>>> {
    let booking = state.services.bookings.update(id, data).await?;
    Ok(Json(Envelope::new("booking", booking)))
}

/// Delete a booking
#[utoipa::path(
    delete,
    path = "/bookings/{id}",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 204, description = "Booking deleted")
    )
)]
pub async fn delete_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.services.bookings.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
