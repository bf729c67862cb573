//! Bookings service

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::booking::{Booking, CreateBooking, UpdateBooking},
    repository::Repository,
};

#[derive(Clone)]
pub struct BookingsService {
    repository: Repository,
}

impl BookingsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Booking>> {
        self.repository.bookings.list().await
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Booking> {
        self.repository.bookings.get_by_id(id).await
    }

    pub async fn create(&self, data: CreateBooking) -> AppResult<Booking> {
        let data = data.checked()?;
        self.repository.bookings.create(&data).await
    }

    pub async fn update(&self, id: Uuid, data: UpdateBooking) -> AppResult<Booking> {
        let data = data.checked()?;
        self.repository.bookings.update(id, &data).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.bookings.delete(id).await
    }
}
