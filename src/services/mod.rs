//! Business logic services

pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub tours: tours::ToursService,
    pub users: users::UsersService,
    pub reviews: reviews::ReviewsService,
    pub bookings: bookings::BookingsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        Self {
            tours: tours::ToursService::new(repository.clone()),
            users: users::UsersService::new(repository.clone()),
            reviews: reviews::ReviewsService::new(repository.clone()),
            bookings: bookings::BookingsService::new(repository.clone()),
            repository,
        }
    }
}
