//! Repository layer for database operations

pub mod bookings;
pub mod filter;
pub mod pipeline;
pub mod reviews;
pub mod tours;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub tours: tours::ToursRepository,
    pub users: users::UsersRepository,
    pub reviews: reviews::ReviewsRepository,
    pub bookings: bookings::BookingsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            tours: tours::ToursRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            reviews: reviews::ReviewsRepository::new(pool.clone()),
            bookings: bookings::BookingsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
